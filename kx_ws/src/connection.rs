use std::io::ErrorKind;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

use bytes::Bytes;
use tungstenite::Message;
use tungstenite::WebSocket;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::HandshakeError;
use tungstenite::stream::MaybeTlsStream;

use crate::error::Result;
use crate::error::StreamError;

pub const DEFAULT_STREAM_URL: &str = "wss://ws.kraken.com";

/// One inbound item read from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    /// Ping, pong or other frames the protocol layer already handled
    Control,
    /// The peer closed the connection
    Closed,
}

/// A live bidirectional message connection
///
/// `poll` must not block: it returns `Ok(None)` when nothing is pending so a
/// single thread can service many connections.
pub trait Connection: Send {
    fn send_text(&mut self, payload: &str) -> Result<()>;

    fn poll(&mut self) -> Result<Option<Frame>>;

    fn close(&mut self);
}

/// Opens connections to a stream endpoint
///
/// An `Err` from `connect` is a failed handshake; loss after that is reported
/// by the connection itself through `Frame::Closed` or an `Err` from `poll`.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, url: &str) -> Result<Box<dyn Connection>>;
}

/// Default bound on TCP connect plus websocket (and TLS) handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded blocking handshake, non-blocking reads over tungstenite
///
/// The handshake runs on the caller's thread with connect, read and write
/// timeouts, so a peer that accepts TCP but never answers the upgrade fails
/// the attempt instead of stalling the thread.
#[derive(Debug, Clone, Copy)]
pub struct TungsteniteFactory {
    handshake_timeout: Duration,
}

impl TungsteniteFactory {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    fn open_tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.handshake_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => StreamError::ConnectFailed(format!("{host}:{port}: {err}")),
            None => StreamError::ConnectFailed(format!("{host}:{port} did not resolve")),
        })
    }
}

impl Default for TungsteniteFactory {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl ConnectionFactory for TungsteniteFactory {
    fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        tracing::info!("Connecting to WebSocket: {url}");
        let request = url.into_client_request()?;
        let host = request.uri().host().ok_or_else(|| StreamError::ConnectFailed(format!("no host in {url}")))?.trim_matches(['[', ']']).to_string();
        let port = request.uri().port_u16().unwrap_or(if request.uri().scheme_str() == Some("wss") { 443 } else { 80 });

        let stream = self.open_tcp(&host, port)?;
        stream.set_read_timeout(Some(self.handshake_timeout))?;
        stream.set_write_timeout(Some(self.handshake_timeout))?;
        stream.set_nodelay(true)?;

        let (socket, response) = tungstenite::client_tls_with_config(request, stream, None, None).map_err(|err| match err {
            HandshakeError::Interrupted(_) => StreamError::ConnectFailed(format!("handshake timed out after {:?}", self.handshake_timeout)),
            HandshakeError::Failure(err) => StreamError::Websocket(err),
        })?;
        tracing::info!("Connected successfully. Response status: {}", response.status());

        set_nonblocking(socket.get_ref())?;
        Ok(Box::new(TungsteniteConnection { socket }))
    }
}

fn set_nonblocking(stream: &MaybeTlsStream<TcpStream>) -> std::io::Result<()> {
    match stream {
        MaybeTlsStream::Plain(tcp) => tcp.set_nonblocking(true),
        MaybeTlsStream::Rustls(tls) => tls.get_ref().set_nonblocking(true),
        _ => Ok(()),
    }
}

pub struct TungsteniteConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

fn would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == ErrorKind::WouldBlock)
}

impl Connection for TungsteniteConnection {
    fn send_text(&mut self, payload: &str) -> Result<()> {
        match self.socket.send(Message::text(payload.to_owned())) {
            Ok(()) => Ok(()),
            // Queued inside tungstenite, flushed by later reads
            Err(ref err) if would_block(err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn poll(&mut self) -> Result<Option<Frame>> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Some(Frame::Text(text.as_str().to_owned()))),
            Ok(Message::Binary(data)) => Ok(Some(Frame::Binary(data))),
            Ok(Message::Close(_)) => Ok(Some(Frame::Closed)),
            Ok(_) => Ok(Some(Frame::Control)),
            Err(ref err) if would_block(err) => Ok(None),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(Some(Frame::Closed)),
            Err(err) => Err(err.into()),
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.socket.close(None) {
            if !would_block(&err) {
                tracing::debug!("Error closing WebSocket: {err}");
            }
        }
        let _ = self.socket.flush();
    }
}
