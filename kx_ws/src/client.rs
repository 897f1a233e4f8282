use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use rapidhash::RapidHashMap;
use rapidhash::RapidHashSet;
use serde_json::Value;

use crate::backoff::ReconnectConfig;
use crate::backoff::ReconnectState;
use crate::connection::Connection;
use crate::connection::ConnectionFactory;
use crate::connection::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::connection::DEFAULT_STREAM_URL;
use crate::connection::Frame;
use crate::connection::TungsteniteFactory;
use crate::error::Result;
use crate::error::StreamError;
use crate::event::EventSink;
use crate::event::StreamEvent;
use crate::metrics::StreamStats;
use crate::metrics::StreamStatsSnapshot;
use crate::subscription::ConnectionId;
use crate::subscription::public_subscription;

/// Frames read from one connection before moving on to the next
const MAX_FRAMES_PER_TURN: usize = 64;

/// Longest the loop sleeps when nothing is connected or scheduled
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Configuration for the stream client
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub reconnect: ReconnectConfig,
    /// Wait between socket polls while connections are open but quiet
    pub poll_interval: Duration,
    /// Bound on TCP connect plus handshake; the event loop is blocked meanwhile
    pub handshake_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            poll_interval: Duration::from_millis(1),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

enum Command {
    Start { id: ConnectionId, payload: Option<String>, sink: EventSink },
    Stop(ConnectionId),
    StopAll,
    Shutdown,
}

/// Owner of named, automatically reconnecting stream connections
///
/// All connections are serviced by one event-loop thread owned by the client;
/// it starts in the constructor and is joined by [`StreamClient::shutdown`]
/// or on drop. Subscription callbacks run on that thread. Every method may be
/// called from any thread.
pub struct StreamClient {
    commands: Sender<Command>,
    active: Arc<Mutex<RapidHashSet<ConnectionId>>>,
    stats: Arc<StreamStats>,
    handle: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Start a client connecting through tungstenite
    pub fn new(config: StreamConfig) -> Result<Self> {
        let factory = TungsteniteFactory::new(config.handshake_timeout);
        Self::with_factory(config, factory)
    }

    /// Start a client using a custom connection factory
    pub fn with_factory(config: StreamConfig, factory: impl ConnectionFactory + 'static) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let stats = Arc::new(StreamStats::default());

        let event_loop = EventLoop {
            factory: Box::new(factory),
            config,
            commands: rx,
            links: RapidHashMap::default(),
            stats: Arc::clone(&stats),
        };

        let handle = std::thread::Builder::new().name("kx-stream".to_string()).spawn(move || event_loop.run())?;

        Ok(Self { commands: tx, active: Arc::new(Mutex::new(RapidHashSet::default())), stats, handle: Some(handle) })
    }

    /// Open a connection under `id`, delivering events to `callback`
    ///
    /// Returns `false` without doing anything if `id` is already registered.
    /// `payload` is sent every time the connection (re)opens.
    pub fn subscribe<F>(&self, id: ConnectionId, payload: Option<String>, callback: F) -> bool
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        self.subscribe_with_sink(id, payload, EventSink::callback(callback))
    }

    /// Like [`StreamClient::subscribe`], delivering events into a channel
    pub fn subscribe_channel(&self, id: ConnectionId, payload: Option<String>) -> Option<Receiver<StreamEvent>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribe_with_sink(id, payload, EventSink::channel(tx)).then_some(rx)
    }

    /// Subscribe to a public channel for the given pairs
    pub fn subscribe_public<F>(&self, pairs: &[&str], subscription: Value, callback: F) -> Result<bool>
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        let (id, payload) = public_subscription(pairs, subscription)?;
        Ok(self.subscribe(id, Some(payload), callback))
    }

    pub fn subscribe_with_sink(&self, id: ConnectionId, payload: Option<String>, sink: EventSink) -> bool {
        let mut active = self.active.lock();
        if active.contains(&id) {
            tracing::debug!("{id} already subscribed");
            return false;
        }

        // Sent under the lock so commands for one id keep their order
        if self.commands.send(Command::Start { id: id.clone(), payload, sink }).is_err() {
            tracing::warn!("Stream client is shut down, cannot subscribe {id}");
            return false;
        }
        active.insert(id);
        true
    }

    /// Tear down a connection and stop reconnecting it
    ///
    /// Returns `false` if `id` was not registered.
    pub fn stop(&self, id: &ConnectionId) -> bool {
        let mut active = self.active.lock();
        if !active.remove(id) {
            return false;
        }
        let _ = self.commands.send(Command::Stop(id.clone()));
        true
    }

    /// Tear down every connection; the event loop keeps running
    pub fn stop_all(&self) {
        let mut active = self.active.lock();
        active.clear();
        let _ = self.commands.send(Command::StopAll);
    }

    pub fn is_active(&self, id: &ConnectionId) -> bool {
        self.active.lock().contains(id)
    }

    pub fn active(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.active.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }

    /// Close every connection and halt the event loop
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        tracing::info!("Stopping stream client...");
        self.active.lock().clear();
        let _ = self.commands.send(Command::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Stream event loop panicked");
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum LinkState {
    /// Waiting to (re)connect at the given instant
    Pending(Instant),
    Connected(Box<dyn Connection>),
    /// Retries exhausted, nothing more is scheduled
    Failed,
}

struct Link {
    payload: Option<String>,
    sink: EventSink,
    reconnect: ReconnectState,
    state: LinkState,
}

impl Link {
    /// Schedule the next attempt or give up for good
    fn on_failure(&mut self, id: &ConnectionId, err: &StreamError, stats: &StreamStats) {
        stats.record_failure();

        match self.reconnect.on_failure() {
            Some(delay) => {
                tracing::warn!("{id}: {err}, reconnecting in {delay:?} (attempt {})", self.reconnect.attempts());
                self.state = LinkState::Pending(Instant::now() + delay);
            }
            None => {
                tracing::error!("{id}: {err}, max reconnect retries reached");
                self.state = LinkState::Failed;
                self.sink.deliver(StreamEvent::ReconnectExhausted);
            }
        }
    }
}

struct EventLoop {
    factory: Box<dyn ConnectionFactory>,
    config: StreamConfig,
    commands: Receiver<Command>,
    links: RapidHashMap<ConnectionId, Link>,
    stats: Arc<StreamStats>,
}

impl EventLoop {
    fn run(mut self) {
        tracing::info!("Stream event loop started");
        let mut busy = false;

        loop {
            let first = if busy {
                self.commands.try_recv().map_err(|err| match err {
                    TryRecvError::Empty => RecvTimeoutError::Timeout,
                    TryRecvError::Disconnected => RecvTimeoutError::Disconnected,
                })
            } else {
                self.commands.recv_timeout(self.wait_time())
            };

            match first {
                Ok(command) => {
                    if !self.handle(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if !self.drain_commands() {
                break;
            }

            self.connect_due();
            busy = self.poll_connected();
        }

        self.close_all();
        tracing::info!("Stream event loop stopped");
    }

    /// Apply a command; `false` means shut down
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start { id, payload, sink } => {
                tracing::info!("Subscribing {id}");
                let link = Link {
                    payload,
                    sink,
                    reconnect: ReconnectState::new(self.config.reconnect),
                    state: LinkState::Pending(Instant::now()),
                };
                if let Some(mut old) = self.links.insert(id, link) {
                    close_link(&mut old);
                }
            }
            Command::Stop(id) => {
                if let Some(mut link) = self.links.remove(&id) {
                    tracing::info!("Stopped {id}");
                    close_link(&mut link);
                }
            }
            Command::StopAll => self.close_all(),
            Command::Shutdown => return false,
        }
        true
    }

    fn drain_commands(&mut self) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            if !self.handle(command) {
                return false;
            }
        }
        true
    }

    /// How long to block on the command channel before the next turn
    fn wait_time(&self) -> Duration {
        let now = Instant::now();
        let mut wait = IDLE_WAIT;

        for link in self.links.values() {
            match &link.state {
                LinkState::Connected(_) => wait = wait.min(self.config.poll_interval),
                LinkState::Pending(at) => wait = wait.min(at.saturating_duration_since(now)),
                LinkState::Failed => {}
            }
        }
        wait
    }

    fn connect_due(&mut self) {
        let now = Instant::now();

        for (id, link) in self.links.iter_mut() {
            let LinkState::Pending(at) = link.state else {
                continue;
            };
            if at > now {
                continue;
            }

            match self.factory.connect(&self.config.url) {
                Ok(mut connection) => {
                    if let Some(payload) = &link.payload {
                        if let Err(err) = connection.send_text(payload) {
                            connection.close();
                            link.on_failure(id, &err, &self.stats);
                            continue;
                        }
                    }
                    tracing::info!("{id} connected");
                    self.stats.record_connect();
                    link.reconnect.on_connected();
                    link.state = LinkState::Connected(connection);
                }
                Err(err) => link.on_failure(id, &err, &self.stats),
            }
        }
    }

    /// Read pending frames from every open connection; `true` if any arrived
    fn poll_connected(&mut self) -> bool {
        let mut received = false;

        for (id, link) in self.links.iter_mut() {
            let LinkState::Connected(connection) = &mut link.state else {
                continue;
            };

            let mut lost = None;
            for _ in 0..MAX_FRAMES_PER_TURN {
                match connection.poll() {
                    Ok(Some(Frame::Text(text))) => {
                        received = true;
                        match serde_json::from_str::<Value>(&text) {
                            Ok(value) => {
                                self.stats.record_message();
                                link.sink.deliver(StreamEvent::Message(value));
                            }
                            Err(err) => {
                                self.stats.record_dropped();
                                tracing::debug!("{id}: dropping undecodable frame: {err}");
                            }
                        }
                    }
                    Ok(Some(Frame::Binary(data))) => {
                        received = true;
                        self.stats.record_dropped();
                        tracing::debug!("{id}: dropping {} byte binary frame", data.len());
                    }
                    Ok(Some(Frame::Control)) => received = true,
                    Ok(Some(Frame::Closed)) => {
                        lost = Some(StreamError::ConnectionLost("closed by peer".to_string()));
                        break;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        lost = Some(err);
                        break;
                    }
                }
            }

            if let Some(err) = lost {
                connection.close();
                link.on_failure(id, &err, &self.stats);
            }
        }

        received
    }

    fn close_all(&mut self) {
        for (id, mut link) in self.links.drain() {
            tracing::info!("Closing {id}");
            close_link(&mut link);
        }
    }
}

fn close_link(link: &mut Link) {
    if let LinkState::Connected(connection) = &mut link.state {
        connection.close();
    }
    link.state = LinkState::Failed;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingFactory;

    impl ConnectionFactory for RefusingFactory {
        fn connect(&self, _url: &str) -> Result<Box<dyn Connection>> {
            Err(StreamError::ConnectFailed("connection refused".to_string()))
        }
    }

    #[test]
    fn test_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.url, DEFAULT_STREAM_URL);
        assert_eq!(config.reconnect.max_retries, 30);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut client = StreamClient::with_factory(StreamConfig::default(), RefusingFactory).unwrap();
        assert!(client.subscribe(ConnectionId::from("ticker_XBT/USD"), None, |_| {}));

        client.shutdown();
        client.shutdown();
        assert!(client.active().is_empty());
    }

    #[test]
    fn test_subscribe_after_shutdown_fails() {
        let mut client = StreamClient::with_factory(StreamConfig::default(), RefusingFactory).unwrap();
        client.shutdown();

        assert!(!client.subscribe(ConnectionId::from("ticker_XBT/USD"), None, |_| {}));
        assert!(!client.is_active(&ConnectionId::from("ticker_XBT/USD")));
    }

    #[test]
    fn test_stop_unknown_id() {
        let client = StreamClient::with_factory(StreamConfig::default(), RefusingFactory).unwrap();
        assert!(!client.stop(&ConnectionId::from("spread_XBT/USD")));
    }
}
