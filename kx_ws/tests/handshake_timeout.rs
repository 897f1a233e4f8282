//! A peer that accepts TCP but never completes the upgrade must not wedge the event loop

use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use kx_ws::ConnectionId;
use kx_ws::ReconnectConfig;
use kx_ws::StreamClient;
use kx_ws::StreamConfig;
use parking_lot::Mutex;

/// Accept every connection and hold it open without answering
fn silent_listener() -> (String, Arc<Mutex<Vec<TcpStream>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let held = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&held);
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            sink.lock().push(stream);
        }
    });
    (url, held)
}

#[test]
fn test_shutdown_completes_while_peer_stalls_handshake() {
    let (url, held) = silent_listener();
    let config = StreamConfig {
        url,
        reconnect: ReconnectConfig { initial_delay: Duration::from_millis(10), max_delay: Duration::from_millis(20), max_retries: 30, factor: 2.0 },
        handshake_timeout: Duration::from_millis(200),
        ..StreamConfig::default()
    };
    let mut client = StreamClient::new(config).unwrap();
    assert!(client.subscribe(ConnectionId::from("ticker_XBT/USD"), None, |_| {}));

    // Wait for the first stalled handshake to time out
    let deadline = std::time::Instant::now() + Duration::from_secs(3);
    while client.stats().connection_failures == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(client.stats().connection_failures >= 1);
    assert!(!held.lock().is_empty());

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        client.shutdown();
        let _ = done_tx.send(client.active().len());
    });

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap(), 0);
}
