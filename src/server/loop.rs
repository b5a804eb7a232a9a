// Server loop module
// Accepts connections until shutdown is requested, then drains open ones

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};

use super::connection::{accept_connection, ConnectionTracker};
use crate::config::AppState;
use crate::logger;

/// Run the accept loop until `shutdown` is notified.
///
/// After shutdown the listener is closed, open connections are told to
/// finish their current request and close, and they get up to
/// `performance.shutdown_grace_secs` to do so.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    let tracker = Arc::new(ConnectionTracker::default());
    let (drain_tx, drain_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &tracker, drain_rx.clone());
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                        let delay = accept_error_delay(&e);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }

            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    let _ = drain_tx.send(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_secs);
    if tracker.active() > 0 {
        logger::log_info(&format!(
            "Waiting up to {}s for {} open connection(s)",
            grace.as_secs(),
            tracker.active()
        ));
        let _ = tokio::time::timeout(grace, tracker.wait_idle()).await;
    }
    logger::log_shutdown_complete(tracker.active());
}

/// Pause before accepting again. Errors tied to a single peer are retried
/// at once; anything else (e.g. `EMFILE`) usually persists for a while.
fn accept_error_delay(e: &io::Error) -> Duration {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::bind_listener;
    use crate::test_support::{test_state, MockOutbound};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = test_state(&MockOutbound::json(serde_json::json!({})));
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("ok"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connection() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 16).unwrap();
        let addr = listener.local_addr().unwrap();
        let state = test_state(&MockOutbound::json(serde_json::json!({})));
        assert!(state.config.performance.shutdown_grace_secs >= 5);
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        let mut buf = [0u8; 1024];
        while !response.ends_with(b"ok") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before the response was complete");
            response.extend_from_slice(&buf[..n]);
        }
        assert!(response.starts_with(b"HTTP/1.1 200 OK"));

        // The connection stays open and idle while the server shuts down
        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("shutdown waited on an idle connection")
            .unwrap();

        let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_accept_error_delay() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(accept_error_delay(&reset), Duration::ZERO);

        let emfile = io::Error::from_raw_os_error(24);
        assert_eq!(accept_error_delay(&emfile), Duration::from_millis(100));
    }
}
