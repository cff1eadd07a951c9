pub mod builders;
pub mod fake_executor;

use std::sync::Once;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Wait for the next frame written to a `ChannelTransport` and parse it.
pub async fn next_reply(replies: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let frame = with_timeout(replies.recv())
        .await
        .expect("transport closed before a reply arrived");
    serde_json::from_str(&frame).expect("reply is not valid JSON")
}

/// Assert that nothing is written to the transport for `ms` milliseconds.
pub async fn assert_no_reply(replies: &mut mpsc::UnboundedReceiver<String>, ms: u64) {
    let got = tokio::time::timeout(std::time::Duration::from_millis(ms), replies.recv()).await;
    if let Ok(Some(frame)) = got {
        panic!("unexpected reply: {frame}");
    }
}
