//! The request/reply primitive the dispatcher sends calls through.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Sends one complete RPC message and waits for the matching reply message.
///
/// `request` holds the message as transmit-ordered segments; implementations
/// write them back to back as one record. The reply is returned without
/// framing. Any failure, including `timeout` elapsing, is reported as an io
/// error and classified as a network failure by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_and_wait(
        &self,
        host: &str,
        port: u16,
        use_privileged_port: bool,
        request: &[Bytes],
        timeout: Duration,
    ) -> std::io::Result<Vec<u8>>;
}
