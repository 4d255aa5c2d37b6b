//! Client configuration.

use std::time::Duration;

/// Bounded retry applied by the call dispatcher to network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of network attempts per call (default: 3).
    pub max_attempts: u32,
    /// Sleep before retry `n` is `base_backoff * n` (default: 1 second).
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// Backoff slept after the failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }
}

/// Everything needed to mount one export and talk NFS to it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host name or address of the server.
    pub server: String,
    /// Exported directory, always starting with `/` and without a trailing `/`.
    pub export: String,
    pub retry: RetryPolicy,
    /// Bound on one request/reply exchange.
    pub call_timeout: Duration,
    /// Start every call from a reserved source port instead of escalating
    /// only after an authentication rejection.
    pub use_privileged_port: bool,
    /// Skip the portmapper lookup for MOUNT.
    pub mount_port: Option<u16>,
    /// Skip the portmapper lookup for NFS.
    pub nfs_port: Option<u16>,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>, export: &str) -> Self {
        Self {
            server: server.into(),
            export: normalize_export(export),
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(30),
            use_privileged_port: false,
            mount_port: None,
            nfs_port: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_privileged_port(mut self, use_privileged_port: bool) -> Self {
        self.use_privileged_port = use_privileged_port;
        self
    }

    pub fn with_mount_port(mut self, port: u16) -> Self {
        self.mount_port = Some(port);
        self
    }

    pub fn with_nfs_port(mut self, port: u16) -> Self {
        self.nfs_port = Some(port);
        self
    }
}

/// `export`, `/export/` and `//export` all become `/export`; the empty path
/// becomes `/`.
pub fn normalize_export(export: &str) -> String {
    let trimmed = export.trim_matches('/');
    format!("/{trimmed}")
}
