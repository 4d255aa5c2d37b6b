//! Server restart detection for unstable writes.
//!
//! A server hands out the same write verifier on every WRITE and COMMIT until
//! it restarts. Data written with `UNSTABLE` or `DATA_SYNC` and not yet
//! committed is lost on a restart, so a caller that spans several such calls
//! compares each verifier with the first one it saw.

use std::sync::Mutex;

use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::xdr::nfs3::writeverf3;

/// Fails with [Error::ServerRestarted] when `expected` is set and differs
/// from `actual`.
pub fn check_verifier(
    server: &str,
    procedure: &'static str,
    expected: Option<writeverf3>,
    actual: writeverf3,
) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => {
            warn!(
                "{server}: {procedure} write verifier changed from {:016x} to {:016x}",
                u64::from_be_bytes(expected),
                u64::from_be_bytes(actual)
            );
            Err(Error::ServerRestarted { server: server.to_string(), procedure, expected, actual })
        }
        _ => Ok(()),
    }
}

/// Remembers the first verifier `server` handed out and checks every later
/// one against it.
#[derive(Debug)]
pub struct WriteVerifierTracker {
    server: String,
    first: Mutex<Option<writeverf3>>,
}

impl WriteVerifierTracker {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into(), first: Mutex::new(None) }
    }

    /// The verifier later replies must carry, if one was observed.
    pub fn expected(&self) -> Option<writeverf3> {
        match self.first.lock() {
            Ok(first) => *first,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Records the verifier of a `procedure` reply if it is the first,
    /// otherwise compares it with the first.
    pub fn observe(&self, procedure: &'static str, verifier: writeverf3) -> Result<()> {
        let mut first = match self.first.lock() {
            Ok(first) => first,
            Err(poisoned) => poisoned.into_inner(),
        };
        match *first {
            None => {
                *first = Some(verifier);
                Ok(())
            }
            Some(expected) => check_verifier(&self.server, procedure, Some(expected), verifier),
        }
    }

    /// Forgets the observed verifier, after the caller has rewritten its
    /// uncommitted data.
    pub fn reset(&self) {
        match self.first.lock() {
            Ok(mut first) => *first = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_expectation_accepts_anything() {
        assert!(check_verifier("filer", "WRITE", None, [1; 8]).is_ok());
    }

    #[test]
    fn mismatch_is_a_restart() {
        let err = check_verifier("filer", "COMMIT", Some([1; 8]), [2; 8]).unwrap_err();
        assert!(matches!(
            err,
            Error::ServerRestarted { ref server, procedure: "COMMIT", expected, actual }
                if server == "filer" && expected == [1; 8] && actual == [2; 8]
        ));
    }

    #[test]
    fn tracker_keeps_the_first_verifier() {
        let tracker = WriteVerifierTracker::new("filer");
        assert_eq!(tracker.expected(), None);
        tracker.observe("WRITE", [5; 8]).unwrap();
        tracker.observe("WRITE", [5; 8]).unwrap();
        assert!(matches!(
            tracker.observe("COMMIT", [6; 8]),
            Err(Error::ServerRestarted { ref server, procedure: "COMMIT", .. }) if server == "filer"
        ));
        assert_eq!(tracker.expected(), Some([5; 8]));

        tracker.reset();
        tracker.observe("WRITE", [6; 8]).unwrap();
        assert_eq!(tracker.expected(), Some([6; 8]));
    }
}
