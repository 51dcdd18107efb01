//! Out-of-band verification code delivery.
//!
//! Phone and email flows hand generated codes to a `CodeSender`, which decides
//! how to deliver them (SMS gateway, email provider, etc.). Delivery is
//! fire-and-forget: a failed dispatch is logged and the flow keeps going, so a
//! flaky provider cannot wedge a pending verification.
//!
//! The default sender for local dev is `LogCodeSender`, which logs and returns
//! `Ok(())`.

use anyhow::Result;
use tracing::{error, info};

/// Code delivery abstraction used by the verification flows.
pub trait CodeSender: Send + Sync {
    /// Deliver a code or return an error to have it logged.
    fn send_code(&self, destination: &str, code: &str) -> Result<()>;
}

/// Local dev sender that logs the code instead of sending SMS/email.
#[derive(Clone, Debug)]
pub struct LogCodeSender;

impl CodeSender for LogCodeSender {
    fn send_code(&self, destination: &str, code: &str) -> Result<()> {
        info!(
            destination = %destination,
            code = %code,
            "verification code dispatch stub"
        );
        Ok(())
    }
}

/// Dispatch a code, logging failures instead of propagating them.
pub(super) fn dispatch_code(sender: &dyn CodeSender, destination: &str, code: &str) {
    if let Err(err) = sender.send_code(destination, code) {
        error!(
            destination = %destination,
            error = %err,
            "verification code dispatch failed"
        );
    }
}

/// Sender double shared by the flow tests; records instead of delivering.
#[cfg(test)]
pub(super) mod testing {
    use super::CodeSender;
    use anyhow::Result;
    use std::sync::Mutex;

    pub(crate) struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSender {
        pub(crate) fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl CodeSender for RecordingSender {
        fn send_code(&self, destination: &str, code: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), code.to_string()));
            Ok(())
        }
    }
}
