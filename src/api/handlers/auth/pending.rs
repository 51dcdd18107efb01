//! Pending-verification stores for the phone, email, and terms flows.
//!
//! Each store maps an opaque token hash to a short-lived record that walks
//! `pending -> code issued -> verified` (the terms flow skips the code step).
//! At most one record exists per subject per flow; creating a new one
//! supersedes the old. A verification code carries its own shorter expiry
//! nested inside the record's expiry, and failed attempts saturate at a
//! maximum that destroys the whole record.
//!
//! Expiry stamps are written from the trusted clock's `now` passed in by the
//! caller; liveness checks on access use the local clock and are the
//! authoritative mechanism. The periodic sweeper only reclaims memory.
//!
//! State is process-local. A horizontally scaled deployment needs sticky
//! routing or a shared TTL-capable backend behind this same API.

use super::token;
use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Per-flow knobs; one instance per store.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PendingPolicy {
    /// Lifetime of the pending record itself.
    pub ttl_seconds: i64,
    /// Lifetime of an issued code, nested inside `ttl_seconds`.
    pub code_ttl_seconds: i64,
    /// Digits per code.
    pub code_length: u8,
    /// Failed attempts destroying the record.
    pub max_attempts: u32,
    /// Minimum interval between code sends for one record.
    pub resend_interval_seconds: i64,
    /// Lifetime of the continuation token minted on a verified code.
    /// `None` means verification completes the flow immediately.
    pub derived_ttl_seconds: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecordStatus {
    Pending,
    Verified,
}

#[derive(Debug)]
struct PendingRecord {
    subject: String,
    context: Option<String>,
    device: Option<String>,
    status: RecordStatus,
    expires_at: DateTime<Utc>,
    code_hash: Option<Vec<u8>>,
    code_expires_at: Option<DateTime<Utc>>,
    attempts: u32,
    resend_after: Option<DateTime<Utc>>,
    derived_hash: Option<Vec<u8>>,
    derived_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub(crate) struct PendingCreated {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct CodeIssued {
    pub code: String,
    pub code_expires_at: DateTime<Utc>,
    /// Subject and bound context ride along so callers can pick the
    /// dispatch destination without re-reading the record.
    pub subject: String,
    pub context: Option<String>,
}

#[derive(Debug)]
pub(crate) struct DerivedIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct PendingVerified {
    pub subject: String,
    pub context: Option<String>,
    pub derived: Option<DerivedIssued>,
}

#[derive(Debug)]
pub(crate) struct PendingConsumed {
    pub subject: String,
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub(crate) enum PendingError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Invalid code")]
    InvalidCode { remaining: u32 },
    #[error("Maximum attempts exceeded")]
    AttemptsExhausted,
    #[error("Code expired, a new code was sent")]
    CodeExpired { replacement: CodeIssued },
    #[error("No code requested")]
    CodeMissing,
    #[error("Missing destination")]
    DestinationMissing,
    #[error("Code does not belong to this device")]
    DeviceMismatch,
    #[error("Code already sent, retry in {retry_after_seconds}s")]
    ResendThrottled { retry_after_seconds: i64 },
    #[error(transparent)]
    Codec(#[from] anyhow::Error),
}

pub(crate) struct PendingStore {
    flow: &'static str,
    policy: PendingPolicy,
    records: Mutex<HashMap<Vec<u8>, PendingRecord>>,
}

impl PendingStore {
    pub(crate) fn new(flow: &'static str, policy: PendingPolicy) -> Self {
        Self {
            flow,
            policy,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn flow(&self) -> &'static str {
        self.flow
    }

    /// Start a flow for `subject`, superseding any prior record for it.
    ///
    /// # Errors
    /// Returns an error only when token generation fails.
    pub(crate) async fn create(
        &self,
        subject: &str,
        context: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PendingCreated> {
        let token = token::generate_token()?;
        let hash = token::hash_token(&token);
        let expires_at = now + ChronoDuration::seconds(self.policy.ttl_seconds);

        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        // Supersede the subject's prior record and drop anything already dead.
        records.retain(|_, record| record.subject != subject && local_now <= record.expires_at);
        records.insert(
            hash,
            PendingRecord {
                subject: subject.to_string(),
                context,
                device: None,
                status: RecordStatus::Pending,
                expires_at,
                code_hash: None,
                code_expires_at: None,
                attempts: 0,
                resend_after: None,
                derived_hash: None,
                derived_expires_at: None,
            },
        );

        Ok(PendingCreated { token, expires_at })
    }

    /// Like [`create`](Self::create), but keyed by a token minted elsewhere.
    /// Used when the restricted flow token doubles as the record key, so the
    /// client carries a single opaque value.
    pub(crate) async fn create_keyed(
        &self,
        token_hash: Vec<u8>,
        subject: &str,
        context: Option<String>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let expires_at = now + ChronoDuration::seconds(self.policy.ttl_seconds);
        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        records.retain(|_, record| record.subject != subject && local_now <= record.expires_at);
        records.insert(
            token_hash,
            PendingRecord {
                subject: subject.to_string(),
                context,
                device: None,
                status: RecordStatus::Pending,
                expires_at,
                code_hash: None,
                code_expires_at: None,
                attempts: 0,
                resend_after: None,
                derived_hash: None,
                derived_expires_at: None,
            },
        );
        expires_at
    }

    /// Remaining send throttle on the subject's live record, if any.
    ///
    /// Lets callers that supersede on every request (the public email
    /// route) honor the throttle before discarding the old record.
    pub(crate) async fn resend_block(&self, subject: &str) -> Option<i64> {
        let local_now = Utc::now();
        let records = self.records.lock().await;
        records.values().find_map(|record| {
            if record.subject != subject || local_now > record.expires_at {
                return None;
            }
            let resend_after = record.resend_after?;
            (local_now < resend_after).then(|| (resend_after - local_now).num_seconds().max(1))
        })
    }

    /// Issue a fresh code on a live record, resetting the attempt counter.
    ///
    /// `bind_context` attaches a destination learned at request time (a phone
    /// number entered mid-flow); `device` binds the code to the requesting
    /// device for the phone flow.
    pub(crate) async fn request_code(
        &self,
        token_hash: &[u8],
        bind_context: Option<&str>,
        device: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CodeIssued, PendingError> {
        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(token_hash) else {
            return Err(PendingError::InvalidToken);
        };
        if local_now > record.expires_at {
            records.remove(token_hash);
            return Err(PendingError::InvalidToken);
        }
        if record.status == RecordStatus::Verified {
            return Err(PendingError::InvalidToken);
        }
        if let Some(resend_after) = record.resend_after
            && local_now < resend_after
        {
            return Err(PendingError::ResendThrottled {
                retry_after_seconds: (resend_after - local_now).num_seconds().max(1),
            });
        }

        if let Some(context) = bind_context {
            record.context = Some(context.to_string());
        }
        // A code with nowhere to go helps nobody; reject before stamping
        // the throttle so the caller can retry with a destination.
        if record.context.is_none() {
            return Err(PendingError::DestinationMissing);
        }
        record.device = device.map(str::to_string);

        let code = token::generate_numeric_code(self.policy.code_length)?;
        let code_expires_at = now + ChronoDuration::seconds(self.policy.code_ttl_seconds);
        record.code_hash = Some(token::hash_token(&code));
        record.code_expires_at = Some(code_expires_at);
        record.attempts = 0;
        record.resend_after = Some(now + ChronoDuration::seconds(self.policy.resend_interval_seconds));

        Ok(CodeIssued {
            code,
            code_expires_at,
            subject: record.subject.clone(),
            context: record.context.clone(),
        })
    }

    /// Check a presented code against the record.
    ///
    /// A wrong code increments the attempt counter; saturating it destroys
    /// the record and every later call sees `InvalidToken`. An expired code
    /// is replaced in place and reported as `CodeExpired` so the caller can
    /// dispatch the replacement. On a match the record either completes
    /// immediately (no derived TTL configured) or parks as verified behind a
    /// single-use derived token.
    pub(crate) async fn verify_code(
        &self,
        token_hash: &[u8],
        code: &str,
        device: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PendingVerified, PendingError> {
        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(token_hash) else {
            return Err(PendingError::InvalidToken);
        };
        if local_now > record.expires_at {
            records.remove(token_hash);
            return Err(PendingError::InvalidToken);
        }
        if record.status == RecordStatus::Verified {
            return Err(PendingError::InvalidToken);
        }
        let Some(code_hash) = record.code_hash.clone() else {
            return Err(PendingError::CodeMissing);
        };
        let code_alive = record
            .code_expires_at
            .is_some_and(|expires_at| local_now <= expires_at);
        if !code_alive {
            // Soft failure: hand out a replacement instead of a dead end.
            let replacement = token::generate_numeric_code(self.policy.code_length)?;
            let code_expires_at = now + ChronoDuration::seconds(self.policy.code_ttl_seconds);
            record.code_hash = Some(token::hash_token(&replacement));
            record.code_expires_at = Some(code_expires_at);
            record.attempts = 0;
            record.resend_after =
                Some(now + ChronoDuration::seconds(self.policy.resend_interval_seconds));
            return Err(PendingError::CodeExpired {
                replacement: CodeIssued {
                    code: replacement,
                    code_expires_at,
                    subject: record.subject.clone(),
                    context: record.context.clone(),
                },
            });
        }
        if record.device.is_some() && record.device.as_deref() != device {
            return Err(PendingError::DeviceMismatch);
        }
        if token::hash_token(code) != code_hash {
            record.attempts += 1;
            if record.attempts >= self.policy.max_attempts {
                records.remove(token_hash);
                return Err(PendingError::AttemptsExhausted);
            }
            return Err(PendingError::InvalidCode {
                remaining: self.policy.max_attempts - record.attempts,
            });
        }

        let subject = record.subject.clone();
        let context = record.context.clone();
        match self.policy.derived_ttl_seconds {
            Some(ttl_seconds) => {
                let derived = token::generate_token()?;
                let expires_at = now + ChronoDuration::seconds(ttl_seconds);
                record.status = RecordStatus::Verified;
                record.derived_hash = Some(token::hash_token(&derived));
                record.derived_expires_at = Some(expires_at);
                Ok(PendingVerified {
                    subject,
                    context,
                    derived: Some(DerivedIssued {
                        token: derived,
                        expires_at,
                    }),
                })
            }
            None => {
                records.remove(token_hash);
                Ok(PendingVerified {
                    subject,
                    context,
                    derived: None,
                })
            }
        }
    }

    /// Spend a derived continuation token, destroying the parent record.
    /// Single use: a second call with the same token sees `InvalidToken`.
    pub(crate) async fn consume_derived(
        &self,
        derived_hash: &[u8],
    ) -> Result<PendingConsumed, PendingError> {
        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        let key = records
            .iter()
            .find_map(|(key, record)| {
                (record.derived_hash.as_deref() == Some(derived_hash)).then(|| key.clone())
            })
            .ok_or(PendingError::InvalidToken)?;
        let Some(record) = records.remove(&key) else {
            return Err(PendingError::InvalidToken);
        };
        let alive = record
            .derived_expires_at
            .is_some_and(|expires_at| local_now <= expires_at)
            && local_now <= record.expires_at;
        if !alive {
            return Err(PendingError::InvalidToken);
        }
        Ok(PendingConsumed {
            subject: record.subject,
            context: record.context,
        })
    }

    /// Destroy a live record and hand back its subject, for flows without a
    /// code step (terms acceptance).
    pub(crate) async fn take(&self, token_hash: &[u8]) -> Result<PendingConsumed, PendingError> {
        let local_now = Utc::now();
        let mut records = self.records.lock().await;
        let record = records
            .remove(token_hash)
            .ok_or(PendingError::InvalidToken)?;
        if local_now > record.expires_at {
            return Err(PendingError::InvalidToken);
        }
        Ok(PendingConsumed {
            subject: record.subject,
            context: record.context,
        })
    }

    /// Drop every record past its expiry; returns how many went away.
    pub(crate) async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| now <= record.expires_at);
        before - records.len()
    }
}
