//! Auth state and configuration.

use super::clock::TrustedClock;
use super::dedup::{DuplicateGuard, GuardPolicy};
use super::notify::CodeSender;
use super::pending::{PendingPolicy, PendingStore};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_FLOW_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_PHONE_CODE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_EMAIL_CODE_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_PHONE_CODE_LENGTH: u8 = 6;
const DEFAULT_EMAIL_CODE_LENGTH: u8 = 5;
const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;
const DEFAULT_RESEND_INTERVAL_SECONDS: i64 = 60;
const DEFAULT_DERIVED_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_GRACE_SECONDS: u64 = 60;
const DEFAULT_DEDUP_RETENTION_SECONDS: u64 = 30;
const DEFAULT_DEDUP_PENDING_MAX_AGE_SECONDS: u64 = 120;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    flow_ttl_seconds: i64,
    phone_code_ttl_seconds: i64,
    email_code_ttl_seconds: i64,
    resend_interval_seconds: i64,
    max_code_attempts: u32,
    derived_token_ttl_seconds: i64,
    refresh_grace_seconds: u64,
    dedup_retention_seconds: u64,
    sweep_interval_seconds: u64,
    time_sources: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            flow_ttl_seconds: DEFAULT_FLOW_TTL_SECONDS,
            phone_code_ttl_seconds: DEFAULT_PHONE_CODE_TTL_SECONDS,
            email_code_ttl_seconds: DEFAULT_EMAIL_CODE_TTL_SECONDS,
            resend_interval_seconds: DEFAULT_RESEND_INTERVAL_SECONDS,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            derived_token_ttl_seconds: DEFAULT_DERIVED_TOKEN_TTL_SECONDS,
            refresh_grace_seconds: DEFAULT_REFRESH_GRACE_SECONDS,
            dedup_retention_seconds: DEFAULT_DEDUP_RETENTION_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            time_sources: super::clock::DEFAULT_TIME_SOURCES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_flow_ttl_seconds(mut self, seconds: i64) -> Self {
        self.flow_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_phone_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.phone_code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_code_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_code_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_interval_seconds(mut self, seconds: i64) -> Self {
        self.resend_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_code_attempts(mut self, attempts: u32) -> Self {
        self.max_code_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_derived_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.derived_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_grace_seconds(mut self, seconds: u64) -> Self {
        self.refresh_grace_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_dedup_retention_seconds(mut self, seconds: u64) -> Self {
        self.dedup_retention_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_time_sources(mut self, sources: Vec<String>) -> Self {
        self.time_sources = sources;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn flow_ttl_seconds(&self) -> i64 {
        self.flow_ttl_seconds
    }

    pub(super) fn email_code_ttl_seconds(&self) -> i64 {
        self.email_code_ttl_seconds
    }

    pub(super) fn refresh_grace_seconds(&self) -> u64 {
        self.refresh_grace_seconds
    }

    pub(crate) fn sweep_interval_seconds(&self) -> u64 {
        self.sweep_interval_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    clock: TrustedClock,
    phone_store: PendingStore,
    email_store: PendingStore,
    terms_store: PendingStore,
    guard: DuplicateGuard,
    sender: Arc<dyn CodeSender>,
}

impl AuthState {
    /// # Errors
    /// Returns an error if the trusted clock's HTTP client cannot be built.
    pub fn new(config: AuthConfig, sender: Arc<dyn CodeSender>) -> Result<Self> {
        let clock = TrustedClock::new(config.time_sources.clone())?;
        let phone_store = PendingStore::new(
            "phone",
            PendingPolicy {
                ttl_seconds: config.flow_ttl_seconds,
                code_ttl_seconds: config.phone_code_ttl_seconds,
                code_length: DEFAULT_PHONE_CODE_LENGTH,
                max_attempts: config.max_code_attempts,
                resend_interval_seconds: config.resend_interval_seconds,
                derived_ttl_seconds: None,
            },
        );
        let email_store = PendingStore::new(
            "email",
            PendingPolicy {
                ttl_seconds: config.flow_ttl_seconds,
                code_ttl_seconds: config.email_code_ttl_seconds,
                code_length: DEFAULT_EMAIL_CODE_LENGTH,
                max_attempts: config.max_code_attempts,
                resend_interval_seconds: config.resend_interval_seconds,
                derived_ttl_seconds: Some(config.derived_token_ttl_seconds),
            },
        );
        // Terms acceptance needs no code step, just a live pending token.
        let terms_store = PendingStore::new(
            "terms",
            PendingPolicy {
                ttl_seconds: config.flow_ttl_seconds,
                code_ttl_seconds: 0,
                code_length: 0,
                max_attempts: 1,
                resend_interval_seconds: 0,
                derived_ttl_seconds: None,
            },
        );
        let guard = DuplicateGuard::new(GuardPolicy {
            retention: Duration::from_secs(config.dedup_retention_seconds),
            pending_max_age: Duration::from_secs(DEFAULT_DEDUP_PENDING_MAX_AGE_SECONDS),
        });
        Ok(Self {
            config,
            clock,
            phone_store,
            email_store,
            terms_store,
            guard,
            sender,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &TrustedClock {
        &self.clock
    }

    pub(super) fn phone_store(&self) -> &PendingStore {
        &self.phone_store
    }

    pub(super) fn email_store(&self) -> &PendingStore {
        &self.email_store
    }

    pub(super) fn terms_store(&self) -> &PendingStore {
        &self.terms_store
    }

    pub(crate) fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    pub(super) fn sender(&self) -> &dyn CodeSender {
        self.sender.as_ref()
    }
}

/// Background cleanup for the in-memory stores and the duplicate guard.
///
/// Lazy expiry on access stays authoritative; this loop only reclaims
/// memory. The task is detached and dies with the runtime.
pub(crate) fn spawn_expiry_sweeper(state: Arc<AuthState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config().sweep_interval_seconds());
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let now = Utc::now();
            for store in [
                state.phone_store(),
                state.email_store(),
                state.terms_store(),
            ] {
                let dropped = store.purge_expired(now).await;
                if dropped > 0 {
                    debug!(flow = store.flow(), dropped, "purged expired pending records");
                }
            }
            let (stuck, aged) = state.guard().sweep();
            if stuck > 0 || aged > 0 {
                debug!(guard_stuck = stuck, guard_aged = aged, "swept duplicate guard");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::notify::LogCodeSender;
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://rakonti.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://rakonti.dev");
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert_eq!(config.flow_ttl_seconds(), DEFAULT_FLOW_TTL_SECONDS);
        assert_eq!(config.refresh_grace_seconds(), DEFAULT_REFRESH_GRACE_SECONDS);
        assert_eq!(config.time_sources.len(), 2);

        let config = config
            .with_session_ttl_seconds(3600)
            .with_flow_ttl_seconds(300)
            .with_phone_code_ttl_seconds(90)
            .with_email_code_ttl_seconds(120)
            .with_resend_interval_seconds(15)
            .with_max_code_attempts(3)
            .with_derived_token_ttl_seconds(60)
            .with_refresh_grace_seconds(5)
            .with_dedup_retention_seconds(2)
            .with_sweep_interval_seconds(7)
            .with_time_sources(vec!["https://time.test/utc".to_string()]);

        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.flow_ttl_seconds(), 300);
        assert_eq!(config.phone_code_ttl_seconds, 90);
        assert_eq!(config.email_code_ttl_seconds, 120);
        assert_eq!(config.resend_interval_seconds, 15);
        assert_eq!(config.max_code_attempts, 3);
        assert_eq!(config.derived_token_ttl_seconds, 60);
        assert_eq!(config.refresh_grace_seconds(), 5);
        assert_eq!(config.dedup_retention_seconds, 2);
        assert_eq!(config.sweep_interval_seconds(), 7);
        assert_eq!(config.time_sources, vec!["https://time.test/utc".to_string()]);
    }

    #[test]
    fn session_cookie_secure_follows_frontend_scheme() {
        let secure = AuthConfig::new("https://rakonti.dev".to_string());
        assert!(secure.session_cookie_secure());

        let insecure = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!insecure.session_cookie_secure());
    }

    #[test]
    fn auth_state_builds_flow_stores() {
        let config = AuthConfig::new("https://rakonti.dev".to_string());
        let state = AuthState::new(config, Arc::new(LogCodeSender)).unwrap();
        assert_eq!(state.phone_store().flow(), "phone");
        assert_eq!(state.email_store().flow(), "email");
        assert_eq!(state.terms_store().flow(), "terms");
    }
}
