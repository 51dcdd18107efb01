//! Trusted time source for issuance-time expiry stamps.
//!
//! Expiry timestamps written at token issuance come from an ordered list of
//! remote UTC references so a skewed or tampered local clock cannot stretch
//! token lifetimes. Every source failure is logged and the next source tried;
//! only when all sources fail does the local clock take over as graceful
//! degradation. Read-time expiry checks stay on the store's clock.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_TIMEOUT_SECONDS: u64 = 3;

/// JSON fields probed on a time endpoint payload, in order.
const TIME_FIELDS: [&str; 5] = [
    "utc_datetime",
    "currentDateTime",
    "dateTime",
    "datetime",
    "utc_time",
];

pub(crate) const DEFAULT_TIME_SOURCES: [&str; 2] = [
    "https://worldtimeapi.org/api/timezone/Etc/UTC",
    "https://worldclockapi.com/api/json/utc/now",
];

/// Outcome of the most recent time resolution, reported by /health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClockStatus {
    /// No resolution attempted yet.
    Unused,
    /// Last resolution came from a remote source.
    Ok,
    /// All sources failed; local clock answered.
    Fallback,
}

impl ClockStatus {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Ok => "ok",
            Self::Fallback => "fallback",
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Unused => 0,
            Self::Ok => 1,
            Self::Fallback => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ok,
            2 => Self::Fallback,
            _ => Self::Unused,
        }
    }
}

pub(crate) struct TrustedClock {
    sources: Vec<String>,
    client: Client,
    last_status: AtomicU8,
}

impl TrustedClock {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub(crate) fn new(sources: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build time source HTTP client")?;
        Ok(Self {
            sources,
            client,
            last_status: AtomicU8::new(ClockStatus::Unused.as_u8()),
        })
    }

    /// Current UTC per the first healthy source; local clock when all fail.
    pub(crate) async fn now(&self) -> DateTime<Utc> {
        for source in &self.sources {
            match self.fetch_source(source).await {
                Ok(now) => {
                    debug!(source = %source, "resolved trusted time");
                    self.set_status(ClockStatus::Ok);
                    return now;
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "time source failed, trying next");
                }
            }
        }
        self.set_status(ClockStatus::Fallback);
        Utc::now()
    }

    pub(crate) fn status(&self) -> ClockStatus {
        ClockStatus::from_u8(self.last_status.load(Ordering::Relaxed))
    }

    fn set_status(&self, status: ClockStatus) {
        self.last_status.store(status.as_u8(), Ordering::Relaxed);
    }

    async fn fetch_source(&self, url: &str) -> Result<DateTime<Utc>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("non-success status")?;
        let payload: serde_json::Value = response.json().await.context("invalid JSON payload")?;
        parse_time_payload(&payload).ok_or_else(|| anyhow!("no recognizable time field"))
    }
}

fn parse_time_payload(payload: &serde_json::Value) -> Option<DateTime<Utc>> {
    TIME_FIELDS.iter().find_map(|field| {
        payload
            .get(field)
            .and_then(serde_json::Value::as_str)
            .and_then(parse_timestamp)
    })
}

/// Parse the timestamp shapes the known endpoints answer with: RFC 3339,
/// zone-less with fractional seconds, and minute-precision with a `Z`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let parsed = parse_timestamp("2026-03-01T10:15:30.123456+00:00");
        assert!(parsed.is_some());
        if let Some(parsed) = parsed {
            assert_eq!(parsed.timezone(), Utc);
        }
    }

    #[test]
    fn parse_timestamp_accepts_zoneless_fractional() {
        assert!(parse_timestamp("2026-03-01T10:15:30.1919822").is_some());
        assert!(parse_timestamp("2026-03-01T10:15:30").is_some());
    }

    #[test]
    fn parse_timestamp_accepts_minute_precision() {
        assert!(parse_timestamp("2026-03-01T10:15Z").is_some());
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("not-a-time").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn parse_time_payload_probes_known_fields() {
        let payload = json!({"utc_datetime": "2026-03-01T10:15:30+00:00"});
        assert!(parse_time_payload(&payload).is_some());

        let payload = json!({"currentDateTime": "2026-03-01T10:15Z"});
        assert!(parse_time_payload(&payload).is_some());

        let payload = json!({"dateTime": "2026-03-01T10:15:30.1919822"});
        assert!(parse_time_payload(&payload).is_some());

        let payload = json!({"unrelated": "2026-03-01T10:15:30+00:00"});
        assert!(parse_time_payload(&payload).is_none());
    }

    #[tokio::test]
    async fn falls_back_to_local_clock_when_sources_fail() {
        let clock = TrustedClock::new(vec!["http://127.0.0.1:1/time".to_string()]).unwrap();
        let before = Utc::now();
        let now = clock.now().await;
        let after = Utc::now();
        assert!(now >= before - ChronoDuration::seconds(1));
        assert!(now <= after + ChronoDuration::seconds(1));
        assert_eq!(clock.status(), ClockStatus::Fallback);
    }

    #[tokio::test]
    async fn empty_source_list_uses_local_clock() {
        let clock = TrustedClock::new(Vec::new()).unwrap();
        assert_eq!(clock.status(), ClockStatus::Unused);
        let now = clock.now().await;
        assert!((Utc::now() - now).num_seconds().abs() <= 1);
        assert_eq!(clock.status(), ClockStatus::Fallback);
    }

}
