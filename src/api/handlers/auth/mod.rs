//! Session and verification flow handlers.
//!
//! Login endpoints mint opaque bearer tokens, the pending stores drive
//! the phone and email code exchanges, and the router middleware
//! resolves every request token against live session rows. Restricted
//! flow tokens walk the phone and terms gates before they are traded
//! for a full session.

pub(crate) mod clock;
mod dedup;
pub(crate) mod email;
mod identity;
mod issuer;
pub(crate) mod login;
pub(crate) mod me;
pub(crate) mod middleware;
mod notify;
mod pending;
pub(crate) mod phone;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod terms;
mod token;
pub(crate) mod types;
mod utils;

pub use middleware::{AuthSession, session_gate};
pub use notify::{CodeSender, LogCodeSender};
pub use state::{AuthConfig, AuthState};
pub(crate) use state::spawn_expiry_sweeper;
pub(crate) use storage::delete_expired_sessions;
