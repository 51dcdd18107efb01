//! API handlers for rakonti.
//!
//! This module organizes the service's route handlers: the auth flows
//! with their session middleware, the health endpoint, and the
//! undocumented root.

pub mod auth;
pub mod health;
pub mod root;
