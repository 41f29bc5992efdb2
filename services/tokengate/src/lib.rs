//! Token-mediated proxy gateway.
//!
//! # Purpose
//! Exchanges a caller's request for a signed token: the gateway asserts its own
//! identity to a configured downstream service, forwards the caller's body, and
//! re-signs the downstream JSON answer. A second endpoint verifies tokens the
//! gateway issued.
//!
//! # Notes
//! All state is fixed at startup; requests share it read-only.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod forward;
pub mod observability;
