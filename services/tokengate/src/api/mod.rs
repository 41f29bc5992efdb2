//! Gateway HTTP API surface shared by the token handlers.
pub mod error;
pub mod system;
pub mod types;
