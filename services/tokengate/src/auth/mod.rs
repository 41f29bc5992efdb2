//! Token signing, the exchange flow, and token verification.
pub mod claims;
pub mod exchange;
pub mod signer;
pub mod verify;
