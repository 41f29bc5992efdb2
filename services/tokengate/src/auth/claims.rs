//! Claim sets carried by gateway tokens.
//!
//! Every token the gateway signs has the same shape: an opaque `data` blob and
//! an `exp` fixed at signing time plus [`TOKEN_TTL`]. Neither builder inspects
//! the blob it wraps.
//!
//! Decoding keeps any other claim a token carries in [`ClaimSet::extra`], so a
//! token signed elsewhere with the shared secret is reported in full.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime of every token the gateway signs.
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// JSON object returned by the downstream service.
pub type RemoteResponse = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSet<D = Value> {
    pub data: D,
    pub exp: i64,
    // Always empty on tokens the gateway signs.
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, Value>,
}

impl<D> ClaimSet<D> {
    pub fn new(data: D, exp: i64) -> Self {
        Self {
            data,
            exp,
            extra: serde_json::Map::new(),
        }
    }
}

/// Claims for the assertion sent to the downstream service.
pub fn build_outbound_assertion_claims<D>(static_data: &D, now: i64) -> ClaimSet<&D> {
    ClaimSet::new(static_data, expiry_from(now))
}

/// Claims for the token handed back to the caller.
pub fn build_response_claims(remote_response: RemoteResponse, now: i64) -> ClaimSet<RemoteResponse> {
    ClaimSet::new(remote_response, expiry_from(now))
}

pub fn expiry_from(now: i64) -> i64 {
    now + TOKEN_TTL.as_secs() as i64
}

pub fn now_epoch_seconds() -> i64 {
    // A clock before the epoch clamps to zero instead of panicking.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
