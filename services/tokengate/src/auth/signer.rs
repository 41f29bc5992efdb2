//! HS256 token signing and verification.
//!
//! # Purpose
//! Mint and validate compact JWS tokens with the single process-wide symmetric
//! secret. Both the outbound assertion sent downstream and the token returned
//! to callers go through the same signer.
//!
//! # Key invariants
//! - Tokens are always HS256. Any other header algorithm (including `none`) is
//!   rejected before the signature is looked at.
//! - No `kid` is emitted and exactly one key is ever tried.
//! - The secret is at least [`MIN_SECRET_LEN`] bytes and never logged.
//!
//! # Security model
//! - Callers may present arbitrary strings; every failure is classified into a
//!   [`VerificationFailure`] without echoing token contents.
//! - Signature comparison is delegated to `jsonwebtoken`, whose HMAC
//!   verification is constant time.
//!
//! # How to use
//! Build an [`Hs256Signer`] from a validated [`Secret`] and use it through the
//! [`TokenSigner`] trait so handlers do not depend on the key layout.
use crate::auth::claims::ClaimSet;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const ALGORITHM: Algorithm = Algorithm::HS256;
const ALGORITHM_NAME: &str = "HS256";

/// Symmetric signing secret.
///
/// `Debug` never prints the key bytes.
#[derive(Clone)]
pub struct Secret(Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("signing secret must be at least {min} bytes, got {actual}")]
pub struct SecretTooShort {
    pub actual: usize,
    pub min: usize,
}

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretTooShort> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(SecretTooShort {
                actual: bytes.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self(bytes))
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED; {} bytes])", self.0.len())
    }
}

/// Compact `header.payload.signature` token string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How verification treats an `exp` claim that lies in the past.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Expired tokens fail with [`VerificationFailure::Expired`].
    #[default]
    Reject,
    /// Expiry is not enforced; the decoded `exp` is returned as-is.
    Accept,
}

/// Claims could not be turned into a token.
#[derive(Debug, thiserror::Error)]
#[error("failed to sign claims: {0}")]
pub struct SigningError(#[source] jsonwebtoken::errors::Error);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationFailure {
    Malformed,
    SignatureMismatch,
    UnsupportedAlgorithm,
    Expired,
}

impl VerificationFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationFailure::Malformed => "malformed",
            VerificationFailure::SignatureMismatch => "signature_mismatch",
            VerificationFailure::UnsupportedAlgorithm => "unsupported_algorithm",
            VerificationFailure::Expired => "expired",
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A presented token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct VerificationError {
    pub reason: VerificationFailure,
    pub detail: String,
}

impl VerificationError {
    fn new(reason: VerificationFailure, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    fn malformed(detail: impl Into<String>) -> Self {
        Self::new(VerificationFailure::Malformed, detail)
    }
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let reason = match err.kind() {
            ErrorKind::InvalidSignature => VerificationFailure::SignatureMismatch,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => VerificationFailure::UnsupportedAlgorithm,
            ErrorKind::ExpiredSignature => VerificationFailure::Expired,
            _ => VerificationFailure::Malformed,
        };
        Self::new(reason, err.to_string())
    }
}

/// Signs and verifies claim sets.
///
/// Handlers are generic over this trait so a different key arrangement can
/// replace [`Hs256Signer`] without touching them.
pub trait TokenSigner: Send + Sync + 'static {
    fn sign<D: Serialize>(&self, claims: &ClaimSet<D>) -> Result<SignedToken, SigningError>;

    fn verify(&self, token: &str) -> Result<ClaimSet, VerificationError>;
}

/// [`TokenSigner`] backed by one HMAC-SHA256 secret.
#[derive(Clone)]
pub struct Hs256Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256Signer {
    pub fn new(secret: Secret, expiry: ExpiryPolicy) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = expiry == ExpiryPolicy::Reject;
        validation.validate_aud = false;
        Self {
            encoding_key: EncodingKey::from_secret(&secret.0),
            decoding_key: DecodingKey::from_secret(&secret.0),
            validation,
        }
    }
}

impl fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Signer")
            .field("algorithm", &ALGORITHM)
            .field("validate_exp", &self.validation.validate_exp)
            .finish_non_exhaustive()
    }
}

impl TokenSigner for Hs256Signer {
    fn sign<D: Serialize>(&self, claims: &ClaimSet<D>) -> Result<SignedToken, SigningError> {
        let header = Header::new(ALGORITHM);
        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map(SignedToken)
            .map_err(SigningError)
    }

    fn verify(&self, token: &str) -> Result<ClaimSet, VerificationError> {
        check_header_algorithm(token)?;
        let decoded = jsonwebtoken::decode::<ClaimSet>(token, &self.decoding_key, &self.validation)?;
        Ok(decoded.claims)
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: Option<String>,
}

// jsonwebtoken cannot parse headers naming algorithms it does not know (such
// as `none`), so the declared algorithm is inspected here first.
fn check_header_algorithm(token: &str) -> Result<(), VerificationError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(VerificationError::malformed(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    }
    let raw = URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|err| VerificationError::malformed(format!("header encoding: {err}")))?;
    let header: RawHeader = serde_json::from_slice(&raw)
        .map_err(|err| VerificationError::malformed(format!("header json: {err}")))?;
    match header.alg.as_deref() {
        Some(ALGORITHM_NAME) => Ok(()),
        Some(other) => Err(VerificationError::new(
            VerificationFailure::UnsupportedAlgorithm,
            format!("algorithm {other} is not accepted"),
        )),
        None => Err(VerificationError::new(
            VerificationFailure::UnsupportedAlgorithm,
            "header declares no algorithm",
        )),
    }
}
