//! HMAC-SHA256 payload signing and verification.

use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of generated webhook secrets.
pub const SECRET_LENGTH: usize = 32;

/// A serialized request body together with its hex signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// The exact bytes sent as the request body.
    pub body: String,
    /// Lowercase hex HMAC-SHA256 of `body`.
    pub signature: String,
}

impl SignedPayload {
    /// Signs an already serialized body.
    pub fn new(body: impl Into<String>, secret: &str) -> Self {
        let body = body.into();
        let signature = sign(body.as_bytes(), secret);
        Self { body, signature }
    }
}

/// Computes the lowercase hex HMAC-SHA256 of `payload` keyed by `secret`.
///
/// An empty secret is accepted.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex signature over `payload` in constant time.
///
/// Returns `false` for malformed hex and for signatures of the wrong length.
pub fn verify(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Generates a random alphanumeric webhook secret.
pub fn generate_secret() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}
