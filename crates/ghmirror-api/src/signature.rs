//! Webhook signature verification.
//!
//! HMAC-SHA-256 over the raw request body, compared constant-time against
//! the hex digest in `X-Hub-Signature-256` (with or without the `sha256=`
//! prefix). Verification happens before anything is persisted as valid.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// The shared webhook secret.
///
/// Zeroized on drop and excluded from `Debug` output.
pub struct WebhookSecret(Zeroizing<String>);

impl WebhookSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// Raw secret for hook registration at connect time.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Verify a `sha256=<hex>` signature header against `payload`.
    ///
    /// The comparison runs in constant time via `Mac::verify_slice`; any
    /// malformed header simply fails verification.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> bool {
        let hex_part = signature_header
            .strip_prefix("sha256=")
            .unwrap_or(signature_header);
        let Ok(signature) = hex::decode(hex_part) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.0.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&signature).is_ok()
    }

    /// Compute the `sha256=<hex>` signature for `payload`. Used by tests
    /// and by tooling that replays stored payloads.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.0.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WebhookSecret").field(&"<REDACTED>").finish()
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
