//! GitHub webhook signature verification using HMAC-SHA1.
//!
//! GitHub signs webhook payloads using HMAC-SHA1 with a shared secret and
//! delivers the result in the `X-Hub-Signature` header as `sha1=<hex>`.
//!
//! Signature verification is the first authenticated step in webhook
//! processing; requests with missing or invalid signatures must be rejected
//! before any side effect.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Parses a GitHub signature header (e.g., "sha1=abc123...") into raw bytes.
///
/// Returns `None` for malformed headers (missing prefix, wrong algorithm,
/// invalid hex). Never panics.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha1=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA1 signature of a payload using the given secret.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature the way GitHub sends it: `sha1=<lowercase hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha1={}", hex::encode(signature))
}

/// Verifies a webhook signature against the payload and secret.
///
/// Returns `true` if the signature is valid, `false` otherwise. The
/// comparison runs in constant time.
///
/// # Arguments
///
/// * `payload` - The raw webhook payload bytes
/// * `signature_header` - The value of the `X-Hub-Signature` header
/// * `secret` - The shared secret configured in GitHub
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected_signature = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };

    let mut mac = match HmacSha1::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&expected_signature).is_ok()
}
