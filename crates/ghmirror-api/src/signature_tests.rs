//! Tests for webhook signature verification.

use super::*;

#[test]
fn test_valid_signature_with_prefix_accepted() {
    let secret = WebhookSecret::new("my-test-secret");
    let payload = br#"{"action":"opened"}"#;
    let signature = secret.sign(payload);
    assert!(signature.starts_with("sha256="));
    assert!(secret.verify(payload, &signature));
}

#[test]
fn test_valid_signature_without_prefix_accepted() {
    let secret = WebhookSecret::new("my-test-secret");
    let payload = b"hello world";
    let signature = secret.sign(payload);
    let bare = signature.strip_prefix("sha256=").expect("prefix");
    assert!(secret.verify(payload, bare));
}

#[test]
fn test_wrong_secret_rejected() {
    let signer = WebhookSecret::new("correct-secret");
    let verifier = WebhookSecret::new("wrong-secret");
    let payload = b"some payload";
    let signature = signer.sign(payload);
    assert!(!verifier.verify(payload, &signature));
}

#[test]
fn test_tampered_payload_rejected() {
    let secret = WebhookSecret::new("my-secret");
    let signature = secret.sign(b"original payload");
    assert!(!secret.verify(b"tampered payload", &signature));
}

#[test]
fn test_non_hex_signature_rejected() {
    let secret = WebhookSecret::new("my-secret");
    assert!(!secret.verify(b"payload", "sha256=not-valid-hex!!"));
    assert!(!secret.verify(b"payload", ""));
}

#[test]
fn test_empty_payload_round_trips() {
    let secret = WebhookSecret::new("empty-payload-secret");
    let signature = secret.sign(b"");
    assert!(secret.verify(b"", &signature));
}

#[test]
fn test_debug_redacts_secret() {
    let secret = WebhookSecret::new("top-secret-value");
    let rendered = format!("{:?}", secret);
    assert!(!rendered.contains("top-secret-value"));
    assert!(rendered.contains("<REDACTED>"));
}
