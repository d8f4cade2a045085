pub mod fixtures;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use fixtures::setup_vault;
use lmv_vault::{Domain, Vault, VaultError};
use serde_json::json;

#[test]
fn wrong_passphrase_fails_as_decryption_error() {
    let vault = setup_vault();
    let other = Vault::builder().passphrase("a different secret").build().unwrap();
    let envelope =
        vault.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).expect("encrypt failed");

    let result = other.decrypt(&envelope, Domain::Vault);
    assert!(matches!(result, Err(VaultError::Decryption { .. })));
}

#[test]
fn aad_binding_detects_tampering() {
    let vault = setup_vault();
    let aad = json!({"memory_key": "right-context"});
    let envelope =
        vault.encrypt(&json!({"a": 1}), Domain::Vault, &aad).expect("encrypt failed");

    let mut tampered = envelope;
    tampered.aead.aad_b64 = B64.encode(br#"{"memory_key":"wrong-context"}"#);

    let result = vault.decrypt(&tampered, Domain::Vault);
    assert!(
        matches!(result, Err(VaultError::Decryption { .. })),
        "decryption must fail when the AAD bound at encryption time is altered"
    );
}

#[test]
fn ledger_and_vault_domains_are_not_interchangeable() {
    let vault = setup_vault();
    let ledger_envelope =
        vault.encrypt(&json!({"op": "put"}), Domain::Ledger, &json!({})).unwrap();

    let result = vault.decrypt(&ledger_envelope, Domain::Vault);
    assert!(matches!(result, Err(VaultError::DomainMismatch { .. })));
}

#[test]
fn empty_passphrase_is_rejected() {
    let result = Vault::builder().passphrase("").build();
    assert!(matches!(result, Err(VaultError::InvalidConfiguration { .. })));
}
