use aead::inout::InOutBuf;
use aead::{AeadInOut, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use getrandom::fill;
use hkdf::Hkdf;
use scrypt::Params;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use zeroize::Zeroize;

use crate::builder::VaultBuilder;
use crate::canon::canonical_json;
use crate::error::VaultError;
use crate::types::{
    AeadParams, Domain, Envelope, HkdfParams, KdfParams, NONCE_LEN, SALT_LEN, SCRYPT_KEYLEN,
    SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R,
};

const KDF_NAME: &str = "scrypt";
const HKDF_NAME: &str = "hkdf-sha256";
const AEAD_ALG: &str = "aes-256-gcm";
const ENVELOPE_VERSION: u8 = 1;
const TAG_LEN: usize = 16;

#[derive(Debug)]
pub(crate) struct VaultInner {
    pub(crate) passphrase: Vec<u8>,
}

impl Drop for VaultInner {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

/// A sealed passphrase, ready to encrypt and decrypt envelopes.
///
/// Cloning is cheap: the passphrase is kept behind an [`Arc`] and shared, never
/// copied. Every [`Vault::encrypt`]/[`Vault::decrypt`] call derives a fresh
/// scrypt master key from the passphrase and the envelope's own salt; nothing
/// is cached between calls, since the security model requires each envelope
/// to be cryptographically independent of every other.
#[derive(Debug, Clone)]
pub struct Vault {
    pub(crate) inner: Arc<VaultInner>,
}

impl Vault {
    #[must_use]
    pub fn builder() -> VaultBuilder {
        VaultBuilder::new()
    }

    fn derive_master_key(&self, salt: &[u8]) -> Result<[u8; SCRYPT_KEYLEN], VaultError> {
        let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_KEYLEN).map_err(|e| {
            VaultError::Internal {
                message: format!("invalid scrypt parameters: {e}").into(),
                context: None,
            }
        })?;

        let mut master = [0u8; SCRYPT_KEYLEN];
        scrypt::scrypt(&self.inner.passphrase, salt, &params, &mut master).map_err(|e| {
            VaultError::Internal { message: format!("scrypt derivation failed: {e}").into(), context: None }
        })?;
        Ok(master)
    }

    fn derive_record_key(master: &[u8], domain: Domain) -> [u8; 32] {
        let hk = Hkdf::<Sha256>::new(None, master);
        let mut record_key = [0u8; 32];
        hk.expand(domain.as_str().as_bytes(), &mut record_key)
            .expect("HKDF output length 32 is always valid for SHA-256");
        record_key
    }

    /// Encrypts `payload` under `domain`, binding `aad_context` as associated
    /// data. The returned envelope carries everything needed to reverse the
    /// operation: a fresh random salt and nonce, the KDF/HKDF/AEAD parameters,
    /// the base64-encoded AAD, and the base64-encoded ciphertext.
    ///
    /// # Errors
    /// Returns [`VaultError::Envelope`] if `payload` cannot be serialized, or
    /// [`VaultError::Encryption`] if the AEAD seal fails.
    pub fn encrypt(
        &self,
        payload: &Value,
        domain: Domain,
        aad_context: &Value,
    ) -> Result<Envelope, VaultError> {
        let mut salt = [0u8; SALT_LEN];
        fill(&mut salt).map_err(|e| VaultError::Internal {
            message: format!("system RNG unavailable for salt generation: {e}").into(),
            context: None,
        })?;
        let mut iv = [0u8; NONCE_LEN];
        fill(&mut iv).map_err(|e| VaultError::Internal {
            message: format!("system RNG unavailable for nonce generation: {e}").into(),
            context: None,
        })?;

        let master = self.derive_master_key(&salt)?;
        let record_key = Self::derive_record_key(&master, domain);

        let mut ciphertext = serde_json::to_vec(payload)
            .map_err(|source| VaultError::Envelope { source, context: Some("serializing payload".into()) })?;
        let aad_bytes = canonical_json(aad_context).into_bytes();

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&record_key));
        let nonce = Nonce::<Aes256Gcm>::from_slice(&iv);
        let in_out = InOutBuf::from(ciphertext.as_mut_slice());
        let tag = cipher.encrypt_inout_detached(nonce, &aad_bytes, in_out).map_err(|_| {
            VaultError::Encryption {
                message: "AEAD seal failed".into(),
                context: Some(format!("domain={domain}").into()),
            }
        })?;

        Ok(Envelope {
            v: ENVELOPE_VERSION,
            kdf: KdfParams {
                name: KDF_NAME.to_string(),
                n: 1u32 << SCRYPT_LOG_N,
                r: SCRYPT_R,
                p: SCRYPT_P,
                keylen: SCRYPT_KEYLEN,
                salt_b64: B64.encode(salt),
            },
            hkdf: HkdfParams { name: HKDF_NAME.to_string(), info: domain.as_str().to_string() },
            aead: AeadParams {
                alg: AEAD_ALG.to_string(),
                iv_b64: B64.encode(iv),
                tag_b64: B64.encode(tag.as_slice()),
                aad_b64: B64.encode(&aad_bytes),
            },
            ciphertext_b64: B64.encode(ciphertext),
        })
    }

    /// Decrypts `envelope`, verifying it was sealed for `expected_domain`.
    /// Returns the decrypted payload and the AAD context that was bound at
    /// encryption time, so the caller can re-derive and compare it.
    ///
    /// # Errors
    /// Returns [`VaultError::DomainMismatch`] if the envelope's `hkdf.info`
    /// does not match `expected_domain`, or [`VaultError::Decryption`] if any
    /// base64 field is malformed or the AEAD tag fails to verify (wrong
    /// passphrase or tampered data — the two are indistinguishable by design).
    pub fn decrypt(
        &self,
        envelope: &Envelope,
        expected_domain: Domain,
    ) -> Result<(Value, Value), VaultError> {
        if envelope.hkdf.info != expected_domain.as_str() {
            return Err(VaultError::DomainMismatch {
                expected: expected_domain.as_str().into(),
                found: envelope.hkdf.info.clone().into(),
                context: None,
            });
        }

        let salt = B64
            .decode(&envelope.kdf.salt_b64)
            .map_err(|_| VaultError::Decryption { message: "malformed salt encoding".into(), context: None })?;
        let iv = B64
            .decode(&envelope.aead.iv_b64)
            .map_err(|_| VaultError::Decryption { message: "malformed nonce encoding".into(), context: None })?;
        let tag = B64
            .decode(&envelope.aead.tag_b64)
            .map_err(|_| VaultError::Decryption { message: "malformed tag encoding".into(), context: None })?;
        let aad_bytes = B64
            .decode(&envelope.aead.aad_b64)
            .map_err(|_| VaultError::Decryption { message: "malformed AAD encoding".into(), context: None })?;
        let ciphertext = B64.decode(&envelope.ciphertext_b64).map_err(|_| VaultError::Decryption {
            message: "malformed ciphertext encoding".into(),
            context: None,
        })?;

        if iv.len() != NONCE_LEN {
            return Err(VaultError::Decryption { message: "invalid nonce length".into(), context: None });
        }
        if tag.len() != TAG_LEN {
            return Err(VaultError::Decryption { message: "invalid tag length".into(), context: None });
        }

        let master = self.derive_master_key(&salt)?;
        let record_key = Self::derive_record_key(&master, expected_domain);

        let mut buf = ciphertext;
        let tag = aead::Tag::<Aes256Gcm>::clone_from_slice(&tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&record_key));
        let nonce = Nonce::<Aes256Gcm>::from_slice(&iv);
        let in_out = InOutBuf::from(buf.as_mut_slice());
        cipher.decrypt_inout_detached(nonce, &aad_bytes, in_out, &tag).map_err(|_| {
            VaultError::Decryption {
                message: "AEAD tag verification failed".into(),
                context: Some("wrong passphrase or corrupted envelope".into()),
            }
        })?;

        let payload: Value = serde_json::from_slice(&buf)
            .map_err(|source| VaultError::Envelope { source, context: Some("decoding payload".into()) })?;
        let aad_context: Value = serde_json::from_slice(&aad_bytes)
            .map_err(|source| VaultError::Envelope { source, context: Some("decoding AAD context".into()) })?;

        Ok((payload, aad_context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vault() -> Vault {
        Vault::builder().passphrase("correct horse battery staple").build().unwrap()
    }

    #[test]
    fn round_trips_payload_and_aad() {
        let v = vault();
        let payload = json!({"key": "alpha", "value": 42});
        let aad = json!({"memory_key": "alpha", "version": 1});

        let envelope = v.encrypt(&payload, Domain::Vault, &aad).unwrap();
        assert_eq!(envelope.aead.alg, "aes-256-gcm");
        assert_eq!(envelope.hkdf.info, "vault");

        let (decoded_payload, decoded_aad) = v.decrypt(&envelope, Domain::Vault).unwrap();
        assert_eq!(decoded_payload, payload);
        assert_eq!(decoded_aad, aad);
    }

    #[test]
    fn rejects_domain_mismatch() {
        let v = vault();
        let envelope = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        let err = v.decrypt(&envelope, Domain::Ledger).unwrap_err();
        assert!(matches!(err, VaultError::DomainMismatch { .. }));
    }

    #[test]
    fn rejects_wrong_passphrase() {
        let v1 = vault();
        let v2 = Vault::builder().passphrase("a different passphrase").build().unwrap();
        let envelope = v1.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        let err = v2.decrypt(&envelope, Domain::Vault).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let v = vault();
        let mut envelope = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        let mut raw = B64.decode(&envelope.ciphertext_b64).unwrap();
        raw[0] ^= 0xFF;
        envelope.ciphertext_b64 = B64.encode(raw);
        let err = v.decrypt(&envelope, Domain::Vault).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn rejects_tampered_tag() {
        let v = vault();
        let mut envelope = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        let mut raw = B64.decode(&envelope.aead.tag_b64).unwrap();
        raw[0] ^= 0xFF;
        envelope.aead.tag_b64 = B64.encode(raw);
        let err = v.decrypt(&envelope, Domain::Vault).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn rejects_tampered_aad() {
        let v = vault();
        let mut envelope = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({"k": "v"})).unwrap();
        envelope.aead.aad_b64 = B64.encode(br#"{"k":"tampered"}"#);
        let err = v.decrypt(&envelope, Domain::Vault).unwrap_err();
        assert!(matches!(err, VaultError::Decryption { .. }));
    }

    #[test]
    fn each_encryption_uses_a_fresh_salt_and_nonce() {
        let v = vault();
        let a = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        let b = v.encrypt(&json!({"a": 1}), Domain::Vault, &json!({})).unwrap();
        assert_ne!(a.kdf.salt_b64, b.kdf.salt_b64);
        assert_ne!(a.aead.iv_b64, b.aead.iv_b64);
    }
}
