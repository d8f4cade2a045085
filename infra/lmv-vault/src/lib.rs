//! A single-algorithm, domain-isolated envelope vault.
//!
//! This crate implements the cryptographic envelope used to seal the vault
//! snapshot and journal entries on disk: a JSON object carrying every
//! parameter needed to reverse the encryption, so a reader never has to
//! consult external configuration to decrypt a record.
//!
//! ## Envelope Format
//!
//! ```text
//! {
//!   "v": 1,
//!   "kdf": {"name": "scrypt", "N": 32768, "r": 8, "p": 1, "keylen": 32, "salt_b64": "..."},
//!   "hkdf": {"name": "hkdf-sha256", "info": "vault" | "ledger"},
//!   "aead": {"alg": "aes-256-gcm", "iv_b64": "...", "tag_b64": "...", "aad_b64": "..."},
//!   "ciphertext_b64": "..."
//! }
//! ```
//!
//! ## Key Derivation
//!
//! Each envelope carries its own randomly generated salt. The vault never
//! caches a derived key: every [`Vault::encrypt`]/[`Vault::decrypt`] call runs
//! scrypt(passphrase, salt) to produce a 32-byte master key, then
//! HKDF-SHA256(master, info=domain) to produce the record key actually used
//! by AES-256-GCM. The `info` tag separates the vault-snapshot domain from
//! the ledger domain: a key derived for one can never decrypt the other.
//!
//! ## Nonce Policy
//!
//! A fresh random 96-bit nonce is generated for every encryption, alongside
//! the fresh salt. Reusing a nonce under the same key is the one AES-GCM
//! failure mode this design cannot detect; since the key itself changes with
//! every encryption (new salt, new scrypt output), nonce reuse is the primary
//! residual risk this crate guards against by never reusing a derived key.
//!
//! ## Canonicalization
//!
//! [`canon::canonical_json`] produces the deterministic JSON form used both
//! as AEAD associated data and as the hash-chain input for the journal.

mod builder;
pub mod canon;
mod engine;
mod error;
mod types;

pub use builder::VaultBuilder;
pub use engine::Vault;
pub use error::{VaultError, VaultErrorExt};
pub use types::{AeadParams, Domain, Envelope, HkdfParams, KdfParams};
