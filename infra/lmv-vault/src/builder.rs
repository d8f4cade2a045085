use crate::engine::{Vault, VaultInner};
use crate::error::VaultError;
use private::Sealed;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Default, ZeroizeOnDrop)]
pub struct NoPassphrase;
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct WithPassphrase(Vec<u8>);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoPassphrase {}
impl Sealed for WithPassphrase {}

/// A builder for secure initialization of the [`Vault`].
///
/// Implements `ZeroizeOnDrop` to ensure that the raw passphrase bytes are
/// cleared from memory as soon as the builder is no longer needed.
#[allow(private_bounds)]
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct VaultBuilder<P: Sealed + ZeroizeOnDrop = NoPassphrase> {
    passphrase: P,
}

impl Default for VaultBuilder {
    fn default() -> Self {
        Self { passphrase: NoPassphrase }
    }
}

impl VaultBuilder {
    /// Creates a new empty builder.
    #[must_use = "Builder must be configured with `passphrase` before use"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the passphrase from which per-record keys are derived.
    ///
    /// The passphrase itself is never stored encoded; [`Vault`] keeps the raw
    /// bytes behind a `Zeroize`-wrapped buffer and derives a fresh scrypt
    /// master key (and HKDF record key) for every encrypt/decrypt call, using
    /// the salt carried in each envelope.
    #[must_use = "Builder must be finalized with `build` to produce a Vault"]
    pub fn passphrase(self, passphrase: impl AsRef<[u8]>) -> VaultBuilder<WithPassphrase> {
        VaultBuilder { passphrase: WithPassphrase(passphrase.as_ref().to_vec()) }
    }
}

impl VaultBuilder<WithPassphrase> {
    /// Finalizes vault construction and zeroes the builder.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidConfiguration`] if the passphrase is empty.
    pub fn build(mut self) -> Result<Vault, VaultError> {
        if self.passphrase.0.is_empty() {
            return Err(VaultError::InvalidConfiguration {
                message: "passphrase must not be empty".into(),
                context: None,
            });
        }

        let vault = VaultInner { passphrase: self.passphrase.0.clone() };
        self.zeroize();

        Ok(Vault { inner: Arc::new(vault) })
    }
}
