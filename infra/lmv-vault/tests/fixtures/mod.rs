use lmv_vault::Vault;

/// Builds a `Vault` with a fixed test passphrase.
///
/// # Panics
/// If vault construction fails.
#[must_use]
pub fn setup_vault() -> Vault {
    Vault::builder().passphrase("master-secret-123").build().expect("vault setup failed")
}
