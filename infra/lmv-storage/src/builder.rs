use crate::engine::{Storage, StorageInner};
use crate::error::{StorageError, StorageErrorExt};
use private::Sealed;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone, Default)]
struct StorageConfig {
    create: bool,
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct StorageBuilder<S: Sealed = NoRoot> {
    state: S,
    config: StorageConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> StorageBuilder<S> {
    #[must_use = "Sets whether the data directory should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StorageBuilder<N> {
        StorageBuilder { state, config: self.config }
    }
}

impl StorageBuilder<NoRoot> {
    #[must_use = "Creates a new storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the data directory path for the storage engine"]
    pub fn root(self, path: impl Into<PathBuf>) -> StorageBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl StorageBuilder<WithRoot> {
    /// Consumes the configuration and initializes the storage engine.
    ///
    /// This performs the boot sequence: bootstrap the data directory if
    /// `create(true)` was set, canonicalize it to an absolute physical path,
    /// then self-heal by removing any orphaned temp files left behind by a
    /// crash during a previous write.
    ///
    /// # Errors
    /// Returns [`StorageError::Io`] if the directory does not exist and
    /// `create` is false, or if it cannot be created or resolved.
    pub async fn connect(self) -> Result<Storage, StorageError> {
        let root = &self.state.0;

        if self.config.create {
            fs::create_dir_all(root)
                .await
                .context(format!("failed to bootstrap data directory: {}", root.display()))?;
            info!(path = %root.display(), "Bootstrapped data directory");
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("failed to resolve data directory: {}", root.display()))?;

        let storage = Storage {
            inner: Arc::new(StorageInner { root: canonical, tmp_counter: AtomicU64::new(1) }),
        };

        storage.purge_tmp().await;

        Ok(storage)
    }
}
