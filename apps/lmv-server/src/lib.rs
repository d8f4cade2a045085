//! # LMV Server
//!
//! The HTTP control plane for the vault: opens the on-disk storage and the
//! AEAD vault codec, builds the engine, and serves the request surface
//! (`/healthz`, `/v1/memory`, `/v1/ledger`, `/v1/snapshot`) over plain HTTP.
//!
//! ## Example
//! ```no_run
//! use lmv_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = lmv_kernel::config::load_config()?;
//!     Server::builder().config(cfg).build().await?.run().await
//! }
//! ```

mod gate;
mod ledger;
mod memory;
mod router;
mod snapshot;

use anyhow::{Context, Result};
use axum_server::Handle;
use lmv_domain::ApiConfig;
use lmv_engine::Engine;
use lmv_kernel::server::ApiState;
use lmv_storage::Storage;
use lmv_vault::Vault;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ApiConfig,
}

impl ServerBuilder {
    /// Set up the server's configuration.
    pub fn config(mut self, cfg: ApiConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.port = port;
        self
    }

    /// Consumes the builder and initializes the server.
    ///
    /// # Process
    /// 1. Opens the data directory, creating it if absent.
    /// 2. Derives the vault's key material from the configured passphrase.
    /// 3. Opens the vault engine, bootstrapping an empty vault if needed.
    /// 4. Constructs application state.
    ///
    /// # Errors
    /// Returns an error if `LMV_PASSPHRASE` is unset, the data directory
    /// cannot be created or resolved, or the engine fails to bootstrap its
    /// initial snapshot.
    ///
    /// # Examples
    /// ```no_run
    /// # use lmv_server::Server;
    /// # async fn example() -> anyhow::Result<()> {
    /// let server = Server::builder()
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build(self) -> Result<Server> {
        let address = SocketAddr::new(self.cfg.server_addr, self.cfg.port);
        info!(address = %address, data_dir = %self.cfg.data_dir.display(), "Initializing server");

        let passphrase =
            self.cfg.passphrase.as_deref().context("LMV_PASSPHRASE is required")?;

        let storage = Storage::builder()
            .root(&self.cfg.data_dir)
            .create(true)
            .connect()
            .await
            .context("Failed to open the data directory")?;
        let vault = Vault::builder()
            .passphrase(passphrase)
            .build()
            .context("Failed to derive vault key material")?;
        let engine =
            Engine::open(storage, vault).await.context("Failed to open the vault engine")?;

        let state = ApiState::builder()
            .config(self.cfg)
            .engine(engine)
            .build()
            .context("Failed to finalize API state")?;

        Ok(Server { state })
    }
}

/// A fully initialized server instance ready to run.
///
/// This struct is returned by [`ServerBuilder::build`] and contains
/// all necessary runtime state.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    state: ApiState,
}

impl Server {
    /// Returns a new [`ServerBuilder`] to configure the server.
    ///
    /// This is the recommended way to initialize the server.
    ///
    /// # Examples
    /// ```no_run
    /// # use lmv_server::Server;
    /// # async fn example() -> anyhow::Result<()> {
    /// let server = Server::builder()
    ///     .port(8787)
    ///     .build()
    ///     .await?;
    ///
    /// server.run().await
    /// # }
    /// ```
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Starts the server and runs until the shutdown signal is received.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the configured
    /// address.
    ///
    /// # Examples
    /// ```no_run
    /// # use lmv_server::Server;
    /// # async fn example() -> anyhow::Result<()> {
    /// Server::builder()
    ///     .build()
    ///     .await?
    ///     .run()
    ///     .await
    /// # }
    /// ```
    pub async fn run(self) -> Result<()> {
        let cfg = self.state.config.clone();
        let address = SocketAddr::new(cfg.server_addr, cfg.port);

        info!(address = %address, "Starting server");

        let app = router::init(self.state);

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(30)));
        });

        info!("Starting HTTP server on http://{address}");
        axum_server::bind(address)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .context("HTTP server failed")?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Returns a reference to the application state.
    #[must_use]
    pub const fn state(&self) -> &ApiState {
        &self.state
    }

    /// Builds the request surface as a `tower` service without binding a
    /// listener, so tests can drive it in-process with
    /// `tower::ServiceExt::oneshot`.
    #[must_use]
    pub fn into_router(self) -> axum::Router {
        router::init(self.state)
    }
}

/// Listens for shutdown signals (Ctrl+C, SIGTERM).
///
/// This function waits for either:
/// * SIGINT (Ctrl+C)
/// * SIGTERM (sent by process managers like systemd)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res.context("Ctrl+C signal received")?;
        },
        res = terminate => {
            res.context("SIGTERM signal received")?;
        },
    }

    Ok(())
}
