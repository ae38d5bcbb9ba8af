//! # sp-server
//!
//! Axum server for the SAML service provider.
//!
//! ## Endpoints
//!
//! - `GET /login` - start SP-initiated login
//! - `POST /callback` - assertion consumer service
//! - `GET|POST /logout`, `/simple-logout`, `/cross-sp-logout` - logout variants
//! - `GET|POST /sls` - single logout service
//! - `GET /metadata` - SP metadata
//! - `GET|POST /` - status page
//! - `GET /health` - liveness
//!
//! ## Usage
//!
//! ```ignore
//! use sp_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod cookies;
pub mod handlers;
pub mod pages;
pub mod router;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// The service provider server.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// Configuration problems are logged rather than fatal; `/metadata`
    /// reports them to the operator.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let errors = config.saml.check_settings();
        if !errors.is_empty() {
            tracing::warn!(errors = ?errors, "SAML settings are incomplete");
        }

        let policy = config.trust_policy();
        if policy.is_lenient() {
            tracing::warn!(
                lenient_duplicates = policy.allow_lenient_duplicates,
                signature_bypass = policy.allow_signature_bypass,
                "Reduced-trust SAML validation is enabled; do not use in production"
            );
        }

        Ok(Self { config })
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    pub async fn run(self) -> anyhow::Result<()> {
        let app = create_router(AppState::new(self.config.clone()));

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            sp = %self.config.saml.sp.entity_id,
            idp = %self.config.saml.idp.entity_id,
            "Server listening on http://{}",
            addr
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates a test router without starting the server.
    pub fn test_router(&self) -> Router {
        create_router(AppState::new(self.config.clone()))
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
