//! Embedding Server
//!
//! Loads the model, binds the listener and serves HTTP until shutdown. The
//! model is loaded before the socket exists, so a load failure means the
//! process never accepts a connection.

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::net::TcpSocket;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{EmbeddingError, EmbeddingService};
use crate::server::config::ServerConfig;
use crate::server::hyper_server::{handle_request, ServerState};

/// Startup and serving failures
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("Failed to bind {address}: {error}")]
    Bind {
        address: String,
        error: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Http(#[from] hyper::Error),
}

pub struct EmbeddingServer {
    config: Arc<ServerConfig>,
    service: EmbeddingService,
    listener: TcpListener,
    server_id: Uuid,
}

impl EmbeddingServer {
    /// Load the configured model, then bind
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        info!("🚀 Initializing Embedding Server");
        config.validate()?;

        let service = EmbeddingService::from_config(&config.embedding).await?;
        info!("✅ Embedding model loaded successfully");

        Self::with_service(config, service)
    }

    /// Bind with an already constructed service
    pub fn with_service(config: ServerConfig, service: EmbeddingService) -> Result<Self, ServerError> {
        let address = config.network.bind_address.clone();
        let bind_failed = |error: std::io::Error| ServerError::Bind {
            address: address.clone(),
            error,
        };

        let addr: SocketAddr = address.parse().map_err(|_| EmbeddingError::ConfigError {
            message: format!("bind_address '{}' is not a socket address", address),
        })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_failed)?;

        // Nagle buffering adds tens of milliseconds to small responses
        socket.set_nodelay(true).map_err(bind_failed)?;
        socket.set_reuseaddr(true).map_err(bind_failed)?;
        socket.bind(addr).map_err(bind_failed)?;
        let listener = socket
            .listen(1024)
            .and_then(|l| l.into_std())
            .map_err(bind_failed)?;

        let server_id = Uuid::new_v4();
        info!("📡 Server bound to {} (ID: {})", address, server_id);

        Ok(Self {
            config: Arc::new(config),
            service,
            listener,
            server_id,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|error| ServerError::Bind {
            address: self.config.network.bind_address.clone(),
            error,
        })
    }

    pub fn service(&self) -> &EmbeddingService {
        &self.service
    }

    /// Serve until Ctrl+C
    pub async fn start(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = self.local_addr()?;
        let state = ServerState::new(self.service, Arc::clone(&self.config));

        let make_svc = make_service_fn(move |_| {
            let state = state.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| handle_request(req, state.clone())))
            }
        });

        let server = Server::from_tcp(self.listener)?
            .http1_keepalive(true)
            .tcp_nodelay(true)
            .tcp_sleep_on_accept_errors(true)
            .serve(make_svc)
            .with_graceful_shutdown(signal);

        info!("✅ HTTP server {} listening on {}", self.server_id, local_addr);
        info!("📍 Endpoints:");
        info!("   POST /embed      - Embed sentences");
        info!("   GET  /health     - Health check");
        info!("   GET  /           - Server info");

        server.await?;
        info!("🛑 Server {} stopped", self.server_id);
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ModelConfig;

    fn local_config() -> ServerConfig {
        let mut config = ServerConfig {
            embedding: ModelConfig::hashed(8),
            ..ServerConfig::default()
        };
        config.network.bind_address = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn test_binds_ephemeral_port() {
        let server = EmbeddingServer::new(local_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.service().dimension(), 8);
    }

    #[tokio::test]
    async fn test_model_failure_prevents_bind() {
        let mut config = local_config();
        config.embedding.embedding_dimension = None;

        let err = EmbeddingServer::new(config).await.err().unwrap();
        assert!(matches!(err, ServerError::Embedding(ref e) if e.is_startup_error()));
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let server = EmbeddingServer::new(local_config()).await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(async {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }
}
