//! Daemon lifecycle: build, migrate, start, serve, stop

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::grpc::PowershelfGrpc;
use crate::manager::PowershelfManager;

/// The `psmd` process.
pub struct ServiceDaemon {
    config: ServiceConfig,
    manager: Arc<PowershelfManager>,
}

impl ServiceDaemon {
    /// Build every backend from `config`. Nothing is started yet.
    ///
    /// # Errors
    ///
    /// Everything [`PowershelfManager::new`] rejects.
    pub async fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let manager = Arc::new(PowershelfManager::new(&config).await?);
        Ok(Self { config, manager })
    }

    /// Wrap an already-built manager.
    pub fn with_manager(config: ServiceConfig, manager: Arc<PowershelfManager>) -> Self {
        Self { config, manager }
    }

    pub fn manager(&self) -> &Arc<PowershelfManager> {
        &self.manager
    }

    /// Listen on all interfaces at the configured port until `shutdown`
    /// resolves.
    ///
    /// # Errors
    ///
    /// Bind failures plus everything [`ServiceDaemon::serve`] returns.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send) -> Result<(), ServiceError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Migrate, start the backends, the reconciler and the inventory
    /// collector, then serve gRPC on `listener` until `shutdown` resolves.
    /// The runners and the backends are stopped on the way out even when
    /// serving fails.
    ///
    /// # Errors
    ///
    /// Migration, backend start and transport failures.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), ServiceError> {
        let applied = self.manager.migrate().await?;
        if applied > 0 {
            info!(applied, "applied database migrations");
        }
        self.manager.start().await?;
        let reconciler = self
            .manager
            .spawn_reconciler(self.config.reconcile_interval());
        let inventory = self
            .manager
            .spawn_inventory(self.config.inventory_interval());

        let local = listener.local_addr().ok();
        info!(addr = ?local, dry_run = self.manager.dry_run(), "psmd serving gRPC");

        let served = Server::builder()
            .add_service(PowershelfGrpc::new(self.manager.clone()).into_server())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await;

        info!("shutting down");
        self.manager.shutdown([reconciler, inventory]).await;
        if let Err(e) = &served {
            error!(error = %e, "gRPC server failed");
        }
        Ok(served?)
    }
}
