//! Replica server

use crate::client::CoordinatorClient;
use crate::common::{split_host_port, ReplicaConfig, Result};
use crate::replica::http::{create_router, ReplicaState};
use crate::replica::transfer::{BulkTransfer, LoggingTransfer};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ReplicaServer {
    config: ReplicaConfig,
    transfer: Arc<dyn BulkTransfer>,
}

impl ReplicaServer {
    pub fn new(config: ReplicaConfig) -> Self {
        Self {
            config,
            transfer: Arc::new(LoggingTransfer::new()),
        }
    }

    /// Use a custom bulk-transfer implementation
    pub fn with_transfer(mut self, transfer: Arc<dyn BulkTransfer>) -> Self {
        self.transfer = transfer;
        self
    }

    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener. With `auto_join` the node joins
    /// the coordinator once listening and leaves after `shutdown`.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!("Starting replica: {}", self.config.advertise_addr);
        tracing::info!("  Endpoint: {}", local);
        tracing::info!("  Coordinator: {}", self.config.coordinator_url);

        let state = ReplicaState::new(self.config.advertise_addr.clone(), self.transfer.clone());
        let router = create_router(state);
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
        });

        let coordinator =
            CoordinatorClient::new(&self.config.coordinator_url, self.config.request_timeout())?;
        if self.config.auto_join {
            // An advertised host:port is authoritative; otherwise announce the
            // port we are listening on.
            let port = match split_host_port(&self.config.advertise_addr).1 {
                Some(advertised) => {
                    if advertised != local.port() {
                        tracing::warn!(
                            advertised,
                            listening = local.port(),
                            "advertised port differs from the bound port"
                        );
                    }
                    None
                }
                None => Some(local.port()),
            };
            match coordinator.join(&self.config.advertise_addr, port).await {
                Ok(node) => tracing::info!(iteration = node.iteration, "✓ joined cluster"),
                Err(e) => tracing::error!("could not join cluster: {}", e),
            }
        }

        let res = match server.await {
            Ok(res) => res.map_err(crate::Error::from),
            Err(e) => Err(crate::Error::Internal(format!("replica server task: {}", e))),
        };

        if self.config.auto_join {
            match coordinator.leave(&self.config.advertise_addr).await {
                Ok(_) => tracing::info!("left cluster"),
                Err(e) => tracing::warn!("could not leave cluster: {}", e),
            }
        }
        res
    }
}
