//! Coordinator server

use crate::common::{CoordinatorConfig, Result};
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::replica_client::HttpReplicaClient;
use crate::coordinator::service::CoordinatorService;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub struct Coordinator {
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        tracing::info!("Starting coordinator: {}", self.config.advertise_addr);
        tracing::info!("  API: {}", listener.local_addr()?);
        tracing::info!("  Replicas: {}", self.config.replicas);
        tracing::info!("  Ping period: {:?}", self.config.ping_period());
        tracing::info!("  Ping timeout: {:?}", self.config.ping_timeout());

        let client = Arc::new(HttpReplicaClient::new(
            self.config.advertise_addr.clone(),
            self.config.request_timeout(),
        )?);
        let service = Arc::new(CoordinatorService::new(self.config.clone(), client)?);

        let (stop_tx, stop_rx) = watch::channel(false);
        let detector = service.spawn_failure_detector(stop_rx);

        let router = create_router(CoordState {
            service: service.clone(),
        });

        tracing::info!("✓ Coordinator ready");

        let res = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = stop_tx.send(true);
        if let Err(e) = detector.await {
            tracing::error!("failure detector task failed: {}", e);
        }
        if let Err(e) = &res {
            tracing::error!("HTTP server error: {}", e);
        }
        res?;
        Ok(())
    }
}
