//! Outbound calls from the coordinator to replica nodes
//!
//! [`ReplicaClient`] is the seam between the coordinator core and the
//! network: production uses [`HttpReplicaClient`], tests plug in an
//! in-memory implementation.

use crate::common::types::{Ack, Heartbeat};
use crate::common::{Error, FileUpdate, Node, Replication, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

#[async_trait]
pub trait ReplicaClient: Send + Sync + 'static {
    /// Liveness probe; `Ok` means the node acknowledged
    async fn heartbeat(&self, node: &Node, timeout: Duration) -> Result<()>;

    /// Tell a replica that a file changed
    async fn file_update(&self, node: &Node, update: &FileUpdate) -> Result<()>;

    /// Ask the source of a replication to push its copy
    async fn send_replication(&self, source: &Node, replication: &Replication) -> Result<()>;

    /// Ask the destination of a replication to accept the copy
    async fn receive_replication(&self, destination: &Node, replication: &Replication)
        -> Result<()>;
}

/// Run `fut`, turning an elapsed deadline into [`Error::AckTimeout`]
pub async fn bounded<T, F>(addr: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::AckTimeout {
            addr: addr.to_string(),
            timeout,
        }),
    }
}

/// JSON-over-HTTP client for replica endpoints
#[derive(Clone)]
pub struct HttpReplicaClient {
    http: reqwest::Client,
    from: String,
    request_timeout: Duration,
}

impl HttpReplicaClient {
    pub fn new(from: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            from: from.into(),
            request_timeout,
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        node: &Node,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<()> {
        let url = format!("{}{}", node.endpoint(), path);
        let map_err = |e| Error::from_reqwest(&node.address, timeout, e);

        let ack: Ack = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?
            .json()
            .await
            .map_err(map_err)?;

        if !ack.ok {
            return Err(Error::BadResponse {
                addr: node.address.clone(),
                reason: format!("{} refused", path),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaClient for HttpReplicaClient {
    async fn heartbeat(&self, node: &Node, timeout: Duration) -> Result<()> {
        let ping = Heartbeat {
            from: self.from.clone(),
        };
        self.post(node, "/heartbeat", &ping, timeout).await
    }

    async fn file_update(&self, node: &Node, update: &FileUpdate) -> Result<()> {
        self.post(node, "/file-update", update, self.request_timeout)
            .await
    }

    async fn send_replication(&self, source: &Node, replication: &Replication) -> Result<()> {
        self.post(source, "/replication/send", replication, self.request_timeout)
            .await
    }

    async fn receive_replication(
        &self,
        destination: &Node,
        replication: &Replication,
    ) -> Result<()> {
        self.post(
            destination,
            "/replication/receive",
            replication,
            self.request_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let res: Result<()> = bounded("node-b", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(Error::AckTimeout { ref addr, .. }) if addr == "node-b"));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let res = bounded("node-a", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_unreachable_replica_is_dial_failure() {
        // Port 9 on loopback is "discard" and almost never listening.
        let client = HttpReplicaClient::new("coord", Duration::from_millis(500)).unwrap();
        let node = Node::new("127.0.0.1:9", 9, 1);
        let err = client
            .heartbeat(&node, Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_peer_failure(), "unexpected error: {err}");
    }
}
