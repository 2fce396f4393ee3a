//! Heartbeat-based failure detection
//!
//! One detection cycle probes every member except the coordinator itself in
//! parallel. A member fails if its probe errors (dial failure) or is not
//! acknowledged before the timeout. The cycle returns once every probe has
//! settled, so its latency is bounded by the timeout, not by the member count.

use crate::common::Node;
use crate::coordinator::replica_client::{bounded, ReplicaClient};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

pub struct FailureDetector {
    client: Arc<dyn ReplicaClient>,
    self_addr: String,
}

impl FailureDetector {
    pub fn new(client: Arc<dyn ReplicaClient>, self_addr: impl Into<String>) -> Self {
        Self {
            client,
            self_addr: self_addr.into(),
        }
    }

    /// Probe `members` and return the ones that failed, ordered by address.
    ///
    /// Dropping the returned future abandons every in-flight probe.
    pub async fn detect_failures(&self, members: &[Node], timeout: Duration) -> Vec<Node> {
        let probes = members
            .iter()
            .filter(|node| node.address != self.self_addr)
            .map(|node| async move {
                let res = bounded(
                    &node.address,
                    timeout,
                    self.client.heartbeat(node, timeout),
                )
                .await;
                (node, res)
            });

        let mut failed: Vec<Node> = join_all(probes)
            .await
            .into_iter()
            .filter_map(|(node, res)| match res {
                Ok(()) => None,
                Err(e) if e.is_peer_failure() => {
                    tracing::warn!(addr = %node.address, error = %e, "heartbeat failed");
                    Some(node.clone())
                }
                Err(e) => {
                    // Bad status or body still counts as a missed ack.
                    tracing::warn!(addr = %node.address, error = %e, "heartbeat rejected");
                    Some(node.clone())
                }
            })
            .collect();
        failed.sort_by(|a, b| a.address.cmp(&b.address));
        failed
    }
}
