//! Coordinator state machine
//!
//! All cluster state (member registry, ring snapshot, file directory) lives in
//! one [`ClusterState`] behind an async mutex. A topology change holds the
//! lock from the moment the new ring is computed until the diff outcomes are
//! applied, and commits registry, ring and replica sets together, so no
//! request ever sees a ring that disagrees with the file directory.

use crate::common::types::{MemberList, PutAck};
use crate::common::{
    split_host_port, CoordinatorConfig, Error, FileGroup, FileUpdate, Node, OpKind, Result,
};
use crate::coordinator::detector::FailureDetector;
use crate::coordinator::diff::{self, DiffReport, ReplicationDiffEngine};
use crate::coordinator::directory::FileDirectory;
use crate::coordinator::replica_client::{bounded, ReplicaClient};
use crate::coordinator::ring::Ring;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

pub struct ClusterState {
    nodes: MemberList,
    /// Last iteration handed out per address, kept after a node departs
    epochs: HashMap<String, u64>,
    ring: Arc<Ring>,
    files: FileDirectory,
}

/// Acknowledgement counts of a best-effort notification
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub acked: Vec<String>,
    pub failed: Vec<String>,
}

pub struct CoordinatorService {
    config: CoordinatorConfig,
    state: Mutex<ClusterState>,
    client: Arc<dyn ReplicaClient>,
    detector: FailureDetector,
    diff: ReplicationDiffEngine,
}

impl CoordinatorService {
    pub fn new(config: CoordinatorConfig, client: Arc<dyn ReplicaClient>) -> Result<Self> {
        config.validate()?;
        let detector = FailureDetector::new(client.clone(), config.advertise_addr.clone());
        let diff = ReplicationDiffEngine::new(client.clone(), config.request_timeout());
        let state = ClusterState {
            nodes: MemberList::new(),
            epochs: HashMap::new(),
            ring: Arc::new(Ring::new(config.virtual_nodes)),
            files: FileDirectory::new(),
        };
        Ok(Self {
            config,
            state: Mutex::new(state),
            client,
            detector,
            diff,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    // === Membership ===

    /// Register a node and add it to the ring.
    ///
    /// The replica port comes from `address` when it carries one, else from
    /// `port`, else from the configured default. Both given and different is
    /// rejected.
    ///
    /// A node that is already a member gets a fresh iteration and port but
    /// the topology does not change.
    pub async fn join(&self, address: &str, port: Option<u16>) -> Result<Node> {
        if address.trim().is_empty() {
            return Err(Error::BadRequest("empty node address".into()));
        }
        let port = match (split_host_port(address).1, port) {
            (Some(embedded), Some(given)) if embedded != given => {
                return Err(Error::BadRequest(format!(
                    "address {} conflicts with port {}",
                    address, given
                )));
            }
            (Some(embedded), _) => embedded,
            (None, Some(given)) => given,
            (None, None) => self.config.replica_port,
        };
        let mut state = self.state.lock().await;

        let iteration = state.epochs.get(address).copied().unwrap_or(0) + 1;
        state.epochs.insert(address.to_string(), iteration);
        let node = Node::new(address, port, iteration);

        if state.nodes.contains_key(address) {
            tracing::info!(addr = %address, iteration, "node rejoined");
            state.nodes.insert(address.to_string(), node.clone());
            return Ok(node);
        }

        let mut next_nodes = state.nodes.clone();
        next_nodes.insert(address.to_string(), node.clone());
        let new_ring = state.ring.add_node(address);
        let report = self.transition(&mut state, next_nodes, new_ring).await;
        tracing::info!(addr = %address, iteration, ?report, "joined node");
        Ok(node)
    }

    /// Remove a node from the registry and ring; `false` if it was unknown
    pub async fn leave(&self, address: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.nodes.contains_key(address) {
            tracing::info!(addr = %address, "leave for unknown node");
            return Ok(false);
        }

        let mut next_nodes = state.nodes.clone();
        next_nodes.remove(address);
        let new_ring = state.ring.remove_node(address);
        let report = self.transition(&mut state, next_nodes, new_ring).await;
        tracing::info!(addr = %address, ?report, "removed node");
        Ok(true)
    }

    // === Files ===

    /// Record a write of `name` and notify its replicas.
    ///
    /// The write is committed once the directory is updated; replicas that
    /// do not acknowledge the notification are logged only.
    pub async fn put(&self, name: &str, source: &str) -> Result<PutAck> {
        tracing::info!(file = %name, source = %source, "put request");
        let (outcome, targets) = {
            let mut state = self.state.lock().await;
            let ring = state.ring.clone();
            let outcome = state
                .files
                .record_write(name, &ring, self.config.replicas)?;
            let targets = self.notify_targets(&state, outcome.replicas.iter());
            (outcome, targets)
        };

        let update = FileUpdate {
            name: name.to_string(),
            version: outcome.version,
            op: outcome.op,
        };
        let report = self.broadcast(targets, &update).await;
        tracing::info!(
            file = %name,
            version = outcome.version,
            op = %outcome.op,
            acked = report.acked.len(),
            failed = report.failed.len(),
            "write committed"
        );

        Ok(PutAck {
            version: outcome.version,
            op: outcome.op,
            replicas: outcome.replicas.into_iter().collect(),
        })
    }

    /// Forget `name`; `true` if it existed. Former replicas are told
    /// best-effort.
    pub async fn delete(&self, name: &str) -> bool {
        let (removed, targets) = {
            let mut state = self.state.lock().await;
            let removed = state.files.remove(name);
            let targets = removed
                .as_ref()
                .map(|g| self.notify_targets(&state, g.replicas.iter()))
                .unwrap_or_default();
            (removed, targets)
        };

        match removed {
            Some(group) => {
                let update = FileUpdate {
                    name: group.name,
                    version: group.version,
                    op: OpKind::Delete,
                };
                let report = self.broadcast(targets, &update).await;
                tracing::info!(
                    file = %name,
                    version = update.version,
                    acked = report.acked.len(),
                    failed = report.failed.len(),
                    "deleted"
                );
                true
            }
            None => {
                tracing::info!(file = %name, "delete of unknown file");
                false
            }
        }
    }

    /// Current replica set of `name` (empty if unknown)
    pub async fn ls(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state.files.replicas_for(name).into_iter().collect()
    }

    /// Files replicated on `address`
    pub async fn store(&self, address: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state.files.files_on(address).into_iter().collect()
    }

    pub async fn members(&self) -> MemberList {
        self.state.lock().await.nodes.clone()
    }

    /// Version labels `1..=current` of `name`. `count` is recorded in the
    /// log only; every label is returned.
    pub async fn versions(&self, name: &str, count: usize) -> Vec<String> {
        tracing::info!(file = %name, count, "listing versions");
        self.state.lock().await.files.version_tags(name)
    }

    pub async fn lookup(&self, name: &str) -> Option<FileGroup> {
        self.state.lock().await.files.lookup(name).cloned()
    }

    /// Current ring snapshot
    pub async fn ring(&self) -> Arc<Ring> {
        self.state.lock().await.ring.clone()
    }

    pub async fn file_count(&self) -> usize {
        self.state.lock().await.files.len()
    }

    // === Failure detection ===

    /// Probe every member once and remove the ones that failed.
    ///
    /// All failures found in the cycle are handled in a single transition.
    pub async fn run_detection_cycle(&self) -> Vec<Node> {
        let members: Vec<Node> = self.state.lock().await.nodes.values().cloned().collect();
        if members.is_empty() {
            return Vec::new();
        }

        let failed = self
            .detector
            .detect_failures(&members, self.config.ping_timeout())
            .await;
        if failed.is_empty() {
            return failed;
        }

        let mut state = self.state.lock().await;
        // A node may have left or rejoined while the probes were running.
        let failed: Vec<Node> = failed
            .into_iter()
            .filter(|n| {
                state
                    .nodes
                    .get(&n.address)
                    .map(|cur| cur.iteration == n.iteration)
                    .unwrap_or(false)
            })
            .collect();
        if failed.is_empty() {
            return failed;
        }

        for node in &failed {
            tracing::warn!(addr = %node.address, iteration = node.iteration, "detected failure");
        }
        let mut next_nodes = state.nodes.clone();
        for node in &failed {
            next_nodes.remove(&node.address);
        }
        let new_ring = state
            .ring
            .remove_nodes(failed.iter().map(|n| n.address.as_str()));
        let report = self.transition(&mut state, next_nodes, new_ring).await;
        tracing::info!(failed = failed.len(), ?report, "failure handling complete");
        failed
    }

    /// Run detection cycles every ping period until `shutdown` flips to
    /// `true` or its sender is dropped. An in-flight cycle is abandoned on
    /// shutdown.
    pub async fn run_failure_detector(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            addr = %self.config.advertise_addr,
            period = ?self.config.ping_period(),
            "starting failure detector"
        );
        let mut interval = tokio::time::interval(self.config.ping_period());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    tokio::select! {
                        _ = self.run_detection_cycle() => {}
                        _ = shutdown.changed() => break,
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("failure detector stopped");
    }

    pub fn spawn_failure_detector(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run_failure_detector(shutdown))
    }

    // === Internals ===

    // Reconcile replica placement for `new_ring`, then commit registry, ring
    // and replica sets in one step.
    async fn transition(
        &self,
        state: &mut ClusterState,
        next_nodes: MemberList,
        new_ring: Ring,
    ) -> DiffReport {
        let files = state.files.groups();
        let plans = diff::plan(&state.ring, &new_ring, &files, self.config.replicas);
        let outcomes = self.diff.execute(plans.clone(), &next_nodes).await;
        let report = diff::report(files.len(), &plans, &outcomes);

        for outcome in outcomes {
            state.files.set_replicas(&outcome.name, outcome.replicas);
        }
        // No copy survived; the next write places the file from scratch.
        for name in &report.files_lost {
            state.files.remove(name);
            tracing::error!(file = %name, "file lost, record dropped");
        }
        state.nodes = next_nodes;
        state.ring = Arc::new(new_ring);
        report
    }

    fn notify_targets<'a, I>(&self, state: &ClusterState, replicas: I) -> Vec<Node>
    where
        I: Iterator<Item = &'a String>,
    {
        replicas
            .filter(|addr| **addr != self.config.advertise_addr)
            .filter_map(|addr| match state.nodes.get(addr) {
                Some(node) => Some(node.clone()),
                None => {
                    tracing::warn!(addr = %addr, "replica is not a member, skipping notification");
                    None
                }
            })
            .collect()
    }

    async fn broadcast(&self, targets: Vec<Node>, update: &FileUpdate) -> BroadcastReport {
        let timeout = self.config.request_timeout();
        let calls = targets.iter().map(|node| async move {
            let res = bounded(&node.address, timeout, self.client.file_update(node, update)).await;
            (node, res)
        });

        let mut report = BroadcastReport::default();
        for (node, res) in join_all(calls).await {
            match res {
                Ok(()) => report.acked.push(node.address.clone()),
                Err(e) => {
                    tracing::warn!(
                        file = %update.name,
                        addr = %node.address,
                        op = %update.op,
                        error = %e,
                        "file update not acknowledged"
                    );
                    report.failed.push(node.address.clone());
                }
            }
        }
        report
    }
}
