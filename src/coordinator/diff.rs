//! Replica reconciliation after a topology change
//!
//! Given the ring before and after a join/leave/failure, every tracked file is
//! placed again on the new ring. Each address that enters a file's replica set
//! gets one [`Replication`] instruction whose source is the first replica of
//! the old placement that is still a member. An instruction completes when
//! the source acknowledged the push and the destination acknowledged the
//! pull; only completed destinations are recorded in the new replica set.
//!
//! Addresses that leave a replica set are dropped from the record but their
//! copy is not purged. If every transfer of a file fails and no replica is
//! retained, the source stays recorded so the copy is not forgotten.

use crate::common::{Error, FileGroup, Node, Replication, Result};
use crate::common::types::MemberList;
use crate::coordinator::replica_client::{bounded, ReplicaClient};
use crate::coordinator::ring::Ring;
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on files reconciled at the same time
const MAX_CONCURRENT_FILES: usize = 32;

/// Reconciliation work for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    pub name: String,
    /// Replica set recorded before the change
    pub current: BTreeSet<String>,
    /// Replica set the new ring asks for
    pub target: BTreeSet<String>,
    /// Replica pushing the data, `None` if no copy survives
    pub source: Option<String>,
    pub transfers: Vec<Replication>,
}

impl FilePlan {
    /// Replicas that keep their copy without any transfer
    pub fn retained(&self) -> BTreeSet<String> {
        self.current.intersection(&self.target).cloned().collect()
    }
}

/// Outcome of executing one [`FilePlan`]
#[derive(Debug)]
pub struct FileOutcome {
    pub name: String,
    pub replicas: BTreeSet<String>,
    pub completed: Vec<Replication>,
    pub failed: Vec<(Replication, Error)>,
}

/// Totals over one reconciliation run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub files_checked: usize,
    pub files_changed: usize,
    pub transfers_ok: usize,
    pub transfers_failed: usize,
    pub files_lost: Vec<String>,
}

/// Compute per-file replication instructions for `old` → `new`.
///
/// Files whose recorded replica set already matches the new placement get no
/// plan, so planning again after the outcomes were applied yields nothing.
pub fn plan(
    old: &Ring,
    new: &Ring,
    files: &[FileGroup],
    replication_factor: usize,
) -> Vec<FilePlan> {
    if new.is_empty() {
        if !files.is_empty() {
            tracing::error!(files = files.len(), "ring is empty, every file lost its replicas");
        }
        return files
            .iter()
            .filter(|g| !g.replicas.is_empty())
            .map(|g| FilePlan {
                name: g.name.clone(),
                current: g.replicas.clone(),
                target: BTreeSet::new(),
                source: None,
                transfers: Vec::new(),
            })
            .collect();
    }

    let count = new.replica_count(replication_factor);
    let mut plans = Vec::new();

    for group in files {
        let target_order = match new.get_replicas(&group.name, count) {
            Ok(replicas) => replicas,
            Err(e) => {
                tracing::error!(file = %group.name, error = %e, "cannot place file on new ring");
                continue;
            }
        };
        let target: BTreeSet<String> = target_order.iter().cloned().collect();
        if target == group.replicas {
            continue;
        }

        let source = pick_source(old, new, group, replication_factor);
        let mut transfers = Vec::new();
        match &source {
            Some(src) => {
                let payload = FileGroup {
                    name: group.name.clone(),
                    version: group.version,
                    replicas: target.clone(),
                };
                for dest in target_order.iter().filter(|a| !group.replicas.contains(*a)) {
                    tracing::info!(file = %group.name, source = %src, destination = %dest, "replication planned");
                    transfers.push(Replication::new(src.clone(), dest.clone(), payload.clone()));
                }
            }
            None => {
                tracing::error!(file = %group.name, "no surviving replica to copy from");
            }
        }

        plans.push(FilePlan {
            name: group.name.clone(),
            current: group.replicas.clone(),
            target,
            source,
            transfers,
        });
    }

    plans
}

// The old primary is the preferred source. When it is the node that just
// left, fall through the old placement order, then any recorded replica
// that is still a member.
fn pick_source(old: &Ring, new: &Ring, group: &FileGroup, replication_factor: usize) -> Option<String> {
    let old_order = old
        .get_replicas(&group.name, old.replica_count(replication_factor))
        .unwrap_or_default();
    old_order
        .into_iter()
        .find(|a| new.contains(a) && group.replicas.contains(a))
        .or_else(|| group.replicas.iter().find(|a| new.contains(a)).cloned())
}

/// Drives the push/pull handshake of planned replications
pub struct ReplicationDiffEngine {
    client: Arc<dyn ReplicaClient>,
    request_timeout: Duration,
}

impl ReplicationDiffEngine {
    pub fn new(client: Arc<dyn ReplicaClient>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// Execute `plans` against the nodes in `members`.
    ///
    /// Files are handled concurrently; each outcome belongs to exactly one
    /// file, so applying them never races on a replica set.
    pub async fn execute(&self, plans: Vec<FilePlan>, members: &MemberList) -> Vec<FileOutcome> {
        stream::iter(plans)
            .map(|plan| self.execute_file(plan, members))
            .buffer_unordered(MAX_CONCURRENT_FILES)
            .collect()
            .await
    }

    async fn execute_file(&self, plan: FilePlan, members: &MemberList) -> FileOutcome {
        let handshakes = plan
            .transfers
            .iter()
            .map(|rep| async move { (rep, self.handshake(rep, members).await) });

        let mut replicas = plan.retained();
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        for (rep, res) in join_all(handshakes).await {
            match res {
                Ok(()) => {
                    tracing::info!(
                        file = %plan.name,
                        source = %rep.source,
                        destination = %rep.destination,
                        "replication complete"
                    );
                    replicas.insert(rep.destination.clone());
                    completed.push(rep.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        file = %plan.name,
                        destination = %rep.destination,
                        error = %e,
                        "replication failed"
                    );
                    failed.push((rep.clone(), e));
                }
            }
        }

        // The source still holds a copy even when the new placement does not
        // include it; never record an empty set while it is reachable.
        if replicas.is_empty() {
            if let Some(source) = &plan.source {
                tracing::warn!(file = %plan.name, source = %source, "no destination completed, keeping source");
                replicas.insert(source.clone());
            }
        }

        FileOutcome {
            name: plan.name,
            replicas,
            completed,
            failed,
        }
    }

    async fn handshake(&self, rep: &Replication, members: &MemberList) -> Result<()> {
        let source = member(members, &rep.source)?;
        let destination = member(members, &rep.destination)?;

        bounded(
            &source.address,
            self.request_timeout,
            self.client.send_replication(source, rep),
        )
        .await
        .map_err(|e| replication_error(rep, "source", e))?;

        bounded(
            &destination.address,
            self.request_timeout,
            self.client.receive_replication(destination, rep),
        )
        .await
        .map_err(|e| replication_error(rep, "destination", e))
    }
}

fn member<'a>(members: &'a MemberList, addr: &str) -> Result<&'a Node> {
    members
        .get(addr)
        .ok_or_else(|| Error::Internal(format!("{} is not a member", addr)))
}

fn replication_error(rep: &Replication, side: &str, e: Error) -> Error {
    Error::ReplicationFailed {
        file: rep.file.name.clone(),
        destination: rep.destination.clone(),
        reason: format!("{} did not ack: {}", side, e),
    }
}

/// Summarize outcomes of one run over `files_checked` files
pub fn report(files_checked: usize, plans: &[FilePlan], outcomes: &[FileOutcome]) -> DiffReport {
    DiffReport {
        files_checked,
        files_changed: outcomes.len(),
        transfers_ok: outcomes.iter().map(|o| o.completed.len()).sum(),
        transfers_failed: outcomes.iter().map(|o| o.failed.len()).sum(),
        files_lost: plans
            .iter()
            .filter(|p| p.source.is_none() && !p.current.is_empty())
            .map(|p| p.name.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, ring: &Ring, rf: usize) -> FileGroup {
        FileGroup {
            name: name.to_string(),
            version: 1,
            replicas: ring
                .get_replicas(name, ring.replica_count(rf))
                .unwrap()
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_unchanged_ring_plans_nothing() {
        let ring = Ring::with_nodes(32, ["A", "B", "C", "D", "E"]);
        let files: Vec<_> = (0..20).map(|i| group(&format!("f{}", i), &ring, 3)).collect();
        assert!(plan(&ring, &ring, &files, 3).is_empty());
    }

    #[test]
    fn test_removed_node_is_replaced() {
        let old = Ring::with_nodes(32, ["A", "B", "C", "D", "E"]);
        let files: Vec<_> = (0..50).map(|i| group(&format!("f{}", i), &old, 3)).collect();
        let victim = "B";
        let new = old.remove_node(victim);

        let plans = plan(&old, &new, &files, 3);
        let affected = files.iter().filter(|g| g.replicas.contains(victim)).count();
        assert_eq!(plans.len(), affected);

        for p in &plans {
            assert!(p.current.contains(victim));
            assert!(!p.target.contains(victim));
            assert_eq!(p.transfers.len(), 1);
            let t = &p.transfers[0];
            assert_ne!(t.source, victim);
            assert!(p.current.contains(&t.source));
            assert!(!p.current.contains(&t.destination));
            assert_eq!(t.file.replicas, p.target);
        }
    }

    #[test]
    fn test_added_node_pulls_from_old_primary() {
        let old = Ring::with_nodes(32, ["A", "B", "C"]);
        let files: Vec<_> = (0..50).map(|i| group(&format!("f{}", i), &old, 3)).collect();
        let new = old.add_node("D");

        for p in plan(&old, &new, &files, 3) {
            assert_eq!(p.source, old.primary(&p.name));
            for t in &p.transfers {
                assert_eq!(t.destination, "D");
            }
        }
    }

    #[test]
    fn test_no_surviving_copy() {
        let old = Ring::with_nodes(8, ["A", "B"]);
        let files = vec![FileGroup {
            name: "f1".into(),
            version: 3,
            replicas: ["A".to_string()].into(),
        }];
        let new = old.remove_node("A");
        let plans = plan(&old, &new, &files, 1);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].source, None);
        assert!(plans[0].transfers.is_empty());

        let rep = report(1, &plans, &[]);
        assert_eq!(rep.files_lost, vec!["f1".to_string()]);
    }

    #[test]
    fn test_empty_new_ring_clears_replicas() {
        let old = Ring::with_nodes(8, ["A"]);
        let files = vec![group("f1", &old, 3)];
        let plans = plan(&old, &old.remove_node("A"), &files, 3);
        assert_eq!(plans.len(), 1);
        assert!(plans[0].target.is_empty());
        assert!(plans[0].retained().is_empty());
    }
}
