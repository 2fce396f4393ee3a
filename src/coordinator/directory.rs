//! File directory: filename → replication metadata
//!
//! Stores, per file:
//! - Version counter (starts at 1 on first write, +1 per write)
//! - Replica set (assigned on first write, afterwards only changed by the
//!   diff engine)

use crate::common::{FileGroup, OpKind, Result};
use crate::coordinator::ring::Ring;
use std::collections::{BTreeSet, HashMap};

/// Result of recording a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub version: u64,
    pub op: OpKind,
    pub replicas: BTreeSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct FileDirectory {
    files: HashMap<String, FileGroup>,
}

impl FileDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful write of `name`.
    ///
    /// Unknown files get a replica set of `min(replication_factor, ring size)`
    /// nodes from `ring` and start at version 1.
    pub fn record_write(
        &mut self,
        name: &str,
        ring: &Ring,
        replication_factor: usize,
    ) -> Result<WriteOutcome> {
        if let Some(group) = self.files.get_mut(name) {
            group.version += 1;
            return Ok(WriteOutcome {
                version: group.version,
                op: OpKind::Update,
                replicas: group.replicas.clone(),
            });
        }

        let count = ring.replica_count(replication_factor).max(1);
        let replicas: BTreeSet<String> = ring.get_replicas(name, count)?.into_iter().collect();
        let group = FileGroup {
            name: name.to_string(),
            version: 1,
            replicas: replicas.clone(),
        };
        self.files.insert(name.to_string(), group);

        Ok(WriteOutcome {
            version: 1,
            op: OpKind::New,
            replicas,
        })
    }

    /// Remove `name`, returning its last metadata if it existed
    pub fn remove(&mut self, name: &str) -> Option<FileGroup> {
        self.files.remove(name)
    }

    /// Remove `name`; `true` if it existed
    pub fn delete(&mut self, name: &str) -> bool {
        self.remove(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<&FileGroup> {
        self.files.get(name)
    }

    /// Current replica set of `name` (empty if unknown)
    pub fn replicas_for(&self, name: &str) -> BTreeSet<String> {
        self.files
            .get(name)
            .map(|g| g.replicas.clone())
            .unwrap_or_default()
    }

    /// Files whose replica set contains `addr`
    pub fn files_on(&self, addr: &str) -> BTreeSet<String> {
        self.files
            .values()
            .filter(|g| g.replicas.contains(addr))
            .map(|g| g.name.clone())
            .collect()
    }

    /// Version labels `"{version},{name}"` for `1..=current`, oldest first.
    ///
    /// Labels only name versions, no content is retained for them.
    pub fn version_tags(&self, name: &str) -> Vec<String> {
        self.files
            .get(name)
            .map(|group| {
                (1..=group.version)
                    .map(|v| format!("{},{}", v, group.name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the replica set of an existing file
    pub fn set_replicas(&mut self, name: &str, replicas: BTreeSet<String>) -> bool {
        match self.files.get_mut(name) {
            Some(group) => {
                group.replicas = replicas;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every tracked file
    pub fn groups(&self) -> Vec<FileGroup> {
        let mut groups: Vec<FileGroup> = self.files.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
