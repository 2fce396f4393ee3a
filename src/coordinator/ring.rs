//! Consistent hash ring for replica placement
//!
//! Every node address occupies `vnodes` positions on a 64-bit circle. A key is
//! placed by walking clockwise from its own position and collecting the first
//! `n` distinct physical addresses; the first one is the primary.
//!
//! A [`Ring`] is an immutable snapshot: [`Ring::add_node`] and
//! [`Ring::remove_node`] return a new snapshot, which lets the diff engine
//! compare "before" and "after" placements of the same key.

use crate::common::{ring_position, vnode_position, Error, Result};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct Ring {
    vnodes: usize,
    generation: u64,
    nodes: BTreeSet<String>,
    positions: BTreeMap<u64, String>,
}

impl Ring {
    /// Empty ring with `vnodes` positions per node
    pub fn new(vnodes: usize) -> Self {
        Self {
            vnodes: vnodes.max(1),
            generation: 0,
            nodes: BTreeSet::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Ring built from a set of addresses
    pub fn with_nodes<I, S>(vnodes: usize, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self::new(vnodes);
        ring.nodes = nodes.into_iter().map(Into::into).collect();
        ring.rebuild();
        ring
    }

    /// New snapshot that also contains `addr`
    pub fn add_node(&self, addr: &str) -> Ring {
        let mut next = self.successor();
        next.nodes.insert(addr.to_string());
        next.rebuild();
        next
    }

    /// New snapshot without `addr`
    pub fn remove_node(&self, addr: &str) -> Ring {
        self.remove_nodes(std::iter::once(addr))
    }

    /// New snapshot without any of `addrs`
    pub fn remove_nodes<'a, I>(&self, addrs: I) -> Ring
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut next = self.successor();
        for addr in addrs {
            next.nodes.remove(addr);
        }
        next.rebuild();
        next
    }

    /// Ordered list of `n` distinct addresses responsible for `key`.
    ///
    /// The result only depends on the node set and `key`, so repeated calls
    /// against equal rings agree.
    pub fn get_replicas(&self, key: &str, n: usize) -> Result<Vec<String>> {
        if n > self.nodes.len() {
            return Err(Error::InsufficientReplicas {
                needed: n,
                available: self.nodes.len(),
            });
        }

        let start = ring_position(key);
        let mut replicas: Vec<String> = Vec::with_capacity(n);
        let walk = self
            .positions
            .range(start..)
            .chain(self.positions.range(..start));
        for (_, addr) in walk {
            if replicas.len() == n {
                break;
            }
            if !replicas.iter().any(|r| r == addr) {
                replicas.push(addr.clone());
            }
        }

        Ok(replicas)
    }

    /// Primary replica for `key`, if the ring has any node
    pub fn primary(&self, key: &str) -> Option<String> {
        self.get_replicas(key, 1).ok()?.into_iter().next()
    }

    /// Replica-set size for a given replication factor on this ring
    pub fn replica_count(&self, replication_factor: usize) -> usize {
        replication_factor.min(self.nodes.len())
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.nodes.contains(addr)
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of snapshots derived before this one
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn vnodes(&self) -> usize {
        self.vnodes
    }

    /// Number of occupied positions on the circle
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    fn successor(&self) -> Ring {
        Ring {
            vnodes: self.vnodes,
            generation: self.generation + 1,
            nodes: self.nodes.clone(),
            positions: BTreeMap::new(),
        }
    }

    // Positions are recomputed from the node set so that two rings with the
    // same members are identical regardless of the order nodes were added.
    // On a position collision the smaller address wins.
    fn rebuild(&mut self) {
        let mut positions = BTreeMap::new();
        for addr in &self.nodes {
            for index in 0..self.vnodes {
                let pos = vnode_position(addr, index);
                positions
                    .entry(pos)
                    .and_modify(|owner: &mut String| {
                        if addr.as_str() < owner.as_str() {
                            *owner = addr.clone();
                        }
                    })
                    .or_insert_with(|| addr.clone());
            }
        }
        self.positions = positions;
    }
}

impl PartialEq for Ring {
    fn eq(&self, other: &Self) -> bool {
        self.vnodes == other.vnodes && self.nodes == other.nodes
    }
}

impl Eq for Ring {}
