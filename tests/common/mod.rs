//! In-memory replica client shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ringfs::common::{CoordinatorConfig, Error, FileUpdate, Node, Replication, Result};
use ringfs::coordinator::ReplicaClient;
use ringfs::CoordinatorService;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Heartbeat(String),
    FileUpdate(String, FileUpdate),
    Send(String, Replication),
    Receive(String, Replication),
}

/// Replica cluster simulated in memory.
///
/// `silent` nodes accept calls but never answer, `down` nodes refuse them,
/// `refuse_receive` nodes fail only the destination half of a replication.
#[derive(Default)]
pub struct MockReplicas {
    silent: Mutex<HashSet<String>>,
    down: Mutex<HashSet<String>>,
    refuse_receive: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl MockReplicas {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn silence(&self, addr: &str) {
        self.silent.lock().unwrap().insert(addr.to_string());
    }

    pub fn take_down(&self, addr: &str) {
        self.down.lock().unwrap().insert(addr.to_string());
    }

    pub fn refuse_receive(&self, addr: &str) {
        self.refuse_receive.lock().unwrap().insert(addr.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn sends(&self) -> Vec<Replication> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(_, rep) => Some(rep),
                _ => None,
            })
            .collect()
    }

    pub fn receives(&self) -> Vec<Replication> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Receive(_, rep) => Some(rep),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, FileUpdate)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::FileUpdate(addr, u) => Some((addr, u)),
                _ => None,
            })
            .collect()
    }

    async fn answer(&self, node: &Node, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.down.lock().unwrap().contains(&node.address) {
            return Err(Error::DialFailure {
                addr: node.address.clone(),
                reason: "connection refused".into(),
            });
        }
        let silent = self.silent.lock().unwrap().contains(&node.address);
        if silent {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaClient for MockReplicas {
    async fn heartbeat(&self, node: &Node, _timeout: Duration) -> Result<()> {
        self.answer(node, Call::Heartbeat(node.address.clone())).await
    }

    async fn file_update(&self, node: &Node, update: &FileUpdate) -> Result<()> {
        self.answer(node, Call::FileUpdate(node.address.clone(), update.clone()))
            .await
    }

    async fn send_replication(&self, source: &Node, replication: &Replication) -> Result<()> {
        self.answer(source, Call::Send(source.address.clone(), replication.clone()))
            .await
    }

    async fn receive_replication(
        &self,
        destination: &Node,
        replication: &Replication,
    ) -> Result<()> {
        let refused = self
            .refuse_receive
            .lock()
            .unwrap()
            .contains(&destination.address);
        if refused {
            self.calls.lock().unwrap().push(Call::Receive(
                destination.address.clone(),
                replication.clone(),
            ));
            return Err(Error::AckTimeout {
                addr: destination.address.clone(),
                timeout: Duration::from_millis(1),
            });
        }
        self.answer(
            destination,
            Call::Receive(destination.address.clone(), replication.clone()),
        )
        .await
    }
}

pub fn test_config(replicas: usize) -> CoordinatorConfig {
    CoordinatorConfig {
        advertise_addr: "coord".to_string(),
        replicas,
        virtual_nodes: 64,
        ping_period_ms: 50,
        ping_timeout_ms: 100,
        request_timeout_ms: 100,
        ..Default::default()
    }
}

/// Coordinator with members `addrs` already joined
pub async fn service_with(
    addrs: &[&str],
    replicas: usize,
) -> (Arc<CoordinatorService>, Arc<MockReplicas>) {
    let mock = MockReplicas::new();
    let service = Arc::new(CoordinatorService::new(test_config(replicas), mock.clone()).unwrap());
    for addr in addrs {
        service.join(addr, Some(60221)).await.unwrap();
    }
    (service, mock)
}
