//! End-to-end: a coordinator and real replica servers on loopback

use ringfs::common::{CoordinatorConfig, OpKind, ReplicaConfig};
use ringfs::{Coordinator, CoordinatorClient, ReplicaServer};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Running {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<ringfs::Result<()>>,
}

impl Running {
    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

fn shutdown_pair() -> (oneshot::Sender<()>, impl Future<Output = ()> + Send + 'static) {
    let (tx, rx) = oneshot::channel::<()>();
    (tx, async move {
        let _ = rx.await;
    })
}

async fn start_coordinator() -> (String, Running) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let config = CoordinatorConfig {
        advertise_addr: "coordinator".to_string(),
        replicas: 2,
        virtual_nodes: 32,
        ping_period_ms: 100,
        ping_timeout_ms: 300,
        request_timeout_ms: 500,
        ..Default::default()
    };
    let (tx, shutdown) = shutdown_pair();
    let handle = tokio::spawn(Coordinator::new(config).serve_on(listener, shutdown));
    (
        url,
        Running {
            stop: Some(tx),
            handle,
        },
    )
}

async fn start_replica(coordinator: &str, auto_join: bool) -> (String, Running) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let config = ReplicaConfig {
        advertise_addr: address.clone(),
        coordinator_url: coordinator.to_string(),
        auto_join,
        request_timeout_ms: 2000,
        ..Default::default()
    };
    let (tx, shutdown) = shutdown_pair();
    let handle = tokio::spawn(ReplicaServer::new(config).serve_on(listener, shutdown));
    (
        address,
        Running {
            stop: Some(tx),
            handle,
        },
    )
}

async fn wait_for<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check().await {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn replica_files(address: &str) -> BTreeMap<String, u64> {
    reqwest::get(format!("http://{}/files", address))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cluster_lifecycle() {
    let (url, coord) = start_coordinator().await;
    let client = CoordinatorClient::new(&url, Duration::from_secs(5)).unwrap();

    let mut replicas = Vec::new();
    for _ in 0..3 {
        replicas.push(start_replica(&url, true).await);
    }
    wait_for("three members", || async {
        client.members().await.map(|m| m.len() == 3).unwrap_or(false)
    })
    .await;

    // Writes reach the replicas holding the file.
    let ack = client.put("f1", &replicas[0].0).await.unwrap();
    assert_eq!(ack.version, 1);
    assert_eq!(ack.op, OpKind::New);
    assert_eq!(ack.replicas.len(), 2);
    for addr in &ack.replicas {
        assert_eq!(replica_files(addr).await.get("f1"), Some(&1));
    }
    let ack = client.put("f1", &replicas[0].0).await.unwrap();
    assert_eq!(ack.version, 2);
    assert_eq!(client.versions("f1", 0).await.unwrap(), vec!["1,f1", "2,f1"]);

    // A replica that stops answering is detected and replaced.
    let (crash_addr, crashing) = start_replica(&url, false).await;
    client.join(&crash_addr, None).await.unwrap();
    for i in 0..10 {
        client.put(&format!("g{}", i), &replicas[0].0).await.unwrap();
    }
    let on_crashed = client.store(&crash_addr).await.unwrap();
    crashing.stop().await;

    wait_for("crashed replica removed", || async {
        client
            .members()
            .await
            .map(|m| !m.contains_key(&crash_addr))
            .unwrap_or(false)
    })
    .await;
    assert!(client.store(&crash_addr).await.unwrap().is_empty());
    for file in on_crashed {
        let holders = client.ls(&file).await.unwrap();
        assert_eq!(holders.len(), 2, "{} under-replicated: {:?}", file, holders);
        for addr in holders {
            wait_for("re-replicated copy", || {
                let addr = addr.clone();
                let file = file.clone();
                async move { replica_files(&addr).await.contains_key(&file) }
            })
            .await;
        }
    }

    // Delete reaches every replica.
    let holders = client.ls("f1").await.unwrap();
    assert!(client.delete("f1").await.unwrap());
    assert!(!client.delete("f1").await.unwrap());
    for addr in holders {
        assert!(!replica_files(&addr).await.contains_key("f1"));
    }

    // A graceful shutdown leaves the cluster.
    let (leaving_addr, leaving) = replicas.pop().unwrap();
    leaving.stop().await;
    let members = client.members().await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(!members.contains_key(&leaving_addr));

    for (_, replica) in replicas {
        replica.stop().await;
    }
    coord.stop().await;
}
