//! E2E Test: Durable Storage
//!
//! 1. Offline actions written to a file-backed queue survive a restart
//! 2. Entries caught mid-sync by a restart are recovered and retried
//! 3. Cached responses are accounted for in storage usage

use std::sync::Arc;

use serde_json::json;
use techstore_e2e::{open_shop, open_shop_with, served_network};
use techstore_worker::{ActionQueue, ActionStatus, ClientCommand, JsonFileStore, WorkerConfig};

fn file_queue(path: &std::path::Path) -> ActionQueue {
    ActionQueue::open(Arc::new(JsonFileStore::new(path))).unwrap()
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending-actions.json");
    let config = WorkerConfig::default();

    {
        let network = served_network(&config);
        let mut shop = open_shop_with(config.clone(), network, file_queue(&path))
            .await
            .unwrap();
        shop.page.go_offline().await.unwrap();
        shop.page.add_to_cart(5).await.unwrap();
        shop.page.add_to_cart(7).await.unwrap();
    }

    let reopened = file_queue(&path);
    let entries = reopened.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].item["name"], "Dell XPS 13");
    assert!(entries.iter().all(|e| e.status == ActionStatus::Pending));

    let network = served_network(&config);
    let mut shop = open_shop_with(config.clone(), network.clone(), reopened)
        .await
        .unwrap();
    shop.page.go_online().await.unwrap();
    assert_eq!(
        shop.next_sync_result().await,
        Some(ClientCommand::SyncCompleted {
            tag: "cart-sync".to_string(),
            synced: 2
        })
    );
    assert!(file_queue(&path).is_empty());
}

#[tokio::test]
async fn test_interrupted_sync_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending-actions.json");
    let stored = json!([
        {
            "id": 7,
            "action": "add",
            "item": {"id": 3, "name": "AirPods Pro"},
            "timestamp": 1_700_000_000_000_i64,
            "status": "syncing",
            "attempts": 1
        }
    ]);
    std::fs::write(&path, stored.to_string()).unwrap();

    let queue = file_queue(&path);
    assert_eq!(queue.entries()[0].status, ActionStatus::FailedRetry);
    // recovery is written back straight away
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk[0]["status"], "failed-retry");

    let config = WorkerConfig::default();
    let mut shop = open_shop_with(config.clone(), served_network(&config), queue)
        .await
        .unwrap();
    // new entries continue after the highest stored ID
    shop.page.go_offline().await.unwrap();
    shop.page.add_to_cart(1).await.unwrap();
    let ids: Vec<u64> = shop.queue().entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![7, 8]);

    shop.page.go_online().await.unwrap();
    assert_eq!(
        shop.next_sync_result().await,
        Some(ClientCommand::SyncCompleted {
            tag: "cart-sync".to_string(),
            synced: 2
        })
    );
    assert!(shop.queue().is_empty());
}

#[tokio::test]
async fn test_empty_queue_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending-actions.json");
    std::fs::write(&path, "  \n").unwrap();
    assert!(file_queue(&path).is_empty());
}

#[tokio::test]
async fn test_cache_usage_counts_bodies() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    let usage = shop.caches().usage();
    assert!(usage > 0);

    shop.network.serve(
        shop.url("/api/products"),
        techstore_worker::Response::new(200).with_body(vec![b'x'; 1024]),
    );
    shop.page
        .fetch(techstore_worker::Request::get(shop.url("/api/products")))
        .await
        .unwrap();
    assert_eq!(shop.caches().usage(), usage + 1024);
}
