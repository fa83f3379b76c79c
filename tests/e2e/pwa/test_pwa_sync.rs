//! E2E Test: Background Sync
//!
//! 1. Cart actions taken offline are queued and the page says so
//! 2. Reconnecting drains the queue to the sync endpoint
//! 3. A failing endpoint leaves the entries queued for retry

use std::time::Duration;

use techstore_e2e::open_shop;
use techstore_storefront::connectivity::{ACTION_SAVED, BACK_ONLINE};
use techstore_worker::{ActionStatus, ClientCommand, Method, Response, WorkerConfig};

#[tokio::test]
async fn test_offline_add_drains_on_reconnect() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.set_online(false);
    shop.page.go_offline().await.unwrap();

    shop.page.add_to_cart(1).await.unwrap();
    let summary = shop.page.add_to_cart(4).await.unwrap();
    assert_eq!(summary.item_count, 2);
    assert_eq!(shop.queue().len(), 2);
    assert!(shop
        .queue()
        .entries()
        .iter()
        .all(|e| e.status == ActionStatus::Pending));
    assert_eq!(
        shop.page.connectivity().banner().unwrap().message,
        ACTION_SAVED
    );

    shop.network.set_online(true);
    shop.page.go_online().await.unwrap();
    assert_eq!(
        shop.page.connectivity().banner().unwrap().message,
        BACK_ONLINE
    );

    assert_eq!(
        shop.next_sync_result().await,
        Some(ClientCommand::SyncCompleted {
            tag: "cart-sync".to_string(),
            synced: 2
        })
    );
    assert!(shop.queue().is_empty());

    let endpoint = shop.config.sync_endpoint();
    let posted = shop
        .network
        .requests()
        .into_iter()
        .find(|r| r.method == Method::Post && r.url == endpoint)
        .unwrap();
    assert_eq!(posted.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(posted.body.as_deref().unwrap()).unwrap();
    assert_eq!(body[0]["action"], "add");
    assert_eq!(body[0]["item"]["name"], "iPhone 15 Pro");
    assert_eq!(body[1]["item"]["name"], "Samsung Galaxy S24");
    // the cart itself is untouched by syncing
    assert_eq!(shop.page.cart_summary().item_count, 2);
}

#[tokio::test]
async fn test_failed_sync_keeps_entries_for_retry() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let endpoint = shop.config.sync_endpoint();
    shop.network
        .serve_method(Method::Post, endpoint.clone(), Response::new(503));

    shop.page.go_offline().await.unwrap();
    shop.page.add_to_cart(2).await.unwrap();
    shop.page.go_online().await.unwrap();

    match shop.next_sync_result().await {
        Some(ClientCommand::SyncFailed {
            reason, retry_in, ..
        }) => {
            assert!(reason.contains("status 503"), "{reason}");
            assert_eq!(retry_in, Some(Duration::from_secs(30)));
        }
        other => panic!("unexpected {other:?}"),
    }
    let entries = shop.queue().entries();
    let entry = &entries[0];
    assert_eq!(entry.status, ActionStatus::FailedRetry);
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.last_error.as_deref(), Some("status 503"));

    // the next reconnect retries without waiting for the back-off timer
    shop.network
        .serve_method(Method::Post, endpoint.clone(), Response::new(200));
    shop.page.go_offline().await.unwrap();
    shop.page.go_online().await.unwrap();
    assert_eq!(
        shop.next_sync_result().await,
        Some(ClientCommand::SyncCompleted {
            tag: "cart-sync".to_string(),
            synced: 1
        })
    );
    assert!(shop.queue().is_empty());
    assert_eq!(shop.network.request_count(&endpoint), 2);
}

#[tokio::test]
async fn test_online_actions_are_not_queued() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.page.add_to_cart(3).await.unwrap();
    shop.page.change_quantity(3, 2);
    shop.page.remove_from_cart(3);
    assert!(shop.queue().is_empty());
    assert!(shop.page.cart().is_empty());
    assert_eq!(shop.network.request_count(&shop.config.sync_endpoint()), 0);
}
