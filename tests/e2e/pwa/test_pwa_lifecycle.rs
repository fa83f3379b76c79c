//! E2E Test: Worker Lifecycle
//!
//! 1. First install precaches and takes control
//! 2. A version bump prunes the previous version's buckets
//! 3. A worker that does not skip waiting sits behind the active one
//!    until the page applies the update

use techstore_e2e::open_shop;
use techstore_worker::{ClientCommand, ServiceWorkerState, WorkerConfig};

#[tokio::test]
async fn test_first_install_takes_control() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let active = shop.page.registration().active().unwrap().clone();
    assert_eq!(active.state(), ServiceWorkerState::Activated);
    assert!(!shop.page.update_available());

    let id = shop
        .next_command(|c| match c {
            ClientCommand::ControllerChanged(id) => Some(id),
            _ => None,
        })
        .await;
    assert_eq!(id, Some(active.id()));

    let caches = shop.caches();
    assert!(caches.has(&shop.config.static_bucket()));
    assert_eq!(
        caches.len_of(&shop.config.static_bucket()),
        shop.config.precache.len()
    );
}

#[tokio::test]
async fn test_version_bump_prunes_old_buckets() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let v1 = shop.config.clone();
    let old = shop.page.registration().active().unwrap().clone();

    let v2 = v1.clone().with_version("v2.0.0");
    let state = shop.page.install_worker(v2.clone()).await.unwrap();
    assert_eq!(state, ServiceWorkerState::Activated);

    let keys = shop.caches().keys();
    assert!(keys.contains(&v2.static_bucket()));
    assert!(!keys.contains(&v1.static_bucket()));
    assert!(!keys.contains(&v1.runtime_bucket()));

    assert_eq!(
        shop.page.worker_version().await.unwrap().as_deref(),
        Some("techstore-v2.0.0")
    );

    let mut retired = old.subscribe();
    retired
        .wait_for(|s| *s == ServiceWorkerState::Redundant)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_waiting_worker_until_update_applied() {
    let v1 = WorkerConfig {
        skip_waiting: false,
        ..WorkerConfig::default()
    };
    let mut shop = open_shop(v1.clone()).await.unwrap();
    // nothing was active, so the first worker activates anyway
    assert_eq!(
        shop.page.registration().active().unwrap().state(),
        ServiceWorkerState::Activated
    );

    let v2 = v1.clone().with_version("v2.0.0");
    let state = shop.page.install_worker(v2.clone()).await.unwrap();
    assert_eq!(state, ServiceWorkerState::Installed);
    assert!(shop.page.update_available());
    assert_eq!(
        shop.page.worker_version().await.unwrap().as_deref(),
        Some("techstore-v1.0.0")
    );
    // both versions cached until the new one activates
    assert!(shop.caches().has(&v1.static_bucket()));
    assert!(shop.caches().has(&v2.static_bucket()));

    assert!(shop.page.apply_update().await.unwrap());
    assert!(!shop.page.update_available());
    assert!(shop.page.registration().waiting().is_none());
    assert_eq!(
        shop.page.worker_version().await.unwrap().as_deref(),
        Some("techstore-v2.0.0")
    );
    assert!(!shop.caches().has(&v1.static_bucket()));

    assert!(!shop.page.apply_update().await.unwrap());
}

#[tokio::test]
async fn test_failed_precache_keeps_current_worker() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let v1 = shop.config.clone();
    let mut v2 = v1.clone().with_version("v2.0.0");
    v2.precache.push("/missing.js".to_string());

    let state = shop.page.install_worker(v2.clone()).await.unwrap();
    assert_eq!(state, ServiceWorkerState::Installed);
    assert_eq!(shop.caches().len_of(&v2.static_bucket()), 0);
    assert!(shop.caches().has(&v1.static_bucket()));
    assert_eq!(
        shop.page.worker_version().await.unwrap().as_deref(),
        Some("techstore-v1.0.0")
    );
}
