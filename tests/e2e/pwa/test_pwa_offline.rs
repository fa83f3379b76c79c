//! E2E Test: Offline Capability
//!
//! 1. Install the worker and precache the app shell
//! 2. Serve precached and runtime-cached resources without the network
//! 3. Fall back to the index page or a placeholder image when offline

use techstore_e2e::{open_shop, INDEX_HTML};
use techstore_storefront::StorefrontError;
use techstore_worker::{FetchSource, Request, Response, WorkerConfig};

#[tokio::test]
async fn test_precache_served_without_network() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.clear_log();

    for url in shop.config.precache_urls() {
        let response = shop.page.fetch(Request::get(url.clone())).await.unwrap();
        assert!(response.ok(), "{url}");
    }
    assert!(shop.network.requests().is_empty());
}

#[tokio::test]
async fn test_precache_survives_going_offline() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.set_online(false);
    shop.page.go_offline().await.unwrap();

    let index = shop.page.fetch(Request::get(shop.url("/index.html"))).await.unwrap();
    assert_eq!(index.text(), INDEX_HTML);
    let css = shop.page.fetch(Request::get(shop.url("/styles.css"))).await.unwrap();
    assert!(css.ok());
}

#[tokio::test]
async fn test_runtime_response_cached_once() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    let url = shop.url("/api/products");
    shop.network.serve(url.clone(), Response::new(200).with_body("[1,2,3]"));

    let worker = shop.page.registration().active().unwrap().clone();
    let first = worker.fetch(Request::get(url.clone())).await.unwrap();
    assert_eq!(first.source(), Some(FetchSource::Network));
    assert_eq!(shop.caches().len_of(&shop.config.runtime_bucket()), 1);

    let second = worker.fetch(Request::get(url.clone())).await.unwrap();
    assert_eq!(second.source(), Some(FetchSource::Cache));
    assert_eq!(second.response().unwrap().text(), "[1,2,3]");
    assert_eq!(shop.network.request_count(&url), 1);
}

#[tokio::test]
async fn test_error_and_cross_origin_not_cached() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    let before = shop.caches().len_of(&shop.config.runtime_bucket());

    shop.network.serve(shop.url("/api/flaky"), Response::new(503));
    let flaky = shop.page.fetch(Request::get(shop.url("/api/flaky"))).await.unwrap();
    assert_eq!(flaky.status, 503);

    shop.network.serve("https://images.example.com/a.png", Response::new(200));
    shop.page
        .fetch(Request::get("https://images.example.com/a.png"))
        .await
        .unwrap();

    assert_eq!(shop.caches().len_of(&shop.config.runtime_bucket()), before);
}

#[tokio::test]
async fn test_offline_navigation_gets_index() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.set_online(false);

    let request = Request::get(shop.url("/products/iphone-15-pro"))
        .accepting("text/html,application/xhtml+xml,application/xml;q=0.9");
    let response = shop.page.fetch(request).await.unwrap();
    assert_eq!(response.text(), INDEX_HTML);
}

#[tokio::test]
async fn test_offline_image_placeholder() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.set_online(false);

    let request = Request::get(shop.url("/placeholder.svg?height=250&width=280"))
        .accepting("image/avif,image/webp,*/*");
    let response = shop.page.fetch(request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("image/svg+xml"));
    assert!(response.text().contains("width=\"200\" height=\"200\""));
    assert!(response.text().contains("Offline"));
}

#[tokio::test]
async fn test_offline_other_requests_fail() {
    let shop = open_shop(WorkerConfig::default()).await.unwrap();
    shop.network.set_online(false);

    let request = Request::get(shop.url("/api/cart")).accepting("application/json");
    let result = shop.page.fetch(request).await;
    assert!(matches!(result, Err(StorefrontError::FetchFailed { .. })));
}
