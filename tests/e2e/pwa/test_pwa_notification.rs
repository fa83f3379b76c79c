//! E2E Test: Push Notifications
//!
//! 1. A push shows a notification with the payload (or the default body)
//! 2. Clicking the notification or its buttons opens the right window

use techstore_e2e::open_shop;
use techstore_worker::{ClientCommand, Notification, PushMessage, WorkerConfig};

async fn shown(shop: &mut techstore_e2e::Shop) -> Notification {
    shop.next_command(|c| match c {
        ClientCommand::ShowNotification(n) => Some(n),
        _ => None,
    })
    .await
    .unwrap()
}

async fn opened(shop: &mut techstore_e2e::Shop) -> Option<String> {
    shop.next_command(|c| match c {
        ClientCommand::OpenWindow(path) => Some(path),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn test_push_with_payload() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let worker = shop.page.registration().active().unwrap().clone();

    worker.push(PushMessage::text("Flash sale on headphones")).unwrap();
    let n = shown(&mut shop).await;
    assert_eq!(n.title, shop.config.notification.title);
    assert_eq!(n.body, "Flash sale on headphones");
    assert_eq!(n.vibrate, vec![200, 100, 200]);
    assert_eq!(n.data.primary_key, 1);
    assert!(n.data.date_of_arrival > 0);

    let buttons: Vec<(&str, &str)> = n
        .actions
        .iter()
        .map(|a| (a.action.as_str(), a.title.as_str()))
        .collect();
    assert_eq!(buttons, vec![("explore", "View Products"), ("close", "Close")]);
}

#[tokio::test]
async fn test_push_without_payload_uses_default_body() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let worker = shop.page.registration().active().unwrap().clone();

    worker.push(PushMessage::new(None)).unwrap();
    assert_eq!(shown(&mut shop).await.body, shop.config.notification.default_body);

    worker.push(PushMessage::new(Some(vec![0xff, 0xfe]))).unwrap();
    assert_eq!(shown(&mut shop).await.body, shop.config.notification.default_body);
}

#[tokio::test]
async fn test_notification_clicks() {
    let mut shop = open_shop(WorkerConfig::default()).await.unwrap();
    let worker = shop.page.registration().active().unwrap().clone();

    worker.notification_click(Some("explore")).unwrap();
    assert_eq!(opened(&mut shop).await.as_deref(), Some("/#products"));

    worker.notification_click(None).unwrap();
    assert_eq!(opened(&mut shop).await.as_deref(), Some("/"));

    // close dismisses without opening anything
    worker.notification_click(Some("close")).unwrap();
    worker.notification_click(Some("snooze")).unwrap();
    assert_eq!(opened(&mut shop).await.as_deref(), Some("/"));
}
