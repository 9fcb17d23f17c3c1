mod common;

use std::time::Duration;

use common::{
    entry, processed_notification, request_id, subscribe_ack, test_config, wait_for_status,
    MockPubsubServer, WAIT,
};
use landing_bench::pubsub::{SubscribeOptions, SubscriptionManager, SubscriptionStatus};
use serde_json::json;
use tokio::time::timeout;

#[tokio::test]
async fn notification_resolves_subscription() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager.subscribe("sigA").await.unwrap();
    // visible before any round trip
    assert_eq!(entry(&manager, id).await.status, SubscriptionStatus::Pending);

    let connection = server.next_connection().await;
    let request = server.next_request().await;
    assert_eq!(request["method"], "signatureSubscribe");
    assert_eq!(request_id(&request), id);
    assert_eq!(
        request["params"],
        json!(["sigA", { "commitment": "confirmed", "enableReceivedNotification": false }])
    );

    connection.send(subscribe_ack(id, 7));
    connection.send(processed_notification(7, 1000));

    timeout(WAIT, manager.wait_until_settled())
        .await
        .unwrap()
        .unwrap();

    let entry = entry(&manager, id).await;
    assert_eq!(entry.status, SubscriptionStatus::Done);
    assert_eq!(entry.remote_subscription_id, Some(7));
    assert_eq!(entry.result.unwrap().slot, 1000);
}

#[tokio::test]
async fn pending_target_is_subscribed_once() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let first = manager.subscribe("sigA").await.unwrap();
    let second = manager.subscribe("sigA").await.unwrap();
    assert_eq!(first, second);

    let connection = server.next_connection().await;
    assert_eq!(request_id(&server.next_request().await), first);
    server.assert_no_request(Duration::from_millis(200)).await;
    assert_eq!(manager.pending_count(), 1);

    // a settled target starts over with a new id
    connection.send(subscribe_ack(first, 1));
    connection.send(processed_notification(1, 10));
    wait_for_status(&manager, first, SubscriptionStatus::Done).await;

    let third = manager.subscribe("sigA").await.unwrap();
    assert!(third > first);
    assert_eq!(request_id(&server.next_request().await), third);
}

#[tokio::test]
async fn connection_loss_resubscribes_pending() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let a = manager.subscribe("sigA").await.unwrap();
    let b = manager.subscribe("sigB").await.unwrap();
    let c = manager.subscribe("sigC").await.unwrap();

    let first_connection = server.next_connection().await;
    for _ in 0..3 {
        server.next_request().await;
    }
    first_connection.send(subscribe_ack(a, 1));
    first_connection.send(subscribe_ack(b, 2));
    first_connection.send(subscribe_ack(c, 3));
    first_connection.send(processed_notification(3, 50));
    wait_for_status(&manager, c, SubscriptionStatus::Done).await;
    let created_at = entry(&manager, a).await.created_at;

    first_connection.drop_connection();

    let second_connection = server.next_connection().await;
    let mut resubscribed = vec![
        request_id(&server.next_request().await),
        request_id(&server.next_request().await),
    ];
    resubscribed.sort();
    assert_eq!(resubscribed, vec![a, b]);
    server.assert_no_request(Duration::from_millis(300)).await;

    // remote ids of the old connection are gone
    let before_ack = entry(&manager, a).await;
    assert_eq!(before_ack.remote_subscription_id, None);
    assert_eq!(before_ack.created_at, created_at);
    second_connection.send(processed_notification(1, 70));

    second_connection.send(subscribe_ack(a, 11));
    second_connection.send(processed_notification(11, 900));

    let a_entry = wait_for_status(&manager, a, SubscriptionStatus::Done).await;
    assert_eq!(a_entry.result.unwrap().slot, 900);
    assert_eq!(entry(&manager, b).await.status, SubscriptionStatus::Pending);
    assert_eq!(manager.pending_count(), 1);
}

#[tokio::test]
async fn silent_subscription_times_out() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager
        .subscribe_with(
            "sigA",
            SubscribeOptions {
                max_wait: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let connection = server.next_connection().await;
    server.next_request().await;
    connection.send(subscribe_ack(id, 4));

    timeout(WAIT, manager.wait_until_settled())
        .await
        .unwrap()
        .unwrap();

    let entry = entry(&manager, id).await;
    assert_eq!(entry.status, SubscriptionStatus::Timeout);
    assert!(entry.result.is_none());

    // too late
    connection.send(processed_notification(4, 12));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        common::entry(&manager, id).await.status,
        SubscriptionStatus::Timeout
    );
}

#[tokio::test]
async fn unsubscribe_after_ack() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager.subscribe("sigA").await.unwrap();
    let connection = server.next_connection().await;
    server.next_request().await;

    // not acknowledged yet
    manager.unsubscribe(id).unwrap();
    server.assert_no_request(Duration::from_millis(200)).await;

    connection.send(subscribe_ack(id, 5));
    timeout(WAIT, async {
        while entry(&manager, id).await.remote_subscription_id.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    manager.unsubscribe(id).unwrap();
    let request = server.next_request().await;
    assert_eq!(request["method"], "signatureUnsubscribe");
    assert_eq!(request["params"], json!([5]));
    let unsubscribe_id = request_id(&request);
    assert_ne!(unsubscribe_id, id);

    connection.send(json!({ "jsonrpc": "2.0", "result": true, "id": unsubscribe_id }));

    let entry = wait_for_status(&manager, id, SubscriptionStatus::Done).await;
    assert!(entry.result.is_none());
}

#[tokio::test]
async fn rejected_subscription_is_an_error() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager.subscribe("not-a-signature").await.unwrap();
    let connection = server.next_connection().await;
    server.next_request().await;

    connection.send(json!({
        "jsonrpc": "2.0",
        "error": { "code": -32602, "message": "Invalid Request: Invalid signature provided" },
        "id": id
    }));

    wait_for_status(&manager, id, SubscriptionStatus::Error).await;
    assert_eq!(manager.pending_count(), 0);
}

#[tokio::test]
async fn bad_frames_do_not_break_the_connection() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager.subscribe("sigA").await.unwrap();
    let connection = server.next_connection().await;
    server.next_request().await;

    connection.send_raw("not json");
    connection.send(json!({ "jsonrpc": "2.0", "result": "what", "id": id }));
    // notification for a subscription nobody holds
    connection.send(processed_notification(99, 1));
    connection.send(json!({ "jsonrpc": "2.0", "method": "slotNotification", "params": {} }));

    connection.send(subscribe_ack(id, 8));
    connection.send(processed_notification(8, 33));

    let entry = wait_for_status(&manager, id, SubscriptionStatus::Done).await;
    assert_eq!(entry.result.unwrap().slot, 33);
    server.assert_no_connection(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn received_notification_settles() {
    let mut server = MockPubsubServer::start().await;
    let (manager, _worker) = SubscriptionManager::start(test_config(server.url()));

    let id = manager
        .subscribe_with(
            "sigA",
            SubscribeOptions {
                enable_received_notification: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let connection = server.next_connection().await;
    let request = server.next_request().await;
    assert_eq!(request["params"][1]["enableReceivedNotification"], true);

    connection.send(subscribe_ack(id, 2));
    connection.send(json!({
        "jsonrpc": "2.0",
        "method": "signatureNotification",
        "params": {
            "result": { "context": { "slot": 20 }, "value": "receivedSignature" },
            "subscription": 2
        }
    }));

    let settled = wait_for_status(&manager, id, SubscriptionStatus::Done).await;
    let result = settled.result.unwrap();
    assert_eq!(result.slot, 20);
    assert_eq!(result.err, None);

    // the later processed notification no longer matches
    connection.send(processed_notification(2, 22));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(entry(&manager, id).await.result.unwrap().slot, 20);
}

#[tokio::test]
async fn worker_stops_with_last_handle() {
    let server = MockPubsubServer::start().await;
    let (manager, worker) = SubscriptionManager::start(test_config(server.url()));

    manager.subscribe("sigA").await.unwrap();
    drop(manager);

    timeout(WAIT, worker).await.unwrap().unwrap().unwrap();
}
