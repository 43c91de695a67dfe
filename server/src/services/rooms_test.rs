use super::*;
use frames::Message;

fn message(id: i64, thread_id: RoomId) -> Message {
    Message { id, thread_id, ..Message::default() }
}

#[tokio::test]
async fn notify_reaches_only_room_members() {
    let registry = RoomRegistry::new();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    registry.join(42, a, tx_a).await;
    registry.join(7, b, tx_b).await;

    let delivered = registry.notify_room(42, &InboundEvent::new_message(message(1, 42))).await;
    assert_eq!(delivered, 1);

    let text = rx_a.try_recv().expect("member receives event");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["type"], "new-message");
    assert_eq!(value["data"]["thread_id"], 42);
    assert!(rx_b.try_recv().is_err(), "other room must not receive");
}

#[tokio::test]
async fn notify_unknown_room_delivers_nothing() {
    let registry = RoomRegistry::new();
    assert_eq!(registry.notify_room(1, &InboundEvent::delete_thread(1)).await, 0);
}

#[tokio::test]
async fn leave_removes_empty_rooms() {
    let registry = RoomRegistry::new();
    let (tx, _rx) = mpsc::channel(8);
    let client = Uuid::new_v4();
    registry.join(3, client, tx).await;
    assert_eq!(registry.member_count(3).await, 1);

    assert!(registry.leave(3, client).await);
    assert!(!registry.leave(3, client).await);
    assert_eq!(registry.member_count(3).await, 0);
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn leave_all_drops_client_everywhere() {
    let registry = RoomRegistry::new();
    let (tx, _rx) = mpsc::channel(8);
    let (other_tx, _other_rx) = mpsc::channel(8);
    let client = Uuid::new_v4();
    let other = Uuid::new_v4();
    registry.join(1, client, tx.clone()).await;
    registry.join(2, client, tx).await;
    registry.join(2, other, other_tx).await;

    assert_eq!(registry.leave_all(client).await, 2);
    assert_eq!(registry.room_count().await, 1);
    assert_eq!(registry.member_count(2).await, 1);
}

#[tokio::test]
async fn closed_clients_are_evicted_on_notify() {
    let registry = RoomRegistry::new();
    let (tx, rx) = mpsc::channel(8);
    let client = Uuid::new_v4();
    registry.join(5, client, tx).await;
    drop(rx);

    assert_eq!(registry.notify_room(5, &InboundEvent::delete_thread(5)).await, 0);
    assert_eq!(registry.member_count(5).await, 0);
}

#[tokio::test]
async fn full_queue_skips_event_but_keeps_member() {
    let registry = RoomRegistry::new();
    let (tx, mut rx) = mpsc::channel(1);
    let client = Uuid::new_v4();
    registry.join(5, client, tx).await;

    assert_eq!(registry.notify_room(5, &InboundEvent::delete_thread(5)).await, 1);
    assert_eq!(registry.notify_room(5, &InboundEvent::delete_thread(5)).await, 0);
    assert_eq!(registry.member_count(5).await, 1);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn rejoin_replaces_sender() {
    let registry = RoomRegistry::new();
    let (old_tx, mut old_rx) = mpsc::channel(8);
    let (new_tx, mut new_rx) = mpsc::channel(8);
    let client = Uuid::new_v4();
    registry.join(9, client, old_tx).await;
    registry.join(9, client, new_tx).await;

    registry.notify_room(9, &InboundEvent::delete_message(message(2, 9))).await;
    assert!(old_rx.try_recv().is_err());
    assert!(new_rx.try_recv().is_ok());
    assert_eq!(registry.member_count(9).await, 1);
}
