use super::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, PartialEq)]
enum Seen {
    NewMessage(i64),
    DeleteMessage(i64),
    DeleteThread,
    Disconnect,
}

struct Recorder(mpsc::UnboundedSender<Seen>);

impl RoomHandler for Recorder {
    fn on_new_message(&mut self, message: Message) {
        let _ = self.0.send(Seen::NewMessage(message.id));
    }

    fn on_delete_message(&mut self, message: Message) {
        let _ = self.0.send(Seen::DeleteMessage(message.id));
    }

    fn on_delete_thread(&mut self) {
        let _ = self.0.send(Seen::DeleteThread);
    }

    fn on_disconnect(&mut self) {
        let _ = self.0.send(Seen::Disconnect);
    }
}

fn fast_policy(max_attempts: Option<u32>) -> ReconnectPolicy {
    ReconnectPolicy {
        initial: Duration::from_millis(10),
        max: Duration::from_millis(40),
        max_attempts,
    }
}

async fn next_seen(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    timeout(WAIT, rx.recv())
        .await
        .expect("handler event timed out")
        .expect("handler dropped before expected event")
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (tcp, _) = timeout(WAIT, listener.accept())
        .await
        .expect("accept timed out")
        .expect("accept");
    accept_async(tcp).await.expect("websocket handshake")
}

async fn read_join(ws: &mut WebSocketStream<TcpStream>) -> serde_json::Value {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("relay read timed out")
            .expect("client hung up")
            .expect("relay read failed");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("join json");
        }
    }
}

#[test]
fn delay_doubles_and_caps() {
    let policy = ReconnectPolicy {
        initial: Duration::from_millis(1000),
        max: Duration::from_millis(10_000),
        max_attempts: None,
    };
    assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
    assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    assert_eq!(policy.delay_for(4), Duration::from_millis(8000));
    assert_eq!(policy.delay_for(5), Duration::from_millis(10_000));
    assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10_000));
}

#[test]
fn exhausted_respects_limit() {
    assert!(!fast_policy(None).exhausted(1_000));
    assert!(!fast_policy(Some(3)).exhausted(2));
    assert!(fast_policy(Some(3)).exhausted(3));
}

#[test]
fn default_policy_matches_config_defaults() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.initial, Duration::from_secs(1));
    assert_eq!(policy.max, Duration::from_secs(10));
    assert_eq!(policy.max_attempts, None);
}

#[tokio::test]
async fn rejoins_room_after_remote_close_and_keeps_forwarding() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/api/v1/ws", listener.local_addr().expect("addr"));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reconnector = Reconnector::new(RealtimeChannel::from_url(url), fast_policy(None));
    let handle = reconnector.join(42, Recorder(tx));

    let mut first = accept(&listener).await;
    assert_eq!(read_join(&mut first).await, json!({"type": "join", "room_id": 42}));
    first.close(None).await.expect("close first");

    let mut second = accept(&listener).await;
    assert_eq!(read_join(&mut second).await, json!({"type": "join", "room_id": 42}));
    assert_eq!(handle.joins(), 2);

    let frame = json!({"type": "new-message", "data": {"id": 5, "thread_id": 42}});
    second.send(WsMessage::Text(frame.to_string().into())).await.expect("push");
    assert_eq!(next_seen(&mut rx).await, Seen::NewMessage(5));

    handle.close();
    handle.closed().await;
    assert_eq!(next_seen(&mut rx).await, Seen::Disconnect);
    assert!(handle.is_closed());
    assert_eq!(timeout(WAIT, rx.recv()).await.expect("handler never dropped"), None);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/api/v1/ws", listener.local_addr().expect("addr"));
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reconnector = Reconnector::new(RealtimeChannel::from_url(url), fast_policy(Some(3)));
    let handle = reconnector.join(9, Recorder(tx));

    timeout(WAIT, handle.closed()).await.expect("supervisor never gave up");
    assert_eq!(handle.joins(), 3);
    assert_eq!(next_seen(&mut rx).await, Seen::Disconnect);
    assert_eq!(timeout(WAIT, rx.recv()).await.expect("handler never dropped"), None);
}

#[tokio::test]
async fn close_during_backoff_disconnects_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}/api/v1/ws", listener.local_addr().expect("addr"));
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let policy = ReconnectPolicy {
        initial: Duration::from_secs(30),
        max: Duration::from_secs(30),
        max_attempts: None,
    };
    let handle = Reconnector::new(RealtimeChannel::from_url(url), policy).join(9, Recorder(tx));

    // Let the first connect fail so the supervisor is parked in its backoff sleep.
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.close();
    handle.close();

    timeout(WAIT, handle.closed()).await.expect("close did not interrupt backoff");
    assert_eq!(handle.joins(), 1);
    assert_eq!(next_seen(&mut rx).await, Seen::Disconnect);
    assert_eq!(timeout(WAIT, rx.recv()).await.expect("handler never dropped"), None);
}
