//! Drives a real agent against a local WebSocket server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatlink_agent::Agent;
use chatlink_capture::{CaptureObserver, CapturedItem, ContainerHandle, ItemSink, PageBridge};
use chatlink_core::{AgentConfig, CaptureError};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerWs = WebSocketStream<TcpStream>;

// ── Fakes ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct PageState {
    path: String,
    container: bool,
}

#[derive(Clone)]
struct FakePage(Arc<Mutex<PageState>>);

impl FakePage {
    fn set_path(&self, path: &str) {
        self.0.lock().unwrap().path = path.to_owned();
    }
}

impl PageBridge for FakePage {
    fn locate_capture_container(&self) -> Option<ContainerHandle> {
        self.0.lock().unwrap().container.then(|| ContainerHandle("#chat".to_owned()))
    }

    fn current_navigation_path(&self) -> String {
        self.0.lock().unwrap().path.clone()
    }
}

#[derive(Default)]
struct ObserverState {
    observe_calls: u32,
    unobserve_calls: u32,
    sink: Option<ItemSink>,
}

#[derive(Clone, Default)]
struct FakeObserver(Arc<Mutex<ObserverState>>);

impl FakeObserver {
    fn counts(&self) -> (u32, u32) {
        let state = self.0.lock().unwrap();
        (state.observe_calls, state.unobserve_calls)
    }

    fn sink(&self) -> Option<ItemSink> {
        self.0.lock().unwrap().sink.clone()
    }
}

impl CaptureObserver for FakeObserver {
    fn observe(&mut self, _container: &ContainerHandle, on_item_added: ItemSink) -> Result<(), CaptureError> {
        let mut state = self.0.lock().unwrap();
        state.observe_calls += 1;
        state.sink = Some(on_item_added);
        Ok(())
    }

    fn unobserve(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.unobserve_calls += 1;
        state.sink = None;
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct Fixture {
    listener: TcpListener,
    page: FakePage,
    observer: FakeObserver,
    nav_tx: mpsc::UnboundedSender<String>,
}

/// Run `script` as the server side while the agent runs in this task.
async fn run_with_server<S, Fut>(path: &str, script: S)
where
    S: FnOnce(Fixture, oneshot::Sender<()>) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let page = FakePage(Arc::new(Mutex::new(PageState { path: path.to_owned(), container: true })));
    let observer = FakeObserver::default();
    let (nav_tx, nav_rx) = mpsc::unbounded_channel();

    let config = AgentConfig {
        server_url: format!("ws://127.0.0.1:{}", port),
        retry_interval_ms: 50,
    };
    let agent = Agent::new(config, page.clone(), observer.clone());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    // Scripts that never navigate drop their sender; the agent must keep running.
    let _nav_keepalive = nav_tx.clone();
    let fixture = Fixture { listener, page, observer, nav_tx };
    let server = tokio::spawn(script(fixture, stop_tx));

    tokio::time::timeout(
        Duration::from_secs(10),
        agent.run(nav_rx, async {
            let _ = stop_rx.await;
        }),
    )
    .await
    .expect("agent stopped in time")
    .expect("agent ran cleanly");

    server.await.expect("server script passed");
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (tcp, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("agent dialed")
        .unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

async fn next_message(ws: &mut ServerWs) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("message from agent")
            .expect("stream open")
            .expect("valid frame");
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn next_text(ws: &mut ServerWs) -> String {
    match next_message(ws).await {
        Message::Text(text) => text.to_string(),
        other => panic!("expected text, got {:?}", other),
    }
}

async fn send(ws: &mut ServerWs, wire: &str) {
    ws.send(Message::Text(wire.to_owned().into())).await.unwrap();
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn forwards_chat_only_while_armed() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws).await, r#"id {"id":"abc123"}"#);

        send(&mut ws, r#"active {"shouldBeActive":true}"#).await;
        let observer = fx.observer.clone();
        wait_until(|| observer.sink().is_some()).await;
        let sink = fx.observer.sink().unwrap();

        sink.send(CapturedItem::new("alice", "hi")).unwrap();
        assert_eq!(next_text(&mut ws).await, r#"message {"author":"alice","text":"hi"}"#);

        // Invalid entries are dropped without touching the connection.
        sink.send(CapturedItem { author: Some("carol".into()), text: Some(String::new()) }).unwrap();

        send(&mut ws, r#"active {"shouldBeActive":false}"#).await;
        let observer = fx.observer.clone();
        wait_until(|| observer.counts().1 == 1).await;

        // The observer reports one more entry after being disarmed.
        sink.send(CapturedItem::new("bob", "late")).unwrap();
        let silence = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
        assert!(silence.is_err(), "unexpected frame after disarm: {:?}", silence);

        assert_eq!(fx.observer.counts(), (1, 1));
        let _ = stop.send(());
        assert!(matches!(next_message(&mut ws).await, Message::Close(None)));
    })
    .await;
}

#[tokio::test]
async fn repeated_arm_starts_capture_once() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        next_text(&mut ws).await;

        send(&mut ws, r#"active {"shouldBeActive":true}"#).await;
        send(&mut ws, r#"active {"shouldBeActive":true}"#).await;
        send(&mut ws, r#"ping {"t":1}"#).await;
        let observer = fx.observer.clone();
        wait_until(|| observer.counts().0 >= 1).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(fx.observer.counts(), (1, 0));
        let _ = stop.send(());
    })
    .await;
}

#[tokio::test]
async fn protocol_violation_closes_with_4002_and_reconnects() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        next_text(&mut ws).await;

        send(&mut ws, r#"active {"shouldBeActive":"yes"}"#).await;
        match next_message(&mut ws).await {
            Message::Close(Some(CloseFrame { code, reason })) => {
                assert_eq!(u16::from(code), 4002);
                assert_eq!(reason.to_string(), "protocol violated");
            }
            other => panic!("expected close frame, got {:?}", other),
        }
        assert_eq!(fx.observer.counts(), (0, 0));

        // Idle again: the next tick dials a fresh connection.
        let mut ws2 = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws2).await, r#"id {"id":"abc123"}"#);
        let _ = stop.send(());
    })
    .await;
}

#[tokio::test]
async fn malformed_packet_closes_with_4001() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        next_text(&mut ws).await;

        send(&mut ws, "active true").await;
        match next_message(&mut ws).await {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::from(4001)),
            other => panic!("expected close frame, got {:?}", other),
        }
        let _ = stop.send(());
    })
    .await;
}

#[tokio::test]
async fn remote_close_stops_capture_and_reopen_starts_inactive() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        next_text(&mut ws).await;
        send(&mut ws, r#"active {"shouldBeActive":true}"#).await;
        let observer = fx.observer.clone();
        wait_until(|| observer.counts().0 == 1).await;

        ws.close(Some(CloseFrame { code: CloseCode::Away, reason: "bye".into() })).await.unwrap();
        let observer = fx.observer.clone();
        wait_until(|| observer.counts().1 == 1).await;

        let mut ws2 = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws2).await, r#"id {"id":"abc123"}"#);

        // Not re-armed yet: captured entries go nowhere.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.observer.counts(), (1, 1));
        assert!(fx.observer.sink().is_none());
        let _ = stop.send(());
    })
    .await;
}

#[tokio::test]
async fn navigation_reconnects_with_new_session_id() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        let mut ws = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws).await, r#"id {"id":"abc123"}"#);

        fx.page.set_path("/watch?v=xyz789");
        fx.nav_tx.send("/watch?v=xyz789".to_owned()).unwrap();
        assert!(matches!(next_message(&mut ws).await, Message::Close(None)));

        let mut ws2 = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws2).await, r#"id {"id":"xyz789"}"#);
        let _ = stop.send(());
    })
    .await;
}

#[tokio::test]
async fn no_dial_without_chat_container() {
    run_with_server("/watch?v=abc123", |fx, stop| async move {
        fx.page.0.lock().unwrap().container = false;
        let early = tokio::time::timeout(Duration::from_millis(200), fx.listener.accept()).await;
        // The first tick may race the flag; only later ticks are checked.
        drop(early);
        let later = tokio::time::timeout(Duration::from_millis(200), fx.listener.accept()).await;
        assert!(later.is_err(), "agent dialed without a chat container");

        fx.page.0.lock().unwrap().container = true;
        let mut ws = accept(&fx.listener).await;
        assert_eq!(next_text(&mut ws).await, r#"id {"id":"abc123"}"#);
        let _ = stop.send(());
    })
    .await;
}
