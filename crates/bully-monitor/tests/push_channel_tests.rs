//! Push channel tests against an in-process Socket.IO server

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        RawQuery,
    },
    response::{Json, Response},
    routing::get,
    Router,
};
use bully_monitor::{
    ConnectionState, Dashboard, DashboardConfig, DashboardSink, DashboardView, LeaderChangeEvent,
    NodeId, PushChannel, PushEvent, Update,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Every text frame the server received, plus the handshake query
type FrameLog = Arc<Mutex<Vec<String>>>;

const OPEN_PACKET: &str =
    r#"0{"sid":"Vq3lT0bYbHL5kY8oAAAB","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const STATUS_REQUEST: &str = r#"42["solicitar_bully_status"]"#;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Read frames until one equals `expected`, logging all of them
async fn await_frame(socket: &mut WebSocket, log: &FrameLog, expected: &str) -> bool {
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            log.lock().unwrap().push(text.clone());
            if text == expected {
                return true;
            }
        }
    }
    false
}

async fn send_text(socket: &mut WebSocket, text: impl Into<String>) {
    let _ = socket.send(Message::Text(text.into())).await;
}

async fn send_event(socket: &mut WebSocket, name: &str, data: serde_json::Value) {
    send_text(socket, format!("42{}", json!([name, data]))).await;
}

async fn leader_change_script(
    mut socket: WebSocket,
    log: FrameLog,
    announced: Arc<AtomicBool>,
    close_after: bool,
) {
    send_text(&mut socket, OPEN_PACKET).await;
    if !await_frame(&mut socket, &log, "40").await {
        return;
    }

    send_text(&mut socket, r#"40{"sid":"GbRo9oqH0uc5SsuFAAAC"}"#).await;
    send_event(&mut socket, "connected", json!({"message": "Conectado al nodo 2"})).await;
    send_text(&mut socket, "2").await;

    if !await_frame(&mut socket, &log, STATUS_REQUEST).await {
        return;
    }

    send_event(
        &mut socket,
        "bully_status",
        json!({"error": "Bully system not initialized"}),
    )
    .await;
    send_event(
        &mut socket,
        "bully_status",
        json!({"node_id": 2, "is_leader": false, "current_leader": 1,
            "time_since_last_heartbeat": 0.5}),
    )
    .await;
    // Another namespace never reaches the dashboard
    send_text(&mut socket, r#"42/admin,["lider_cambio",{"nuevo_lider":9}]"#).await;
    announced.store(true, Ordering::SeqCst);
    send_event(
        &mut socket,
        "lider_cambio",
        json!({"nuevo_lider": 3, "term": 7, "timestamp": 1712345678.5}),
    )
    .await;

    if !await_frame(&mut socket, &log, STATUS_REQUEST).await {
        return;
    }

    if close_after {
        send_text(&mut socket, "1").await;
    } else {
        while let Some(Ok(_)) = socket.recv().await {}
    }
}

fn push_router(log: FrameLog, announced: Arc<AtomicBool>, close_after: bool) -> Router {
    Router::new().route(
        "/socket.io/",
        get(move |RawQuery(query): RawQuery, ws: WebSocketUpgrade| {
            let log = log.clone();
            let announced = announced.clone();
            async move {
                log.lock()
                    .unwrap()
                    .push(format!("query:{}", query.unwrap_or_default()));
                let response: Response = ws.on_upgrade(move |socket| {
                    leader_change_script(socket, log, announced, close_after)
                });
                response
            }
        }),
    )
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Update>) -> PushEvent {
    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(Update::Push(event))) => event,
        other => panic!("expected a push event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_push_channel_delivers_events_in_order() {
    let log = FrameLog::default();
    let addr = serve(push_router(log.clone(), Arc::default(), true)).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = PushChannel::new(format!("ws://{}", addr), Duration::from_millis(50));
    let subscription = channel.subscribe(tx);

    assert_eq!(next_event(&mut rx).await, PushEvent::Connected);

    // The greeting, the error-marked broadcast and the foreign namespace
    // never surface
    match next_event(&mut rx).await {
        PushEvent::ObserverBroadcast(status) => {
            assert_eq!(status.node_id, NodeId::from("2"));
            assert_eq!(status.current_leader_id, Some(NodeId::from("1")));
        }
        other => panic!("expected a status broadcast, got {:?}", other),
    }

    assert_eq!(
        next_event(&mut rx).await,
        PushEvent::LeaderChanged(LeaderChangeEvent::new("3").with_term(7))
    );

    assert!(matches!(next_event(&mut rx).await, PushEvent::Disconnected { .. }));
    assert_eq!(next_event(&mut rx).await, PushEvent::Connected);
    subscription.unsubscribe();

    let frames = log.lock().unwrap().clone();
    assert_eq!(frames[0], "query:EIO=4&transport=websocket");
    assert!(frames.contains(&"40".to_string()));
    // The server ping was answered
    assert!(frames.contains(&"3".to_string()));
    // Initial request plus the one re-sent after the leader change
    assert!(frames.iter().filter(|f| *f == STATUS_REQUEST).count() >= 2);
}

#[tokio::test]
async fn test_silent_server_counts_as_disconnected() {
    let app = Router::new().route(
        "/socket.io/",
        get(|ws: WebSocketUpgrade| async move {
            let response: Response = ws.on_upgrade(|mut socket: WebSocket| async move {
                send_text(
                    &mut socket,
                    r#"0{"sid":"quiet","upgrades":[],"pingInterval":100,"pingTimeout":100}"#,
                )
                .await;
                // Never answers the namespace connect, never pings
                while let Some(Ok(_)) = socket.recv().await {}
            });
            response
        }),
    );
    let addr = serve(app).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = PushChannel::new(format!("ws://{}", addr), Duration::from_secs(60));
    let subscription = channel.subscribe(tx);

    match next_event(&mut rx).await {
        PushEvent::Disconnected { reason } => assert!(reason.contains("heartbeat")),
        other => panic!("expected a disconnect, got {:?}", other),
    }

    subscription.unsubscribe();
}

#[tokio::test]
async fn test_refused_namespace_connect_retries() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let app = Router::new().route(
        "/socket.io/",
        get(move |ws: WebSocketUpgrade| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let response: Response = ws.on_upgrade(|mut socket: WebSocket| async move {
                    send_text(&mut socket, OPEN_PACKET).await;
                    while let Some(Ok(Message::Text(text))) = socket.recv().await {
                        if text == "40" {
                            send_text(&mut socket, r#"44{"message":"Not authorized"}"#).await;
                        }
                    }
                });
                response
            }
        }),
    );
    let addr = serve(app).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = PushChannel::new(format!("ws://{}", addr), Duration::from_millis(20));
    let subscription = channel.subscribe(tx);

    match next_event(&mut rx).await {
        PushEvent::Disconnected { reason } => assert!(reason.contains("Not authorized")),
        other => panic!("expected a disconnect, got {:?}", other),
    }
    assert!(matches!(next_event(&mut rx).await, PushEvent::Disconnected { .. }));
    assert!(attempts.load(Ordering::SeqCst) >= 2);

    subscription.unsubscribe();
}

#[derive(Clone, Default)]
struct RecordingSink {
    views: Arc<Mutex<Vec<DashboardView>>>,
    notices: Arc<Mutex<Vec<LeaderChangeEvent>>>,
}

impl DashboardSink for RecordingSink {
    fn render(&mut self, view: &DashboardView) {
        self.views.lock().unwrap().push(view.clone());
    }

    fn notify(&mut self, event: &LeaderChangeEvent) {
        self.notices.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_mounted_dashboard_follows_leader_change() {
    let cluster_calls = Arc::new(AtomicUsize::new(0));
    let announced = Arc::new(AtomicBool::new(false));

    let counter = cluster_calls.clone();
    let changed = announced.clone();
    let app = push_router(FrameLog::default(), announced, false)
        .route(
            "/api/bully/status",
            get(|| async {
                Json(json!({"node_id": 2, "is_leader": false, "current_leader": 1,
                    "time_since_last_heartbeat": 0.2}))
            }),
        )
        .route(
            "/api/bully/cluster",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                // Pulls served after the leader change see the new leader
                let (leader, first, third) = if changed.load(Ordering::SeqCst) {
                    (3, "follower", "leader")
                } else {
                    (1, "leader", "follower")
                };
                async move {
                    Json(json!({
                        "nodes": [
                            {"id": 1, "is_current": false, "state": first},
                            {"id": 2, "is_current": true, "state": "follower"},
                            {"id": 3, "is_current": false, "state": third}
                        ],
                        "cluster_size": 3,
                        "current_leader": leader
                    }))
                }
            }),
        );
    let addr = serve(app).await;

    let config = DashboardConfig {
        base_url: format!("http://{}", addr),
        push_url: Some(format!("ws://{}", addr)),
        refresh_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let sink = RecordingSink::default();
    let handle = Dashboard::mount(&config, Box::new(sink.clone())).unwrap();

    // Mount tick, connect and leader change each pull the roster once
    for _ in 0..400 {
        if cluster_calls.load(Ordering::SeqCst) >= 3 && !sink.notices.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(cluster_calls.load(Ordering::SeqCst) >= 3);
    assert!(handle.is_push_active());

    let mut leader = None;
    for _ in 0..400 {
        let model = handle.snapshot().await.unwrap();
        leader = model
            .roster()
            .and_then(|r| r.leaders().next().map(|n| n.node_id.clone()));
        if leader == Some(NodeId::from("3")) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(leader, Some(NodeId::from("3")));

    let notices = sink.notices.lock().unwrap().clone();
    assert_eq!(notices, vec![LeaderChangeEvent::new("3").with_term(7)]);

    let last = sink.views.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.connection, ConnectionState::Connected);
    assert_eq!(
        last.notification.as_deref(),
        Some("Node 3 is the new leader (term 7)")
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_leader_change_without_term_still_refetches() {
    let cluster_calls = Arc::new(AtomicUsize::new(0));
    let counter = cluster_calls.clone();

    let app = Router::new()
        .route(
            "/socket.io/",
            get(|ws: WebSocketUpgrade| async move {
                let response: Response = ws.on_upgrade(|mut socket: WebSocket| async move {
                    let log = FrameLog::default();
                    send_text(&mut socket, OPEN_PACKET).await;
                    if !await_frame(&mut socket, &log, "40").await {
                        return;
                    }
                    send_text(&mut socket, "40").await;
                    if !await_frame(&mut socket, &log, STATUS_REQUEST).await {
                        return;
                    }
                    send_event(&mut socket, "lider_cambio", json!({"nuevo_lider": 4})).await;
                    while let Some(Ok(_)) = socket.recv().await {}
                });
                response
            }),
        )
        .route(
            "/api/bully/status",
            get(|| async { Json(json!({"node_id": 2, "is_leader": false, "current_leader": 4})) }),
        )
        .route(
            "/api/bully/cluster",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({"nodes": [{"id": 4, "state": "leader"}]})) }
            }),
        );
    let addr = serve(app).await;

    let config = DashboardConfig {
        base_url: format!("http://{}", addr),
        push_url: Some(format!("ws://{}", addr)),
        refresh_interval: Duration::from_secs(3600),
        ..Default::default()
    };
    let sink = RecordingSink::default();
    let handle = Dashboard::mount(&config, Box::new(sink.clone())).unwrap();

    for _ in 0..400 {
        if cluster_calls.load(Ordering::SeqCst) >= 3 && !sink.notices.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(cluster_calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(
        *sink.notices.lock().unwrap(),
        vec![LeaderChangeEvent::new("4")]
    );

    handle.shutdown().await.unwrap();
}
