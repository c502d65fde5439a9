// Shared in-process fake battle server for integration tests.
use axum::{
    Json, Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

// Base address (`host:port`) published once the server is bound.
static SERVER_ADDR: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();
// Heartbeat replies received over every socket.
static HEARTBEATS: AtomicUsize = AtomicUsize::new(0);

pub const STATE_UPDATE: &str = r#"{"type":"state_update","battle_id":"b-1","creator_username":"host","scores":{"Morocco":120,"Egypt":120,"Tunisia":80},"time_remaining":240,"total_seconds":300,"battle_finished":false,"last_gift":{"user":"ali","gift":"Lion","points":500,"country":"Egypt","is_lion":true}}"#;
pub const GAME_OVER: &str = r#"{"type":"game_over","battle_id":"b-1","winner":"Egypt","rankings":[{"country":"Egypt","score":620,"position":1},{"country":"Morocco","score":120,"position":2}],"duration_seconds":300}"#;

#[derive(Debug, Deserialize)]
struct ManualScore {
    country: String,
    points: u64,
    #[serde(default)]
    gift: Option<String>,
}

pub fn heartbeats_received() -> usize {
    HEARTBEATS.load(Ordering::SeqCst)
}

pub fn ws_url() -> String {
    format!("ws://{}/ws", ensure_server())
}

pub fn api_url() -> String {
    format!("http://{}", ensure_server())
}

// Ensure the fake server is running and return its `host:port`.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // Own OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                axum::serve(listener, router())
                    .await
                    .expect("fake server failed");
            });
        });
        wait_for_server_readiness(published_addr);
    });

    SERVER_ADDR
        .get()
        .expect("server addr should be initialized")
        .as_str()
}

fn router() -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/manual-score", post(manual_score))
        .route("/reset", post(reset))
        .route("/history", get(history))
        .route("/leaderboard", get(leaderboard))
        .route("/active-battle", get(active_battle))
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(serve_socket)
}

// Scripted battle: a state update, a heartbeat, then the final result once the
// heartbeat is answered.
async fn serve_socket(mut socket: WebSocket) {
    if socket.send(Message::Text(STATE_UPDATE.into())).await.is_err() {
        return;
    }
    if socket
        .send(Message::Text(r#"{"type":"ping"}"#.into()))
        .await
        .is_err()
    {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) if text.as_str() == "ping" => {
                HEARTBEATS.fetch_add(1, Ordering::SeqCst);
                let _ = socket.send(Message::Text(GAME_OVER.into())).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn manual_score(Json(body): Json<ManualScore>) -> impl IntoResponse {
    if body.country == "Atlantis" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Country not in this battle" })),
        );
    }
    let gift = body.gift.unwrap_or_else(|| "manual".to_string());
    (
        StatusCode::OK,
        Json(json!({
            "message": "Score updated",
            "detail": format!("+{} pts -> {} ({gift})", body.points, body.country),
        })),
    )
}

async fn reset() -> impl IntoResponse {
    Json(json!({ "message": "Battle reset" }))
}

async fn history() -> impl IntoResponse {
    Json(json!([
        {
            "id": "b-1",
            "creator_username": "host",
            "started_at": "2026-01-01T10:00:00",
            "ended_at": "2026-01-01T10:05:00",
            "duration_seconds": 300,
            "winner_country": "Egypt"
        },
        {
            "id": "b-2",
            "creator_username": "host",
            "started_at": "2026-01-01T11:00:00"
        }
    ]))
}

async fn leaderboard() -> impl IntoResponse {
    Json(json!([
        {
            "country_name": "Egypt",
            "total_wins": 3,
            "total_second_place": 1,
            "total_third_place": 0,
            "total_battles": 4
        }
    ]))
}

async fn active_battle() -> impl IntoResponse {
    Json(json!({
        "active": true,
        "battle": {
            "battle_id": "b-1",
            "creator_username": "host",
            "scores": { "Egypt": 10, "Morocco": 30 },
            "time_remaining": 100,
            "total_seconds": 300,
            "battle_finished": false
        }
    }))
}

// Wait for address publication, then for the socket to accept TCP connections.
fn wait_for_server_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}
