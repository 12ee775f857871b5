//! Shared harness: boots the full application on an ephemeral port over
//! the in-memory store.

#![allow(dead_code, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use gambit_server::api;
use gambit_server::app_state::AppState;
use gambit_server::auth::TokenService;
use gambit_server::persistence::MemoryStore;
use gambit_server::ws::{DEFAULT_CLIENT_CAPACITY, SessionHub};

pub type Session = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server and an HTTP client pointed at it.
pub struct TestServer {
    pub http: reqwest::Client,
    pub base: String,
    pub ws_base: String,
    pub store: MemoryStore,
}

/// A registered user.
pub struct Player {
    pub id: i64,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let store = MemoryStore::new();
        let state = AppState::new(
            Arc::new(store.clone()),
            TokenService::new(b"e2e-secret"),
            SessionHub::spawn(),
            DEFAULT_CLIENT_CAPACITY,
        );
        let app = api::build_app(state, Duration::from_secs(30));

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind test listener");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener has no local address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            http: reqwest::Client::new(),
            base: format!("http://{addr}"),
            ws_base: format!("ws://{addr}"),
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn register(&self, username: &str) -> Player {
        let Ok(resp) = self
            .http
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "hunter22",
            }))
            .send()
            .await
        else {
            panic!("register request failed");
        };
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let body = json_body(resp).await;
        Player {
            id: body
                .pointer("/user/id")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            access_token: str_at(&body, "/accessToken"),
            refresh_token: str_at(&body, "/refreshToken"),
        }
    }

    pub async fn get(&self, path: &str, player: &Player) -> reqwest::Response {
        let Ok(resp) = self
            .http
            .get(self.url(path))
            .bearer_auth(&player.access_token)
            .send()
            .await
        else {
            panic!("GET {path} failed");
        };
        resp
    }

    pub async fn post(&self, path: &str, player: &Player) -> reqwest::Response {
        let Ok(resp) = self
            .http
            .post(self.url(path))
            .bearer_auth(&player.access_token)
            .send()
            .await
        else {
            panic!("POST {path} failed");
        };
        resp
    }

    /// Creates a game as `white` and seats `black`. Returns the game id.
    pub async fn active_game(&self, white: &Player, black: &Player) -> i64 {
        let created = json_body(self.post("/api/games", white).await).await;
        let id = created.get("id").and_then(Value::as_i64).unwrap_or_default();
        let joined = self.post(&format!("/api/games/{id}/join"), black).await;
        assert_eq!(joined.status(), reqwest::StatusCode::OK);
        id
    }

    pub async fn connect(&self, game_id: i64, player: &Player) -> Session {
        let url = format!(
            "{}/api/ws/games/{game_id}?token={}",
            self.ws_base, player.access_token
        );
        let Ok((session, _)) = tokio_tungstenite::connect_async(url).await else {
            panic!("session upgrade failed");
        };
        session
    }

    /// Attempts an upgrade and returns the HTTP status of a rejection.
    pub async fn reject_status(&self, path_and_query: &str) -> u16 {
        let url = format!("{}{path_and_query}", self.ws_base);
        match tokio_tungstenite::connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => resp.status().as_u16(),
            Err(e) => panic!("unexpected upgrade error: {e}"),
            Ok(_) => panic!("upgrade unexpectedly succeeded"),
        }
    }
}

pub async fn json_body(resp: reqwest::Response) -> Value {
    let Ok(body) = resp.json::<Value>().await else {
        panic!("response body is not JSON");
    };
    body
}

pub fn str_at(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Next JSON text frame, skipping control frames.
pub async fn next_frame(session: &mut Session) -> Value {
    loop {
        let Ok(next) = tokio::time::timeout(FRAME_TIMEOUT, session.next()).await else {
            panic!("timed out waiting for a frame");
        };
        let Some(Ok(msg)) = next else {
            panic!("session ended while waiting for a frame");
        };
        if let Message::Text(text) = msg {
            let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                panic!("frame is not JSON: {}", text.as_str());
            };
            return frame;
        }
    }
}

pub async fn send_move(session: &mut Session, uci: &str) {
    send_json(session, json!({ "type": "move", "uci": uci })).await;
}

pub async fn send_json(session: &mut Session, frame: Value) {
    if session.send(Message::text(frame.to_string())).await.is_err() {
        panic!("failed to send frame");
    }
}
