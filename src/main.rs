mod cadence;
mod config;
mod game;
mod roster;
mod session;
mod types;

use askama::Template;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tower_http::services::ServeDir;

use crate::game::{GameCommand, GameHandle};
use crate::types::*;

// ─── Templates ────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "console.html")]
struct ConsoleTemplate;

// ─── Routes ───────────────────────────────────────────────────────

async fn console_page() -> impl IntoResponse {
    Html(ConsoleTemplate.to_string())
}

async fn ws_handler(ws: WebSocketUpgrade, State(game): State<GameHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, game))
}

async fn handle_socket(socket: WebSocket, game: GameHandle) {
    let (mut sender, mut receiver) = socket.split();

    let socket_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("WebSocket connected: {}", socket_id);

    // Forward session events addressed to this socket. Each socket has its
    // own subscription, so a slow socket only ever lags itself.
    let mut event_rx = game.event_tx.subscribe();
    let forward_id = socket_id.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if event.socket_id != forward_id {
                        continue;
                    }
                    if let Ok(json) = serde_json::to_string(&event.msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            return;
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    // every snapshot is complete, so skipping is safe
                    tracing::debug!("socket {} lagged, skipped {} events", forward_id, skipped);
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    // Process incoming frames. Malformed ones are dropped with a warning,
    // never an error back to the client.
    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };

        let client_msg: ClientMsg = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Invalid frame from {}: {}", socket_id, e);
                continue;
            }
        };

        let cmd = match client_msg {
            ClientMsg::WebHello { .. } => GameCommand::WebHello {
                socket_id: socket_id.clone(),
            },
            ClientMsg::BlockHello { block_id } => GameCommand::BlockHello {
                socket_id: socket_id.clone(),
                block_id,
            },
            ClientMsg::Report { success } => GameCommand::Report {
                socket_id: socket_id.clone(),
                success,
            },
            ClientMsg::Admin(action) => GameCommand::Admin { action },
        };

        if game.cmd_tx.send(cmd).await.is_err() {
            break;
        }
    }

    // Socket closed: the session treats this as a leave.
    tracing::info!("WebSocket disconnected: {}", socket_id);
    let _ = game
        .cmd_tx
        .send(GameCommand::Disconnect {
            socket_id: socket_id.clone(),
        })
        .await;
    forward_task.abort();
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    config::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .expect("Invalid PORT");

    let game_config = config::load_game_config();
    let game = game::spawn_game(game_config);

    let app = Router::new()
        .route("/", get(console_page))
        .route("/ws", get(ws_handler))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(game);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind");

    tracing::info!("Block Party server running on port {}", port);

    axum::serve(listener, app).await.unwrap();
}
