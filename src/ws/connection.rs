//! Duplex session pumps.
//!
//! Each session runs a writer task draining the client's outbound queue and
//! a reader task turning `move` frames into commits. Whichever finishes
//! first ends the session. The reader is only ever stopped between frames,
//! never while a commit is in flight.

use std::ops::ControlFlow;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

use super::hub::{SessionClient, SessionHub};
use super::messages::{ClientFrame, ServerFrame};
use crate::app_state::AppState;
use crate::domain::{ClientId, GameId, GameStatus, UserId};
use crate::service::GameService;

/// Identity and collaborators of one open session.
#[derive(Debug, Clone)]
struct SessionContext {
    games: GameService,
    hub: SessionHub,
    game_id: GameId,
    user_id: UserId,
    client_id: ClientId,
}

impl SessionContext {
    /// Commits one move and routes the outcome. `Break` ends the session.
    async fn play(&self, uci: &str) -> ControlFlow<()> {
        match self.games.commit_move(self.game_id, self.user_id, uci).await {
            Ok(committed) => {
                tracing::debug!(
                    game_id = %self.game_id,
                    user_id = %self.user_id,
                    ply = committed.record.ply_number,
                    uci,
                    "move broadcast"
                );
                if committed.game.status == GameStatus::Finished {
                    tracing::info!(
                        game_id = %self.game_id,
                        outcome = %committed.game.result,
                        "game finished over session"
                    );
                }
                self.hub
                    .broadcast(self.game_id, ServerFrame::committed(committed));
                ControlFlow::Continue(())
            }
            Err(err) => {
                self.hub
                    .send_to(self.game_id, self.client_id, ServerFrame::error(&err));
                if err.is_session_fatal() {
                    tracing::error!(
                        game_id = %self.game_id,
                        client_id = %self.client_id,
                        error = %err,
                        "closing session after failed commit"
                    );
                    ControlFlow::Break(())
                } else {
                    tracing::debug!(
                        game_id = %self.game_id,
                        user_id = %self.user_id,
                        uci,
                        error = %err,
                        "move rejected"
                    );
                    ControlFlow::Continue(())
                }
            }
        }
    }
}

/// Runs an upgraded session until either side closes.
///
/// The snapshot is queued before the client is handed to the hub, so it is
/// always the first frame the player receives.
pub async fn run_session(
    socket: WebSocket,
    state: AppState,
    game_id: GameId,
    user_id: UserId,
    snapshot: ServerFrame,
) {
    let (client, outbound) = SessionClient::new(game_id, user_id, state.session_queue_capacity);
    let client_id = client.id();
    client.queue(snapshot);
    state.hub.register(client);
    tracing::info!(%game_id, %user_id, %client_id, "session opened");

    let ctx = SessionContext {
        games: state.games.clone(),
        hub: state.hub.clone(),
        game_id,
        user_id,
        client_id,
    };
    let (sink, stream) = socket.split();
    let (stop, stopped) = oneshot::channel();
    let mut writer = tokio::spawn(write_frames(sink, outbound));
    let mut reader = tokio::spawn(read_frames(stream, ctx, stopped));

    tokio::select! {
        _ = &mut writer => {
            let _ = stop.send(());
            let _ = reader.await;
        }
        _ = &mut reader => {
            state.hub.unregister(game_id, client_id);
            let _ = writer.await;
        }
    }
    state.hub.unregister(game_id, client_id);
    tracing::info!(%game_id, %user_id, %client_id, "session closed");
}

/// Reads frames until the peer closes or `stop` fires. `stop` is only
/// observed while waiting for the next frame.
async fn read_frames<S, E>(mut stream: S, ctx: SessionContext, mut stop: oneshot::Receiver<()>)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = &mut stop => break,
            msg = stream.next() => msg,
        };
        let Some(msg) = msg else {
            break;
        };
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(client_id = %ctx.client_id, error = %e, "session read failed");
                break;
            }
        };
        match ClientFrame::parse(text.as_str()) {
            Some(ClientFrame::Move { uci }) => {
                if ctx.play(&uci).await.is_break() {
                    break;
                }
            }
            Some(ClientFrame::Unknown) | None => {
                tracing::debug!(client_id = %ctx.client_id, "ignoring frame");
            }
        }
    }
}

/// Drains the outbound queue. Once the hub drops the sender, writes a close
/// frame and returns.
async fn write_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::text(json)).await {
            tracing::debug!(error = %e, "session write failed");
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::stream;

    use super::*;
    use crate::domain::NewUser;
    use crate::persistence::{MemoryStore, UserStore};

    async fn player(store: &MemoryStore, name: &str) -> UserId {
        let Ok(user) = store
            .insert_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: "hash".into(),
            })
            .await
        else {
            panic!("user insert failed");
        };
        user.id
    }

    #[tokio::test]
    async fn stop_lands_after_the_pending_commit() {
        let store = MemoryStore::new();
        let white = player(&store, "white").await;
        let black = player(&store, "black").await;
        let games = GameService::new(Arc::new(store.clone()));
        let Ok(game) = games.create_game(white, 600).await else {
            panic!("create failed");
        };
        let Ok(_) = games.join_game(game.id, black).await else {
            panic!("join failed");
        };

        let hub = SessionHub::spawn();
        let (watcher, mut frames) = SessionClient::new(game.id, black, 8);
        hub.register(watcher);

        let ctx = SessionContext {
            games,
            hub: hub.clone(),
            game_id: game.id,
            user_id: white,
            client_id: ClientId::new(),
        };
        let incoming = stream::iter(vec![Ok::<_, Infallible>(Message::text(
            r#"{"type":"move","uci":"e2e4"}"#,
        ))])
        .chain(stream::pending());
        let (stop, stopped) = oneshot::channel();
        let reader = tokio::spawn(read_frames(incoming, ctx, stopped));

        let Ok(Some(frame)) = tokio::time::timeout(Duration::from_secs(5), frames.recv()).await
        else {
            panic!("move was not broadcast");
        };
        assert!(matches!(frame, ServerFrame::Move { .. }));

        let _ = stop.send(());
        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(5), reader).await else {
            panic!("reader did not stop");
        };
        assert_eq!(store.move_count(game.id).await, 1);
    }

    #[tokio::test]
    async fn dropped_stop_signal_ends_the_reader() {
        let store = MemoryStore::new();
        let white = player(&store, "solo").await;
        let ctx = SessionContext {
            games: GameService::new(Arc::new(store)),
            hub: SessionHub::spawn(),
            game_id: GameId::new(1),
            user_id: white,
            client_id: ClientId::new(),
        };
        let (stop, stopped) = oneshot::channel::<()>();
        drop(stop);
        let incoming = stream::pending::<Result<Message, Infallible>>();
        let reader = tokio::spawn(read_frames(incoming, ctx, stopped));
        let Ok(Ok(())) = tokio::time::timeout(Duration::from_secs(5), reader).await else {
            panic!("reader did not stop");
        };
    }
}
