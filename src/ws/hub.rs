//! Session hub: the process-wide registry of live game subscriptions.
//!
//! A single task owns every mutation of the registry. Handles post
//! [`HubCommand`]s over an unbounded channel, so commands from one session
//! are applied in the order they were sent. Fan-out never blocks: a client
//! whose outbound queue is full is evicted, which drops the hub's sender
//! and lets that client's writer flush and close.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, oneshot};

use super::messages::ServerFrame;
use crate::domain::{ClientId, GameId, UserId};

/// Default per-client outbound capacity, in frames.
pub const DEFAULT_CLIENT_CAPACITY: usize = 256;

type Registry = HashMap<GameId, HashMap<ClientId, SessionClient>>;

/// One live duplex session bound to a game and a user.
///
/// Not `Clone`: once registered, the hub holds the only
/// sender, so removing the client from the registry closes its queue.
#[derive(Debug)]
pub struct SessionClient {
    id: ClientId,
    game_id: GameId,
    user_id: UserId,
    outbound: mpsc::Sender<ServerFrame>,
}

impl SessionClient {
    /// Creates a client and the receiving end of its bounded queue.
    #[must_use]
    pub fn new(
        game_id: GameId,
        user_id: UserId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: ClientId::new(),
            game_id,
            user_id,
            outbound,
        };
        (client, rx)
    }

    /// Client identifier.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Game this client follows.
    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Authenticated user behind the session.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Queues a frame without waiting. Returns `false` if the queue is full
    /// or closed.
    pub fn queue(&self, frame: ServerFrame) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

/// Mutations and queries serviced by the hub task.
#[derive(Debug)]
enum HubCommand {
    Register(SessionClient),
    Unregister {
        game_id: GameId,
        client_id: ClientId,
    },
    Broadcast {
        game_id: GameId,
        frame: ServerFrame,
    },
    SendTo {
        game_id: GameId,
        client_id: ClientId,
        frame: ServerFrame,
    },
    Flush(oneshot::Sender<()>),
}

/// Handle to the hub task. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHub {
    commands: mpsc::UnboundedSender<HubCommand>,
    registry: Arc<RwLock<Registry>>,
}

impl SessionHub {
    /// Spawns the hub task on the current runtime and returns a handle.
    ///
    /// The task exits once every handle has been dropped.
    #[must_use]
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let registry = Arc::new(RwLock::new(Registry::new()));
        tokio::spawn(run(rx, Arc::clone(&registry)));
        Self { commands, registry }
    }

    /// Adds a client to its game's subscriber set.
    pub fn register(&self, client: SessionClient) {
        self.post(HubCommand::Register(client));
    }

    /// Removes a client and closes its queue. Unknown clients are ignored.
    pub fn unregister(&self, game_id: GameId, client_id: ClientId) {
        self.post(HubCommand::Unregister { game_id, client_id });
    }

    /// Fans a frame out to every subscriber of `game_id`.
    pub fn broadcast(&self, game_id: GameId, frame: ServerFrame) {
        self.post(HubCommand::Broadcast { game_id, frame });
    }

    /// Delivers a frame to a single client.
    pub fn send_to(&self, game_id: GameId, client_id: ClientId, frame: ServerFrame) {
        self.post(HubCommand::SendTo {
            game_id,
            client_id,
            frame,
        });
    }

    /// Waits until every command posted before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.post(HubCommand::Flush(tx));
        let _ = rx.await;
    }

    /// Number of live subscribers of `game_id`, after pending commands.
    pub async fn subscriber_count(&self, game_id: GameId) -> usize {
        self.flush().await;
        self.registry
            .read()
            .await
            .get(&game_id)
            .map_or(0, HashMap::len)
    }

    fn post(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("session hub stopped, command dropped");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<HubCommand>, registry: Arc<RwLock<Registry>>) {
    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register(client) => {
                tracing::debug!(
                    game_id = %client.game_id,
                    user_id = %client.user_id,
                    client_id = %client.id,
                    "session registered"
                );
                registry
                    .write()
                    .await
                    .entry(client.game_id)
                    .or_default()
                    .insert(client.id, client);
            }
            HubCommand::Unregister { game_id, client_id } => {
                if remove(&registry, game_id, &[client_id]).await > 0 {
                    tracing::debug!(%game_id, %client_id, "session unregistered");
                }
            }
            HubCommand::Broadcast { game_id, frame } => {
                let targets: Vec<(ClientId, mpsc::Sender<ServerFrame>)> = registry
                    .read()
                    .await
                    .get(&game_id)
                    .map(|clients| {
                        clients
                            .values()
                            .map(|c| (c.id, c.outbound.clone()))
                            .collect()
                    })
                    .unwrap_or_default();

                let mut evicted = Vec::new();
                for (client_id, outbound) in targets {
                    if !deliver(&outbound, frame.clone(), game_id, client_id) {
                        evicted.push(client_id);
                    }
                }
                remove(&registry, game_id, &evicted).await;
            }
            HubCommand::SendTo {
                game_id,
                client_id,
                frame,
            } => {
                let outbound = registry
                    .read()
                    .await
                    .get(&game_id)
                    .and_then(|clients| clients.get(&client_id))
                    .map(|c| c.outbound.clone());
                if let Some(outbound) = outbound
                    && !deliver(&outbound, frame, game_id, client_id)
                {
                    remove(&registry, game_id, &[client_id]).await;
                }
            }
            HubCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("session hub stopped");
}

/// Non-blocking delivery. Returns `false` when the client must be evicted.
fn deliver(
    outbound: &mpsc::Sender<ServerFrame>,
    frame: ServerFrame,
    game_id: GameId,
    client_id: ClientId,
) -> bool {
    match outbound.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(%game_id, %client_id, "outbound queue full, evicting slow client");
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Removes clients from a game, dropping the game entry once empty.
async fn remove(registry: &RwLock<Registry>, game_id: GameId, clients: &[ClientId]) -> usize {
    if clients.is_empty() {
        return 0;
    }
    let mut registry = registry.write().await;
    let Some(set) = registry.get_mut(&game_id) else {
        return 0;
    };
    let mut removed = 0;
    for id in clients {
        if set.remove(id).is_some() {
            removed += 1;
        }
    }
    if set.is_empty() {
        registry.remove(&game_id);
    }
    removed
}
