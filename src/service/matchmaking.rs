//! Rating-band matchmaking with time-based band widening.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::GameService;
use crate::domain::{DEFAULT_TIME_BUDGET_SECS, GameView, UserId};
use crate::error::ServerError;

/// Pairing thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// Maximum rating gap accepted for a fresh entry.
    pub base_band: u32,
    /// Maximum rating gap once an entry has waited longer than `widen_after`.
    pub widened_band: u32,
    /// Wait after which the widened band applies.
    pub widen_after: Duration,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            base_band: 100,
            widened_band: 200,
            widen_after: Duration::from_secs(30),
        }
    }
}

impl MatchPolicy {
    /// Band applicable to an entry that has waited `waited`.
    #[must_use]
    pub fn band_for(&self, waited: Duration) -> u32 {
        if waited > self.widen_after {
            self.widened_band
        } else {
            self.base_band
        }
    }
}

/// Result of [`MatchmakingQueue::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A game was created and both players seated.
    Paired(GameView),
    /// The caller is queued at this 1-based position.
    Waiting {
        /// 1-based queue position.
        position: usize,
    },
}

#[derive(Debug, Clone)]
struct QueueEntry {
    user_id: UserId,
    rating: i32,
    entered_at: Instant,
}

/// Arrival-ordered waiting room.
///
/// One mutex guards the queue and is held across the create-and-join of a
/// pairing, so pairings are serialized and a removed entry is never paired
/// twice.
#[derive(Debug)]
pub struct MatchmakingQueue {
    games: GameService,
    policy: MatchPolicy,
    queue: Mutex<VecDeque<QueueEntry>>,
}

impl MatchmakingQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(games: GameService, policy: MatchPolicy) -> Self {
        Self {
            games,
            policy,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `user` with `rating`, or pairs them with the first waiting
    /// player inside the band. The waiting player takes white.
    ///
    /// Re-enqueueing an already queued user only refreshes the stored rating
    /// and reports the current position.
    ///
    /// # Errors
    ///
    /// Propagates storage failures from game creation. The partner entry is
    /// already removed at that point and is not re-queued.
    pub async fn enqueue(&self, user: UserId, rating: i32) -> Result<EnqueueOutcome, ServerError> {
        let mut queue = self.queue.lock().await;

        if let Some(idx) = queue.iter().position(|e| e.user_id == user) {
            if let Some(entry) = queue.get_mut(idx) {
                entry.rating = rating;
            }
            tracing::debug!(
                user_id = %user,
                rating,
                position = idx + 1,
                "matchmaking rating refreshed"
            );
            return Ok(EnqueueOutcome::Waiting { position: idx + 1 });
        }

        let now = Instant::now();
        let partner = queue.iter().position(|e| {
            rating.abs_diff(e.rating) <= self.policy.band_for(now.duration_since(e.entered_at))
        });

        let Some(entry) = partner.and_then(|idx| queue.remove(idx)) else {
            queue.push_back(QueueEntry {
                user_id: user,
                rating,
                entered_at: now,
            });
            let position = queue.len();
            tracing::debug!(user_id = %user, rating, position, "queued for matchmaking");
            return Ok(EnqueueOutcome::Waiting { position });
        };

        let (white, black) = (entry.user_id, user);
        let game = self.games.create_game(white, DEFAULT_TIME_BUDGET_SECS).await?;
        self.games.join_game(game.id, black).await?;
        let view = self.games.get_game(game.id).await?;
        drop(queue);

        tracing::info!(
            game_id = %view.game.id,
            white = %white,
            black = %black,
            "matchmaking paired players"
        );
        Ok(EnqueueOutcome::Paired(view))
    }

    /// Removes `user` from the queue. Returns whether an entry was removed.
    pub async fn dequeue(&self, user: UserId) -> bool {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|e| e.user_id != user);
        let removed = queue.len() != before;
        if removed {
            tracing::debug!(user_id = %user, "left matchmaking queue");
        }
        removed
    }

    /// Returns the 1-based queue position of `user`, if queued.
    pub async fn position(&self, user: UserId) -> Option<usize> {
        self.queue
            .lock()
            .await
            .iter()
            .position(|e| e.user_id == user)
            .map(|idx| idx + 1)
    }

    /// Number of waiting players.
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Returns `true` when nobody is waiting.
    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}
