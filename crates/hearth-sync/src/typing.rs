// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral "is typing" indicators.
//!
//! Each remote actor owns at most one expiry timer. A refresh aborts the
//! running timer and schedules a new one, and a timer only removes the entry
//! it was scheduled for (matched by generation). A late wake-up from an
//! aborted timer therefore cannot remove a refreshed indicator.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use hearth_core::EntityId;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Broadcast event name for typing signals.
pub const TYPING_EVENT: &str = "typing";

/// Broadcast channel carrying typing signals for a household.
pub fn typing_channel(household_id: &EntityId) -> String {
    format!("typing:{household_id}")
}

/// Wire payload of a typing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: EntityId,
    pub display_name: String,
}

/// Someone currently typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typer {
    pub actor_id: EntityId,
    pub display_name: String,
}

struct TypingEntry {
    display_name: String,
    expires_at: Instant,
    generation: u64,
    timer: AbortHandle,
}

#[derive(Default)]
struct TrackerState {
    entries: HashMap<EntityId, TypingEntry>,
    next_generation: u64,
}

struct Shared {
    state: Mutex<TrackerState>,
    revision: watch::Sender<u64>,
}

impl Shared {
    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// The live set of remote typers for one conversation.
pub struct TypingTracker {
    local_actor: EntityId,
    expiry: Duration,
    shared: Arc<Shared>,
}

impl TypingTracker {
    pub fn new(local_actor: EntityId, expiry: Duration) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            local_actor,
            expiry,
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState::default()),
                revision,
            }),
        }
    }

    /// Adds or refreshes `actor`'s indicator for another expiry window.
    ///
    /// Signals from the local actor are ignored.
    pub async fn on_signal(&self, actor: EntityId, display_name: String) {
        if actor == self.local_actor {
            return;
        }

        let mut state = self.shared.state.lock().await;
        state.next_generation += 1;
        let generation = state.next_generation;
        let expires_at = Instant::now() + self.expiry;
        let timer = spawn_expiry(
            Arc::downgrade(&self.shared),
            actor.clone(),
            generation,
            expires_at,
        );

        let visible_change = match state.entries.get(&actor) {
            Some(previous) => {
                previous.timer.abort();
                previous.display_name != display_name
            }
            None => true,
        };
        trace!(actor = %actor, generation, "typing signal");
        state.entries.insert(
            actor,
            TypingEntry {
                display_name,
                expires_at,
                generation,
                timer,
            },
        );
        drop(state);

        if visible_change {
            self.shared.notify();
        }
    }

    /// Remote actors whose indicator has not expired, ordered by name.
    pub async fn current_typers(&self) -> Vec<Typer> {
        let now = Instant::now();
        let state = self.shared.state.lock().await;
        let mut typers: Vec<Typer> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(actor, entry)| Typer {
                actor_id: actor.clone(),
                display_name: entry.display_name.clone(),
            })
            .collect();
        typers.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.actor_id.cmp(&b.actor_id))
        });
        typers
    }

    /// Observes the change counter of the typer set.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    /// Cancels every timer and forgets every indicator.
    pub async fn clear(&self) {
        let mut state = self.shared.state.lock().await;
        if state.entries.is_empty() {
            return;
        }
        for (_, entry) in state.entries.drain() {
            entry.timer.abort();
        }
        drop(state);
        self.shared.notify();
        debug!("typing indicators cleared");
    }

    /// Number of live timers. Equals the number of tracked actors.
    pub async fn timer_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .await
            .entries
            .values()
            .filter(|entry| !entry.timer.is_finished())
            .count()
    }
}

fn spawn_expiry(
    shared: Weak<Shared>,
    actor: EntityId,
    generation: u64,
    expires_at: Instant,
) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep_until(expires_at).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut state = shared.state.lock().await;
        let current = state
            .entries
            .get(&actor)
            .is_some_and(|entry| entry.generation == generation);
        if current {
            state.entries.remove(&actor);
            drop(state);
            shared.notify();
            trace!(actor = %actor, "typing indicator expired");
        }
    })
    .abort_handle()
}

/// Sender-side debounce: at most one outbound signal per interval.
#[derive(Debug)]
pub struct TypingBroadcaster {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl TypingBroadcaster {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    /// Records a keystroke; returns whether a signal should go out now.
    pub fn should_send(&mut self) -> bool {
        let now = Instant::now();
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const EXPIRY: Duration = Duration::from_secs(3);

    fn tracker() -> TypingTracker {
        TypingTracker::new("me".into(), EXPIRY)
    }

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signal_expires_after_window() {
        let tracker = tracker();
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        assert_eq!(tracker.current_typers().await.len(), 1);

        advance(Duration::from_millis(2_999)).await;
        assert_eq!(tracker.current_typers().await.len(), 1);

        advance(Duration::from_millis(2)).await;
        settle().await;
        assert!(tracker.current_typers().await.is_empty());
        assert_eq!(tracker.timer_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_window_without_stacking_timers() {
        let tracker = tracker();
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        advance(Duration::from_secs(2)).await;
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        assert_eq!(tracker.timer_count().await, 1);

        // Past the original boundary: still present.
        advance(Duration::from_millis(1_500)).await;
        settle().await;
        assert_eq!(tracker.current_typers().await.len(), 1);

        advance(Duration::from_millis(1_600)).await;
        settle().await;
        assert!(tracker.current_typers().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn actors_expire_independently() {
        let tracker = tracker();
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        advance(Duration::from_secs(2)).await;
        tracker.on_signal("u-2".into(), "Bo".into()).await;

        advance(Duration::from_millis(1_500)).await;
        settle().await;
        let typers = tracker.current_typers().await;
        assert_eq!(typers.len(), 1);
        assert_eq!(typers[0].display_name, "Bo");
    }

    #[tokio::test(start_paused = true)]
    async fn local_actor_is_excluded() {
        let tracker = tracker();
        tracker.on_signal("me".into(), "Me".into()).await;
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        let typers = tracker.current_typers().await;
        assert_eq!(
            typers,
            vec![Typer {
                actor_id: "u-1".into(),
                display_name: "Ada".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_timers_and_notifies() {
        let tracker = tracker();
        let rx = tracker.subscribe();
        tracker.on_signal("u-1".into(), "Ada".into()).await;
        tracker.on_signal("u-2".into(), "Bo".into()).await;

        tracker.clear().await;
        assert!(rx.has_changed().unwrap());
        assert!(tracker.current_typers().await.is_empty());
        assert_eq!(tracker.timer_count().await, 0);

        advance(EXPIRY * 2).await;
        settle().await;
        assert!(tracker.current_typers().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcaster_debounces_within_interval() {
        let mut broadcaster = TypingBroadcaster::new(Duration::from_secs(2));
        assert!(broadcaster.should_send());
        advance(Duration::from_millis(500)).await;
        assert!(!broadcaster.should_send());
        advance(Duration::from_millis(1_499)).await;
        assert!(!broadcaster.should_send());
        advance(Duration::from_millis(1)).await;
        assert!(broadcaster.should_send());
    }

    #[test]
    fn channel_name_is_scoped_to_household() {
        assert_eq!(typing_channel(&"h-1".into()), "typing:h-1");
    }
}
