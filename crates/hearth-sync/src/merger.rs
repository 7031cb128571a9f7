// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change-feed mergers: fold remote row events into local collections.
//!
//! Feed-side failures never reach the user. An event that cannot be decoded
//! or hydrated is logged at `warn` and dropped, and the merge loop keeps
//! running.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::{
    ChangeEvent, ChangeKind, ChangeStream, EntityId, Filter, HearthError, Message, Profile,
    Reaction, Record, RemoteStore, Table,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collection::{RemoteChange, SharedCollection};
use crate::reactions::{apply_added, apply_removed};

/// What happened to one feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The collection changed.
    Applied,
    /// The event was valid but already reflected locally.
    Unchanged,
    /// The event was logged and discarded.
    Dropped,
}

/// Something that consumes feed events for one table.
#[async_trait]
pub trait FeedHandler: Send + Sync + 'static {
    fn table(&self) -> Table;

    async fn handle_event(&self, event: ChangeEvent) -> MergeOutcome;
}

/// Fills fields an insert event's terse row lacks, with one remote read.
#[async_trait]
pub trait Hydrator<T>: Send + Sync {
    async fn hydrate(&self, entity: &mut T) -> Result<(), HearthError>;
}

/// Resolves a message's sender display name from the profiles table.
pub struct MessageHydrator {
    store: Arc<dyn RemoteStore>,
}

impl MessageHydrator {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Hydrator<Message> for MessageHydrator {
    async fn hydrate(&self, message: &mut Message) -> Result<(), HearthError> {
        if message.sender_name.is_some() {
            return Ok(());
        }
        let rows = self
            .store
            .query(
                Table::Profiles,
                &Filter::eq("id", message.user_id.as_str()),
                None,
            )
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| HearthError::NotFound {
            table: Table::Profiles,
            id: message.user_id.clone(),
        })?;
        message.sender_name = Profile::decode(row)?.display_name;
        Ok(())
    }
}

/// Merges one table's feed into an [`EntityCollection`](crate::EntityCollection).
pub struct ChangeFeedMerger<T: Record> {
    collection: SharedCollection<T>,
    hydrator: Option<Arc<dyn Hydrator<T>>>,
}

impl<T: Record> ChangeFeedMerger<T> {
    pub fn new(collection: SharedCollection<T>) -> Self {
        Self {
            collection,
            hydrator: None,
        }
    }

    /// Hydrates every insert event before it is merged.
    pub fn with_hydrator(mut self, hydrator: Arc<dyn Hydrator<T>>) -> Self {
        self.hydrator = Some(hydrator);
        self
    }

    async fn to_change(&self, event: ChangeEvent) -> Result<RemoteChange<T>, HearthError> {
        match event.kind {
            ChangeKind::Delete => event
                .row_id()
                .map(RemoteChange::Delete)
                .ok_or_else(|| HearthError::Internal("delete event without id".into())),
            ChangeKind::Update => T::decode(event.row).map(RemoteChange::Update),
            ChangeKind::Insert => {
                let mut entity = T::decode(event.row)?;
                if let Some(hydrator) = &self.hydrator {
                    // A row the collection already holds (our own write, or a
                    // replayed event) keeps its derived fields through
                    // `carry_derived`, so the extra read is skipped.
                    let known = self.collection.lock().await.contains(entity.id());
                    if !known {
                        hydrator.hydrate(&mut entity).await?;
                    }
                }
                Ok(RemoteChange::Insert(entity))
            }
        }
    }
}

#[async_trait]
impl<T: Record> FeedHandler for ChangeFeedMerger<T> {
    fn table(&self) -> Table {
        T::TABLE
    }

    async fn handle_event(&self, event: ChangeEvent) -> MergeOutcome {
        if event.table != T::TABLE {
            warn!(expected = %T::TABLE, got = %event.table, "dropping event for another table");
            return MergeOutcome::Dropped;
        }
        let kind = event.kind;
        let change = match self.to_change(event).await {
            Ok(change) => change,
            Err(e) => {
                warn!(table = %T::TABLE, %kind, error = %e, "dropping change event");
                return MergeOutcome::Dropped;
            }
        };

        if self.collection.lock().await.apply_remote(change) {
            debug!(table = %T::TABLE, %kind, "change event merged");
            MergeOutcome::Applied
        } else {
            MergeOutcome::Unchanged
        }
    }
}

/// Merges `message_reactions` events into the owning message's reaction set.
pub struct ReactionFeedMerger {
    messages: SharedCollection<Message>,
}

impl ReactionFeedMerger {
    pub fn new(messages: SharedCollection<Message>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl FeedHandler for ReactionFeedMerger {
    fn table(&self) -> Table {
        Table::MessageReactions
    }

    async fn handle_event(&self, event: ChangeEvent) -> MergeOutcome {
        if event.table != Table::MessageReactions {
            warn!(got = %event.table, "dropping non-reaction event");
            return MergeOutcome::Dropped;
        }

        let mut messages = self.messages.lock().await;
        let changed = match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let reaction = match Reaction::decode(event.row) {
                    Ok(reaction) => reaction,
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable reaction event");
                        return MergeOutcome::Dropped;
                    }
                };
                let message_id = reaction.message_id.clone();
                if !messages.contains(&message_id) {
                    warn!(message_id = %message_id, "dropping reaction for unknown message");
                    return MergeOutcome::Dropped;
                }
                messages.modify(&message_id, |m| {
                    apply_added(&mut m.reactions, reaction);
                })
            }
            ChangeKind::Delete => {
                let Some(reaction_id) = event.row_id() else {
                    warn!("dropping reaction delete without id");
                    return MergeOutcome::Dropped;
                };
                match owning_message(&messages, &reaction_id) {
                    Some(message_id) => messages.modify(&message_id, |m| {
                        apply_removed(&mut m.reactions, &reaction_id);
                    }),
                    None => false,
                }
            }
        };

        if changed {
            MergeOutcome::Applied
        } else {
            MergeOutcome::Unchanged
        }
    }
}

fn owning_message(
    messages: &crate::EntityCollection<Message>,
    reaction_id: &EntityId,
) -> Option<EntityId> {
    messages
        .find(|m| m.reactions.iter().any(|r| &r.id == reaction_id))
        .map(|m| m.id.clone())
}

/// Drives `handler` with `stream` until the feed ends or `cancel` fires.
///
/// Events are handled one at a time, in arrival order.
pub async fn run_feed(
    handler: Arc<dyn FeedHandler>,
    mut stream: ChangeStream,
    cancel: CancellationToken,
) {
    let table = handler.table();
    debug!(%table, "change feed started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%table, "change feed cancelled");
                break;
            }
            next = stream.next() => match next {
                Some(event) => {
                    handler.handle_event(event).await;
                }
                None => {
                    debug!(%table, "change feed ended");
                    break;
                }
            }
        }
    }
}
