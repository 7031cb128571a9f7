// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-household session: the state a client holds while a household is open.
//!
//! A [`HouseholdSession`] owns the three collections (messages, chores,
//! templates), their mutation coordinators, the feed subscriptions that keep
//! them in sync, and the typing tracker. It is created by [`HouseholdSession::open`]
//! and torn down by [`HouseholdSession::close`] (or on drop); nothing about
//! it is global.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use hearth_config::HearthConfig;
use hearth_core::{
    AttachmentUploader, BroadcastStream, ChangeKind, ChangeStream, Chore, ChoreStatus,
    ChoreTemplate, EntityId, Filter, HearthError, Message, Order, Profile, Reaction, Record,
    RecurrenceRule, RemoteStore, Table,
};
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collection::{EntityCollection, SharedCollection};
use crate::coordinator::{MutationCoordinator, bounded};
use crate::merger::{
    ChangeFeedMerger, FeedHandler, MessageHydrator, ReactionFeedMerger, run_feed,
};
use crate::reactions::{ReactionAggregator, ToggleAction, apply_added, apply_removed};
use crate::recurrence;
use crate::typing::{
    TYPING_EVENT, Typer, TypingBroadcaster, TypingPayload, TypingTracker, typing_channel,
};

/// The signed-in user, as resolved by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: EntityId,
    pub display_name: String,
}

/// A file to upload alongside a message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Original file name; only its extension is kept.
    pub file_name: String,
}

/// Input of [`HouseholdSession::assign_task`].
#[derive(Debug, Clone, Default)]
pub struct NewChore {
    pub title: String,
    pub assignee: Option<EntityId>,
    pub template_id: Option<EntityId>,
    pub due_date: Option<NaiveDate>,
    pub recurrence: Option<RecurrenceRule>,
}

/// A running subscription owned by the session, disposable on its own.
pub struct SubscriptionHandle {
    name: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    fn spawn(
        name: impl Into<String>,
        cancel: CancellationToken,
        task: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            cancel,
            task: tokio::spawn(task),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels the subscription and waits for its task to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            warn!(subscription = %self.name, "subscription task panicked");
        }
    }
}

type ReactionKey = (EntityId, String);

/// Marks one (message, kind) toggle as in flight until dropped.
struct ToggleClaim<'a> {
    in_flight: &'a std::sync::Mutex<HashSet<ReactionKey>>,
    key: ReactionKey,
}

impl<'a> ToggleClaim<'a> {
    fn acquire(
        in_flight: &'a std::sync::Mutex<HashSet<ReactionKey>>,
        message_id: &EntityId,
        kind: &str,
    ) -> Result<Self, HearthError> {
        let key = (message_id.clone(), kind.to_string());
        let mut claimed = in_flight
            .lock()
            .map_err(|_| HearthError::Internal("reaction claim lock poisoned".into()))?;
        if !claimed.insert(key.clone()) {
            return Err(HearthError::Validation(format!(
                "reaction `{kind}` on {message_id} is already being updated"
            )));
        }
        Ok(Self { in_flight, key })
    }
}

impl Drop for ToggleClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut claimed) = self.in_flight.lock() {
            claimed.remove(&self.key);
        }
    }
}

/// Streams opened before the initial load, so nothing committed in between is missed.
struct OpenFeeds {
    messages: ChangeStream,
    reactions: ChangeStream,
    chores: ChangeStream,
    templates: ChangeStream,
    typing: BroadcastStream,
}

pub struct HouseholdSession {
    household_id: EntityId,
    identity: Identity,
    store: Arc<dyn RemoteStore>,
    uploader: Arc<dyn AttachmentUploader>,
    config: HearthConfig,
    messages: MutationCoordinator<Message>,
    chores: MutationCoordinator<Chore>,
    templates: MutationCoordinator<ChoreTemplate>,
    typing: Arc<TypingTracker>,
    broadcaster: Mutex<TypingBroadcaster>,
    cancel: CancellationToken,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    reactions_in_flight: std::sync::Mutex<HashSet<ReactionKey>>,
}

impl HouseholdSession {
    /// Loads the household's state and starts its feed subscriptions.
    pub async fn open(
        household_id: EntityId,
        identity: Identity,
        store: Arc<dyn RemoteStore>,
        uploader: Arc<dyn AttachmentUploader>,
        config: HearthConfig,
    ) -> Result<Self, HearthError> {
        let messages = EntityCollection::<Message>::shared();
        let chores = EntityCollection::<Chore>::shared();
        let templates = EntityCollection::<ChoreTemplate>::shared();

        let session = Self {
            messages: MutationCoordinator::new(messages, store.clone(), &config.sync),
            chores: MutationCoordinator::new(chores, store.clone(), &config.sync),
            templates: MutationCoordinator::new(templates, store.clone(), &config.sync),
            typing: Arc::new(TypingTracker::new(
                identity.id.clone(),
                config.typing.expiry(),
            )),
            broadcaster: Mutex::new(TypingBroadcaster::new(config.typing.debounce())),
            cancel: CancellationToken::new(),
            subscriptions: Mutex::new(Vec::new()),
            reactions_in_flight: std::sync::Mutex::new(HashSet::new()),
            household_id,
            identity,
            store,
            uploader,
            config,
        };

        let feeds = session.open_feeds().await?;
        session.load().await?;
        session.start_feeds(feeds).await;

        let message_count = session.messages().lock().await.len();
        let chore_count = session.chores().lock().await.len();
        let template_count = session.templates().lock().await.len();
        info!(
            household = %session.household_id,
            user = %session.identity.id,
            messages = message_count,
            chores = chore_count,
            templates = template_count,
            "household session opened"
        );
        Ok(session)
    }

    pub fn household_id(&self) -> &EntityId {
        &self.household_id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn messages(&self) -> &SharedCollection<Message> {
        self.messages.collection()
    }

    pub fn chores(&self) -> &SharedCollection<Chore> {
        self.chores.collection()
    }

    pub fn templates(&self) -> &SharedCollection<ChoreTemplate> {
        self.templates.collection()
    }

    /// Who else is typing right now.
    pub async fn typers(&self) -> Vec<Typer> {
        self.typing.current_typers().await
    }

    pub fn watch_typers(&self) -> watch::Receiver<u64> {
        self.typing.subscribe()
    }

    /// Names of subscriptions that are still running.
    pub async fn active_subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .filter(|handle| handle.is_active())
            .map(|handle| handle.name().to_string())
            .collect()
    }

    /// Stops one subscription by name. Returns whether it existed.
    pub async fn unsubscribe(&self, name: &str) -> bool {
        let handle = {
            let mut subscriptions = self.subscriptions.lock().await;
            let Some(pos) = subscriptions.iter().position(|h| h.name() == name) else {
                return false;
            };
            subscriptions.remove(pos)
        };
        handle.shutdown().await;
        debug!(subscription = name, "unsubscribed");
        true
    }

    /// Sends a message, uploading its attachment first.
    ///
    /// A failed upload returns [`HearthError::Upload`] and no message is
    /// created. A failed insert removes the optimistic message again; the
    /// caller keeps its draft.
    pub async fn send_message(
        &self,
        content: &str,
        attachment: Option<Attachment>,
    ) -> Result<Message, HearthError> {
        let content = content.trim();
        if content.is_empty() && attachment.is_none() {
            return Err(HearthError::Validation(
                "message must have text or an attachment".into(),
            ));
        }

        let attachment_url = match attachment {
            Some(attachment) => Some(self.upload(attachment).await?),
            None => None,
        };

        let optimistic = Message {
            id: EntityId::generate(),
            household_id: self.household_id.clone(),
            user_id: self.identity.id.clone(),
            content: content.to_string(),
            attachment_url,
            created_at: Utc::now(),
            sender_name: Some(self.identity.display_name.clone()),
            reactions: Vec::new(),
        };
        self.messages.create(optimistic).await
    }

    /// Adds the user's reaction of `kind`, or removes it if already present.
    ///
    /// The local reaction set changes only after the remote call succeeds.
    /// A second toggle of the same kind on the same message while the first
    /// is still in flight is rejected with [`HearthError::Validation`].
    pub async fn toggle_reaction(
        &self,
        message_id: &EntityId,
        kind: &str,
    ) -> Result<(), HearthError> {
        if !self.config.reactions.allowed.iter().any(|k| k == kind) {
            return Err(HearthError::Validation(format!(
                "unsupported reaction `{kind}`"
            )));
        }

        let _claim = ToggleClaim::acquire(&self.reactions_in_flight, message_id, kind)?;
        let action = {
            let messages = self.messages().lock().await;
            let message = messages.get(message_id).ok_or_else(|| HearthError::NotFound {
                table: Table::Messages,
                id: message_id.clone(),
            })?;
            if messages.is_pending(message_id) {
                return Err(HearthError::Validation("message is still being sent".into()));
            }
            ReactionAggregator::new(&message.reactions).plan_toggle(&self.identity.id, kind)
        };

        let timeout = self.config.sync.write_timeout();
        match action {
            ToggleAction::Add => {
                let row = json!({
                    "message_id": message_id,
                    "user_id": self.identity.id,
                    "emoji": kind,
                });
                let stored = bounded(timeout, self.store.insert(Table::MessageReactions, row))
                    .await?;
                let reaction = Reaction::decode(stored)?;
                self.messages().lock().await.modify(message_id, |m| {
                    apply_added(&mut m.reactions, reaction);
                });
            }
            ToggleAction::Remove(reaction_id) => {
                bounded(
                    timeout,
                    self.store.delete(Table::MessageReactions, &reaction_id),
                )
                .await?;
                self.messages().lock().await.modify(message_id, |m| {
                    apply_removed(&mut m.reactions, &reaction_id);
                });
            }
        }
        Ok(())
    }

    /// Creates a chore for a household member.
    pub async fn assign_task(&self, new: NewChore) -> Result<Chore, HearthError> {
        let chore = Chore {
            id: EntityId::generate(),
            household_id: self.household_id.clone(),
            title: new.title.trim().to_string(),
            assigned_to: new.assignee,
            template_id: new.template_id,
            due_date: new.due_date,
            status: ChoreStatus::Pending,
            recurrence: new.recurrence,
            created_at: Utc::now(),
        };
        self.chores.create(chore).await
    }

    /// Flips a chore between pending and completed.
    ///
    /// Completing a recurring chore also creates its next occurrence. If that
    /// follow-up fails, the completion stands and the follow-up error is
    /// returned.
    pub async fn toggle_chore_status(&self, id: &EntityId) -> Result<Chore, HearthError> {
        let updated = self
            .chores
            .update(id, |chore| chore.status = chore.status.toggled())
            .await?;

        if let Some(next) = recurrence::expand(&updated) {
            let next = self.chores.create(next).await?;
            info!(
                chore = %updated.id,
                follow_up = %next.id,
                due = ?next.due_date,
                "recurring chore scheduled"
            );
        }
        Ok(updated)
    }

    pub async fn delete_chore(&self, id: &EntityId) -> Result<Chore, HearthError> {
        self.chores.remove(id).await
    }

    pub async fn add_template(
        &self,
        title: &str,
        recurrence: Option<RecurrenceRule>,
    ) -> Result<ChoreTemplate, HearthError> {
        let template = ChoreTemplate {
            id: EntityId::generate(),
            household_id: self.household_id.clone(),
            title: title.trim().to_string(),
            recurrence,
            created_at: Utc::now(),
        };
        self.templates.create(template).await
    }

    pub async fn delete_template(&self, id: &EntityId) -> Result<ChoreTemplate, HearthError> {
        self.templates.remove(id).await
    }

    /// Records a keystroke; broadcasts a typing signal at most once per
    /// debounce interval. Returns whether a signal was sent.
    pub async fn notify_typing(&self) -> Result<bool, HearthError> {
        if !self.broadcaster.lock().await.should_send() {
            return Ok(false);
        }
        let payload = TypingPayload {
            user_id: self.identity.id.clone(),
            display_name: self.identity.display_name.clone(),
        };
        let payload = serde_json::to_value(payload)
            .map_err(|e| HearthError::Internal(format!("typing payload: {e}")))?;
        self.store
            .broadcast(&typing_channel(&self.household_id), TYPING_EVENT, payload)
            .await?;
        Ok(true)
    }

    /// Stops every subscription and clears typing timers. Idempotent.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.subscriptions.lock().await);
        for handle in handles {
            handle.shutdown().await;
        }
        self.typing.clear().await;
        info!(household = %self.household_id, "household session closed");
    }

    async fn upload(&self, attachment: Attachment) -> Result<String, HearthError> {
        let extension = Path::new(&attachment.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let path = format!(
            "{}/{}.{extension}",
            self.household_id,
            uuid::Uuid::new_v4()
        );
        let url = self
            .uploader
            .upload(&path, attachment.bytes, &attachment.content_type)
            .await
            .map_err(|e| match e {
                HearthError::Upload { .. } => e,
                other => HearthError::Upload {
                    message: other.to_string(),
                    source: Some(Box::new(other)),
                },
            })?;
        debug!(%path, "attachment uploaded");
        Ok(url)
    }

    async fn open_feeds(&self) -> Result<OpenFeeds, HearthError> {
        let household = Filter::eq("household_id", self.household_id.as_str());
        Ok(OpenFeeds {
            messages: self
                .store
                .subscribe(Table::Messages, &household, &ChangeKind::ALL)
                .await?,
            // Reaction rows carry no household column; reactions for messages
            // outside this household are dropped by the merger.
            reactions: self
                .store
                .subscribe(Table::MessageReactions, &Filter::all(), &ChangeKind::ALL)
                .await?,
            chores: self
                .store
                .subscribe(Table::Chores, &household, &ChangeKind::ALL)
                .await?,
            templates: self
                .store
                .subscribe(Table::ChoreTemplates, &household, &ChangeKind::ALL)
                .await?,
            typing: self
                .store
                .subscribe_broadcast(&typing_channel(&self.household_id), TYPING_EVENT)
                .await?,
        })
    }

    async fn load(&self) -> Result<(), HearthError> {
        let household = Filter::eq("household_id", self.household_id.as_str());

        let mut messages: Vec<Message> = self
            .query_records(&household, &Order::asc("created_at"))
            .await?;
        self.hydrate_senders(&mut messages).await?;
        self.attach_reactions(&mut messages).await?;
        self.messages().lock().await.load(messages);

        let chores: Vec<Chore> = self
            .query_records(&household, &Order::asc("created_at"))
            .await?;
        self.chores().lock().await.load(chores);

        let templates: Vec<ChoreTemplate> =
            self.query_records(&household, &Order::asc("title")).await?;
        self.templates().lock().await.load(templates);
        Ok(())
    }

    /// Reads and decodes rows; undecodable rows are logged and skipped.
    async fn query_records<T: Record>(
        &self,
        filter: &Filter,
        order: &Order,
    ) -> Result<Vec<T>, HearthError> {
        let rows = self.store.query(T::TABLE, filter, Some(order)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match T::decode(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(table = %T::TABLE, error = %e, "skipping undecodable row");
                    None
                }
            })
            .collect())
    }

    /// Fills missing sender names with one batched profile read.
    async fn hydrate_senders(&self, messages: &mut [Message]) -> Result<(), HearthError> {
        let missing: BTreeSet<&str> = messages
            .iter()
            .filter(|m| m.sender_name.is_none())
            .map(|m| m.user_id.as_str())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let ids = missing.into_iter().map(Value::from).collect();
        let rows = self
            .store
            .query(Table::Profiles, &Filter::all().and_in("id", ids), None)
            .await?;
        let names: HashMap<EntityId, String> = rows
            .into_iter()
            .filter_map(|row| Profile::decode(row).ok())
            .filter_map(|p| p.display_name.map(|name| (p.id, name)))
            .collect();

        for message in messages.iter_mut().filter(|m| m.sender_name.is_none()) {
            message.sender_name = names.get(&message.user_id).cloned();
        }
        Ok(())
    }

    async fn attach_reactions(&self, messages: &mut [Message]) -> Result<(), HearthError> {
        if messages.is_empty() {
            return Ok(());
        }
        let ids = messages.iter().map(|m| Value::from(m.id.as_str())).collect();
        let rows = self
            .store
            .query(
                Table::MessageReactions,
                &Filter::all().and_in("message_id", ids),
                None,
            )
            .await?;

        let mut by_message: HashMap<EntityId, Vec<Reaction>> = HashMap::new();
        for row in rows {
            match Reaction::decode(row) {
                Ok(reaction) => by_message
                    .entry(reaction.message_id.clone())
                    .or_default()
                    .push(reaction),
                Err(e) => warn!(error = %e, "skipping undecodable reaction"),
            }
        }
        for message in messages.iter_mut() {
            for reaction in by_message.remove(&message.id).unwrap_or_default() {
                apply_added(&mut message.reactions, reaction);
            }
        }
        Ok(())
    }

    async fn start_feeds(&self, feeds: OpenFeeds) {
        let mut message_merger = ChangeFeedMerger::new(self.messages().clone());
        if self.config.sync.hydrate_inserts {
            message_merger =
                message_merger.with_hydrator(Arc::new(MessageHydrator::new(self.store.clone())));
        }

        let handlers: [(&str, Arc<dyn FeedHandler>, ChangeStream); 4] = [
            ("messages", Arc::new(message_merger), feeds.messages),
            (
                "message_reactions",
                Arc::new(ReactionFeedMerger::new(self.messages().clone())),
                feeds.reactions,
            ),
            (
                "chores",
                Arc::new(ChangeFeedMerger::new(self.chores().clone())),
                feeds.chores,
            ),
            (
                "chore_templates",
                Arc::new(ChangeFeedMerger::new(self.templates().clone())),
                feeds.templates,
            ),
        ];

        let mut subscriptions = self.subscriptions.lock().await;
        for (name, handler, stream) in handlers {
            let cancel = self.cancel.child_token();
            subscriptions.push(SubscriptionHandle::spawn(
                name,
                cancel.clone(),
                run_feed(handler, stream, cancel),
            ));
        }

        let cancel = self.cancel.child_token();
        subscriptions.push(SubscriptionHandle::spawn(
            "typing",
            cancel.clone(),
            run_typing(self.typing.clone(), feeds.typing, cancel),
        ));
    }
}

impl Drop for HouseholdSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Feeds received typing broadcasts into the tracker.
async fn run_typing(
    tracker: Arc<TypingTracker>,
    mut stream: BroadcastStream,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(payload) => match serde_json::from_value::<TypingPayload>(payload) {
                    Ok(signal) => tracker.on_signal(signal.user_id, signal.display_name).await,
                    Err(e) => warn!(error = %e, "dropping malformed typing signal"),
                },
                None => break,
            }
        }
    }
    debug!("typing subscription stopped");
}
