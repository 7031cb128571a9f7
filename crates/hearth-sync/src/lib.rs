// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic local-state sync engine for Hearth households.
//!
//! User actions enter a [`MutationCoordinator`], which changes the matching
//! [`EntityCollection`] immediately, writes to the remote store, and then
//! reconciles or reverts. Change-feed mergers fold events from other clients
//! into the same collections. Reaction counts, recurring chore follow-ups,
//! and typing indicators are derived on top.
//!
//! [`HouseholdSession`] ties these together for one open household.

pub mod collection;
pub mod coordinator;
pub mod merger;
pub mod reactions;
pub mod recurrence;
pub mod session;
pub mod typing;

pub use collection::{EntityCollection, OptimisticHandle, RemoteChange, SharedCollection};
pub use coordinator::{
    MutationCoordinator, MutationKind, MutationState, PendingMutation, PendingStatus,
};
pub use merger::{
    ChangeFeedMerger, FeedHandler, Hydrator, MergeOutcome, MessageHydrator, ReactionFeedMerger,
    run_feed,
};
pub use reactions::{ReactionAggregator, ReactionSummary, ToggleAction};
pub use session::{Attachment, HouseholdSession, Identity, NewChore, SubscriptionHandle};
pub use typing::{Typer, TypingBroadcaster, TypingPayload, TypingTracker};
