// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Derived view over a message's reaction set.
//!
//! Toggles are not predicted locally: [`ReactionAggregator::plan_toggle`]
//! decides between a remote insert and a remote delete, and the local set only
//! changes once the direct call or the change feed reports the outcome
//! through [`apply_added`] and [`apply_removed`].

use hearth_core::{EntityId, Reaction};

/// Read-only aggregation over one message's reactions.
#[derive(Debug, Clone, Copy)]
pub struct ReactionAggregator<'a> {
    reactions: &'a [Reaction],
}

/// What a toggle must ask the remote store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleAction {
    /// The actor has not reacted with this kind yet.
    Add,
    /// The actor's existing reaction with this id must be deleted.
    Remove(EntityId),
}

/// Per-kind summary for rendering a reaction chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    pub kind: String,
    pub count: usize,
    pub reacted_by_actor: bool,
}

impl<'a> ReactionAggregator<'a> {
    pub fn new(reactions: &'a [Reaction]) -> Self {
        Self { reactions }
    }

    pub fn count(&self, kind: &str) -> usize {
        self.reactions.iter().filter(|r| r.kind == kind).count()
    }

    pub fn has_actor_reacted(&self, actor: &EntityId, kind: &str) -> bool {
        self.find(actor, kind).is_some()
    }

    pub fn plan_toggle(&self, actor: &EntityId, kind: &str) -> ToggleAction {
        match self.find(actor, kind) {
            Some(existing) => ToggleAction::Remove(existing.id.clone()),
            None => ToggleAction::Add,
        }
    }

    /// One entry per kind, in the order each kind first appears.
    pub fn summarize(&self, actor: &EntityId) -> Vec<ReactionSummary> {
        let mut summary: Vec<ReactionSummary> = Vec::new();
        for reaction in self.reactions {
            let mine = &reaction.user_id == actor;
            match summary.iter_mut().find(|s| s.kind == reaction.kind) {
                Some(entry) => {
                    entry.count += 1;
                    entry.reacted_by_actor |= mine;
                }
                None => summary.push(ReactionSummary {
                    kind: reaction.kind.clone(),
                    count: 1,
                    reacted_by_actor: mine,
                }),
            }
        }
        summary
    }

    fn find(&self, actor: &EntityId, kind: &str) -> Option<&'a Reaction> {
        self.reactions
            .iter()
            .find(|r| &r.user_id == actor && r.kind == kind)
    }
}

/// Adds a confirmed reaction, keeping at most one per (actor, kind).
///
/// A reaction already present by id is left alone; one from the same actor
/// and kind under another id is replaced. Returns whether the set changed.
pub fn apply_added(reactions: &mut Vec<Reaction>, added: Reaction) -> bool {
    if reactions.iter().any(|r| r.id == added.id) {
        return false;
    }
    reactions.retain(|r| !(r.user_id == added.user_id && r.kind == added.kind));
    reactions.push(added);
    true
}

/// Removes the reaction with `id`. Returns whether it was present.
pub fn apply_removed(reactions: &mut Vec<Reaction>, id: &EntityId) -> bool {
    let before = reactions.len();
    reactions.retain(|r| &r.id != id);
    reactions.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::DEFAULT_REACTION;

    fn reaction(id: &str, user: &str, kind: &str) -> Reaction {
        Reaction {
            id: id.into(),
            message_id: "m-1".into(),
            user_id: user.into(),
            kind: kind.into(),
        }
    }

    #[test]
    fn counts_and_actor_lookup() {
        let reactions = vec![
            reaction("r-1", "u-1", DEFAULT_REACTION),
            reaction("r-2", "u-2", DEFAULT_REACTION),
            reaction("r-3", "u-2", "👍"),
        ];
        let view = ReactionAggregator::new(&reactions);
        assert_eq!(view.count(DEFAULT_REACTION), 2);
        assert_eq!(view.count("👍"), 1);
        assert_eq!(view.count("🎉"), 0);
        assert!(view.has_actor_reacted(&"u-1".into(), DEFAULT_REACTION));
        assert!(!view.has_actor_reacted(&"u-1".into(), "👍"));
    }

    #[test]
    fn toggle_twice_restores_original_set() {
        let original = vec![reaction("r-1", "u-2", DEFAULT_REACTION)];
        let mut reactions = original.clone();
        let actor: EntityId = "u-1".into();

        assert_eq!(
            ReactionAggregator::new(&reactions).plan_toggle(&actor, DEFAULT_REACTION),
            ToggleAction::Add
        );
        assert!(apply_added(
            &mut reactions,
            reaction("r-9", "u-1", DEFAULT_REACTION)
        ));

        let action = ReactionAggregator::new(&reactions).plan_toggle(&actor, DEFAULT_REACTION);
        assert_eq!(action, ToggleAction::Remove("r-9".into()));
        if let ToggleAction::Remove(id) = action {
            assert!(apply_removed(&mut reactions, &id));
        }

        assert_eq!(reactions, original);
    }

    #[test]
    fn apply_added_is_idempotent_and_enforces_one_per_actor_kind() {
        let mut reactions = Vec::new();
        assert!(apply_added(&mut reactions, reaction("r-1", "u-1", DEFAULT_REACTION)));
        assert!(!apply_added(&mut reactions, reaction("r-1", "u-1", DEFAULT_REACTION)));
        assert!(apply_added(&mut reactions, reaction("r-2", "u-1", DEFAULT_REACTION)));
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].id, EntityId::from("r-2"));
        assert!(!apply_removed(&mut reactions, &"r-1".into()));
    }

    #[test]
    fn summarize_groups_by_kind_in_first_seen_order() {
        let reactions = vec![
            reaction("r-1", "u-2", "👍"),
            reaction("r-2", "u-1", DEFAULT_REACTION),
            reaction("r-3", "u-3", "👍"),
        ];
        let summary = ReactionAggregator::new(&reactions).summarize(&"u-1".into());
        assert_eq!(
            summary,
            vec![
                ReactionSummary {
                    kind: "👍".into(),
                    count: 2,
                    reacted_by_actor: false,
                },
                ReactionSummary {
                    kind: DEFAULT_REACTION.into(),
                    count: 1,
                    reacted_by_actor: true,
                },
            ]
        );
    }
}
