// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Household domain rows: chat messages, reactions, chores, templates, profiles.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HearthError;
use crate::record::{Joined, Record};
use crate::types::{EntityId, Table};

/// The reaction symbol supported out of the box.
pub const DEFAULT_REACTION: &str = "\u{2764}\u{fe0f}";

// --- Chat ---

/// A chat message in a household conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: EntityId,
    pub household_id: EntityId,
    pub user_id: EntityId,
    pub content: String,
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Display name of the sender. Not a column: filled by hydration.
    pub sender_name: Option<String>,
    /// Reactions on this message. Not a column: merged from the reactions table.
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRef {
    #[serde(alias = "display_name")]
    pub full_name: Option<String>,
}

/// Wire shape of a `messages` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: EntityId,
    pub household_id: EntityId,
    pub user_id: EntityId,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Sender profile, when the backend embeds the relation.
    #[serde(default, skip_serializing)]
    pub profiles: Option<Joined<ProfileRef>>,
}

impl Record for Message {
    const TABLE: Table = Table::Messages;
    type Row = MessageRow;

    fn from_row(row: MessageRow) -> Self {
        let sender_name = row
            .profiles
            .and_then(Joined::into_first)
            .and_then(|p| p.full_name);
        Self {
            id: row.id,
            household_id: row.household_id,
            user_id: row.user_id,
            content: row.content,
            attachment_url: row.attachment_url,
            created_at: row.created_at,
            sender_name,
            reactions: Vec::new(),
        }
    }

    fn to_row(&self) -> MessageRow {
        MessageRow {
            id: self.id.clone(),
            household_id: self.household_id.clone(),
            user_id: self.user_id.clone(),
            content: self.content.clone(),
            attachment_url: self.attachment_url.clone(),
            created_at: self.created_at,
            profiles: None,
        }
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate(&self) -> Result<(), HearthError> {
        if self.content.trim().is_empty() && self.attachment_url.is_none() {
            return Err(HearthError::Validation(
                "message must have text or an attachment".into(),
            ));
        }
        if self.household_id.as_str().is_empty() {
            return Err(HearthError::Validation(
                "message must belong to a household".into(),
            ));
        }
        Ok(())
    }

    fn carry_derived(&mut self, previous: &Self) {
        if self.sender_name.is_none() {
            self.sender_name = previous.sender_name.clone();
        }
        for reaction in &previous.reactions {
            if !self.reactions.iter().any(|r| r.id == reaction.id) {
                self.reactions.push(reaction.clone());
            }
        }
    }
}

/// A reaction by one identity on one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: EntityId,
    pub message_id: EntityId,
    pub user_id: EntityId,
    #[serde(rename = "emoji")]
    pub kind: String,
}

impl Reaction {
    pub fn decode(row: serde_json::Value) -> Result<Self, HearthError> {
        serde_json::from_value(row).map_err(|source| HearthError::Decode {
            table: Table::MessageReactions,
            source,
        })
    }
}

// --- Chores ---

/// Recurrence policy for a chore.
///
/// Unknown wire values are preserved as [`RecurrenceRule::Unrecognized`]
/// rather than rejected; expanding them produces no follow-up chore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    Monthly,
    Unrecognized(String),
}

impl From<String> for RecurrenceRule {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<RecurrenceRule> for String {
    fn from(value: RecurrenceRule) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::Daily => f.write_str("daily"),
            RecurrenceRule::Weekly => f.write_str("weekly"),
            RecurrenceRule::Monthly => f.write_str("monthly"),
            RecurrenceRule::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoreStatus {
    #[default]
    Pending,
    Completed,
}

impl ChoreStatus {
    pub fn toggled(self) -> Self {
        match self {
            ChoreStatus::Pending => ChoreStatus::Completed,
            ChoreStatus::Completed => ChoreStatus::Pending,
        }
    }
}

/// A scheduled household task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chore {
    pub id: EntityId,
    pub household_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub assigned_to: Option<EntityId>,
    #[serde(default)]
    pub template_id: Option<EntityId>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ChoreStatus,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    pub created_at: DateTime<Utc>,
}

impl Record for Chore {
    const TABLE: Table = Table::Chores;
    type Row = Chore;

    fn from_row(row: Chore) -> Self {
        row
    }

    fn to_row(&self) -> Chore {
        self.clone()
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate(&self) -> Result<(), HearthError> {
        if self.title.trim().is_empty() {
            return Err(HearthError::Validation("chore title must not be empty".into()));
        }
        if self.assigned_to.is_none() {
            return Err(HearthError::Validation("chore must be assigned to someone".into()));
        }
        Ok(())
    }
}

/// A reusable chore definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoreTemplate {
    pub id: EntityId,
    pub household_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    pub created_at: DateTime<Utc>,
}

impl Record for ChoreTemplate {
    const TABLE: Table = Table::ChoreTemplates;
    type Row = ChoreTemplate;

    fn from_row(row: ChoreTemplate) -> Self {
        row
    }

    fn to_row(&self) -> ChoreTemplate {
        self.clone()
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Templates are listed alphabetically.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.title.to_lowercase().cmp(&other.title.to_lowercase())
    }

    fn validate(&self) -> Result<(), HearthError> {
        if self.title.trim().is_empty() {
            return Err(HearthError::Validation(
                "template title must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A household member's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: EntityId,
    #[serde(rename = "full_name")]
    pub display_name: Option<String>,
}

impl Profile {
    pub fn decode(row: serde_json::Value) -> Result<Self, HearthError> {
        serde_json::from_value(row).map_err(|source| HearthError::Decode {
            table: Table::Profiles,
            source,
        })
    }
}
