// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The row boundary between the remote store and domain types.
//!
//! Raw rows (`serde_json::Value`) are only ever inspected here. Every domain
//! type declares a wire `Row` shape and converts to and from it once, so the
//! engine downstream only sees resolved, strongly-typed records.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HearthError;
use crate::types::{EntityId, Table};

/// A domain row that lives in an id-keyed collection.
pub trait Record: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// The remote table rows of this type live in.
    const TABLE: Table;

    /// Wire shape of a row as the remote store sends and accepts it.
    type Row: Serialize + DeserializeOwned;

    fn from_row(row: Self::Row) -> Self;

    fn to_row(&self) -> Self::Row;

    fn id(&self) -> &EntityId;

    fn created_at(&self) -> DateTime<Utc>;

    /// Default collection ordering: `created_at` ascending.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.created_at().cmp(&other.created_at())
    }

    /// Preconditions checked before a create is applied.
    fn validate(&self) -> Result<(), HearthError> {
        Ok(())
    }

    /// Carries derived, non-column state from the entry this one replaces.
    ///
    /// Called whenever an incoming row replaces an existing entry with the
    /// same logical identity (reconcile, remote update, duplicate insert).
    fn carry_derived(&mut self, _previous: &Self) {}

    /// Decodes a raw row into a record.
    fn decode(row: Value) -> Result<Self, HearthError> {
        serde_json::from_value::<Self::Row>(row)
            .map(Self::from_row)
            .map_err(|source| HearthError::Decode {
                table: Self::TABLE,
                source,
            })
    }

    /// Encodes a record into a raw row.
    fn encode(&self) -> Result<Value, HearthError> {
        serde_json::to_value(self.to_row()).map_err(|source| HearthError::Decode {
            table: Self::TABLE,
            source,
        })
    }
}

/// An embedded relation that a backend may return either as a single object
/// or as an array, depending on query shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Joined<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Joined<T> {
    /// Resolves the relation to at most one value (the first, for arrays).
    pub fn into_first(self) -> Option<T> {
        match self {
            Joined::One(value) => Some(value),
            Joined::Many(values) => values.into_iter().next(),
        }
    }
}
