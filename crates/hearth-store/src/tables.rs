// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row storage for one table: id assignment, patching, filtering, ordering.

use std::cmp::Ordering;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use hearth_core::{EntityId, Filter, HearthError, Order, Table};

/// Rows of one table in insertion order.
#[derive(Debug, Default)]
pub(crate) struct TableRows {
    rows: Vec<Map<String, Value>>,
}

impl TableRows {
    /// Inserts a row, assigning `id` and `created_at` when the caller left them out.
    ///
    /// A caller-proposed id is kept as long as it is not already taken.
    pub(crate) fn insert(&mut self, table: Table, row: Value) -> Result<Value, HearthError> {
        let Value::Object(mut row) = row else {
            return Err(HearthError::remote_write(format!(
                "{table}: row must be a JSON object"
            )));
        };

        let id = match row.get("id").and_then(Value::as_str) {
            Some(proposed) => {
                if self.position(proposed).is_some() {
                    return Err(HearthError::remote_write(format!(
                        "{table}: duplicate key {proposed}"
                    )));
                }
                proposed.to_string()
            }
            None => EntityId::generate().0,
        };

        let unique = unique_columns(table);
        if !unique.is_empty()
            && self
                .rows
                .iter()
                .any(|existing| same_key(existing, &row, unique))
        {
            return Err(HearthError::remote_write(format!(
                "{table}: duplicate ({}) for {}",
                unique.join(", "),
                unique
                    .iter()
                    .map(|column| row.get(*column).map_or("null".into(), Value::to_string))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        row.insert("id".into(), Value::String(id));

        if row.get("created_at").is_none_or(Value::is_null) {
            row.insert(
                "created_at".into(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }

        self.rows.push(row.clone());
        Ok(Value::Object(row))
    }

    /// Merges `patch` into the row with `id` and returns the new row.
    pub(crate) fn update(
        &mut self,
        table: Table,
        id: &EntityId,
        patch: Value,
    ) -> Result<Value, HearthError> {
        let Value::Object(patch) = patch else {
            return Err(HearthError::remote_write(format!(
                "{table}: patch must be a JSON object"
            )));
        };
        let Some(pos) = self.position(id.as_str()) else {
            return Err(HearthError::remote_write(format!("{table}: no row with id {id}")));
        };

        let row = &mut self.rows[pos];
        for (column, value) in patch {
            if column != "id" {
                row.insert(column, value);
            }
        }
        Ok(Value::Object(row.clone()))
    }

    /// Removes the row with `id`, returning it if it existed.
    pub(crate) fn delete(&mut self, id: &EntityId) -> Option<Value> {
        let pos = self.position(id.as_str())?;
        Some(Value::Object(self.rows.remove(pos)))
    }

    pub(crate) fn query(&self, filter: &Filter, order: Option<&Order>) -> Vec<Value> {
        let mut rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| Value::Object(row.clone()))
            .filter(|row| filter.matches(row))
            .collect();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        rows
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }
}

/// Columns that together must be unique within `table`, besides `id`.
fn unique_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::MessageReactions => &["message_id", "user_id", "emoji"],
        _ => &[],
    }
}

fn same_key(a: &Map<String, Value>, b: &Map<String, Value>, columns: &[&str]) -> bool {
    columns.iter().all(|column| a.get(*column) == b.get(*column))
}

/// Orders JSON scalars: missing/null first, then numbers, then strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
