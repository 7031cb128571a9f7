// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up generation for recurring chores.
//!
//! Date arithmetic is on calendar dates (`NaiveDate`), never on timestamps,
//! so daylight-saving shifts cannot move a due date.
//!
//! Monthly overflow policy: the day of month is kept when the target month
//! has it, otherwise it is clamped to the last day of that month. This is
//! what [`NaiveDate::checked_add_months`] does, e.g. 2024-01-31 becomes
//! 2024-02-29 and 2023-01-31 becomes 2023-02-28. The clamp is not undone
//! later: 2024-02-29 advances to 2024-03-29.

use chrono::{Days, Months, NaiveDate, Utc};
use hearth_core::{Chore, ChoreStatus, EntityId, RecurrenceRule};
use tracing::debug;

/// The next due date under `rule`, or `None` for an unrecognized rule or a
/// date outside the representable range.
pub fn advance(due: NaiveDate, rule: &RecurrenceRule) -> Option<NaiveDate> {
    match rule {
        RecurrenceRule::Daily => due.checked_add_days(Days::new(1)),
        RecurrenceRule::Weekly => due.checked_add_days(Days::new(7)),
        RecurrenceRule::Monthly => due.checked_add_months(Months::new(1)),
        RecurrenceRule::Unrecognized(_) => None,
    }
}

/// Builds the next occurrence of a chore that was just completed.
///
/// The follow-up keeps the assignee, template, and rule, so it recurs in turn.
/// Returns `None` (not an error) when the chore is not completed, has no
/// rule, has no due date, or carries a rule this engine does not know.
pub fn expand(completed: &Chore) -> Option<Chore> {
    if completed.status != ChoreStatus::Completed {
        return None;
    }
    let rule = completed.recurrence.as_ref()?;
    let Some(due) = completed.due_date else {
        debug!(id = %completed.id, "recurring chore has no due date; no follow-up");
        return None;
    };
    let Some(next_due) = advance(due, rule) else {
        debug!(id = %completed.id, %rule, "no follow-up for recurrence rule");
        return None;
    };

    Some(Chore {
        id: EntityId::generate(),
        household_id: completed.household_id.clone(),
        title: completed.title.clone(),
        assigned_to: completed.assigned_to.clone(),
        template_id: completed.template_id.clone(),
        due_date: Some(next_due),
        status: ChoreStatus::Pending,
        recurrence: Some(rule.clone()),
        created_at: Utc::now(),
    })
}
