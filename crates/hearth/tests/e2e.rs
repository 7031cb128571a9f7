// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios with several clients sharing one household.
//!
//! Each test builds an isolated `TestHousehold` over a fault-injecting store.
//! Tests are independent and order-insensitive.

use std::time::Duration;

use chrono::NaiveDate;
use hearth_config::HearthConfig;
use hearth_core::{
    ChoreStatus, DEFAULT_REACTION, EntityId, HearthError, Message, Record, RecurrenceRule, Table,
};
use hearth_sync::{Attachment, EntityCollection, NewChore, SharedCollection};
use hearth_test_utils::TestHousehold;

async fn household(config: HearthConfig) -> TestHousehold {
    TestHousehold::builder()
        .with_member("u-1", "Ada")
        .with_member("u-2", "Bo")
        .with_config(config)
        .build()
        .await
        .unwrap()
}

async fn wait_for<T: Record>(
    collection: &SharedCollection<T>,
    check: impl Fn(&EntityCollection<T>) -> bool,
) {
    let mut rx = collection.lock().await.subscribe();
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if check(&*collection.lock().await) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn reaction_count(messages: &SharedCollection<Message>, id: &EntityId) -> usize {
    messages.lock().await.get(id).unwrap().reactions.len()
}

// ---- Failed writes ----

#[tokio::test]
async fn failed_send_reverts_and_reaches_nobody() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    household.store().fail_next_writes(1).await;
    let err = ada.send_message("lost", None).await.unwrap_err();
    assert!(matches!(err, HearthError::RemoteWrite { .. }));
    assert!(err.is_user_facing());
    assert!(ada.messages().lock().await.is_empty());

    let kept = ada.send_message("kept", None).await.unwrap();
    wait_for(bo.messages(), |c| c.contains(&kept.id)).await;
    assert_eq!(bo.messages().lock().await.len(), 1);
    assert_eq!(ada.messages().lock().await.len(), 1);
    assert_eq!(household.store().inner().row_count(Table::Messages).await, 1);
}

#[tokio::test(start_paused = true)]
async fn slow_write_times_out_and_reverts() {
    let mut config = HearthConfig::default();
    config.sync.write_timeout_ms = 50;
    let household = household(config).await;
    let ada = household.client("u-1").await.unwrap();

    household
        .store()
        .delay_writes(Some(Duration::from_secs(5)))
        .await;
    let err = ada.send_message("too slow", None).await.unwrap_err();

    assert!(matches!(
        err,
        HearthError::Timeout { duration } if duration == Duration::from_millis(50)
    ));
    assert!(ada.messages().lock().await.is_empty());
    assert_eq!(household.store().inner().row_count(Table::Messages).await, 0);
}

#[tokio::test]
async fn failed_status_toggle_restores_previous_chore() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();

    let chore = ada
        .assign_task(NewChore {
            title: "Dishes".into(),
            assignee: Some("u-1".into()),
            ..NewChore::default()
        })
        .await
        .unwrap();

    household.store().fail_next_writes(1).await;
    let err = ada.toggle_chore_status(&chore.id).await.unwrap_err();
    assert!(matches!(err, HearthError::RemoteWrite { .. }));

    let chores = ada.chores().lock().await;
    assert_eq!(chores.len(), 1);
    assert_eq!(chores.get(&chore.id).unwrap().status, ChoreStatus::Pending);
}

#[tokio::test]
async fn offline_delete_keeps_template_until_back_online() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let template = ada.add_template("Mop floors", None).await.unwrap();
    wait_for(bo.templates(), |c| c.contains(&template.id)).await;

    household.store().set_offline(true).await;
    assert!(ada.delete_template(&template.id).await.is_err());
    assert!(ada.templates().lock().await.contains(&template.id));

    household.store().set_offline(false).await;
    ada.delete_template(&template.id).await.unwrap();
    wait_for(bo.templates(), |c| c.is_empty()).await;
    assert!(ada.templates().lock().await.is_empty());
}

#[tokio::test]
async fn failed_upload_sends_nothing() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();

    household.uploader().fail_next(1).await;
    let err = ada
        .send_message(
            "photo",
            Some(Attachment {
                bytes: vec![1, 2, 3],
                content_type: "image/jpeg".into(),
                file_name: "cat.jpg".into(),
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HearthError::Upload { .. }));
    assert!(ada.messages().lock().await.is_empty());
    assert_eq!(household.store().write_attempts().await, 0);

    let uploads = household.uploader().uploads().await;
    assert_eq!(uploads.len(), 1);
    assert!(!uploads[0].succeeded);
    assert!(uploads[0].path.ends_with(".jpg"));
}

// ---- Convergence ----

#[tokio::test]
async fn store_assigned_ids_never_duplicate_on_echo() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let mut sent = Vec::new();
    for text in ["one", "two", "three"] {
        sent.push(ada.send_message(text, None).await.unwrap());
    }
    let last = sent.last().unwrap().id.clone();
    wait_for(bo.messages(), |c| c.contains(&last)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sent_ids: Vec<EntityId> = sent.iter().map(|m| m.id.clone()).collect();
    for session in [&ada, &bo] {
        let ids: Vec<EntityId> = session
            .messages()
            .lock()
            .await
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(ids, sent_ids);
    }
}

#[tokio::test]
async fn client_assigned_ids_reconcile_to_the_same_key() {
    let mut config = HearthConfig::default();
    config.sync.client_assigned_ids = true;
    let household = household(config).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let sent = ada.send_message("hello", None).await.unwrap();
    wait_for(bo.messages(), |c| c.contains(&sent.id)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let ada_messages = ada.messages().lock().await;
    assert_eq!(ada_messages.len(), 1);
    assert!(!ada_messages.is_pending(&sent.id));
    assert_eq!(
        ada_messages.get(&sent.id).unwrap().sender_name.as_deref(),
        Some("Ada")
    );
}

#[tokio::test]
async fn concurrent_reactions_converge_to_one_per_actor() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let sent = ada.send_message("pizza tonight?", None).await.unwrap();
    wait_for(bo.messages(), |c| c.contains(&sent.id)).await;

    let (a, b) = tokio::join!(
        ada.toggle_reaction(&sent.id, DEFAULT_REACTION),
        bo.toggle_reaction(&sent.id, DEFAULT_REACTION),
    );
    a.unwrap();
    b.unwrap();

    let both = |c: &EntityCollection<Message>| {
        c.get(&sent.id).is_some_and(|m| m.reactions.len() == 2)
    };
    wait_for(ada.messages(), both).await;
    wait_for(bo.messages(), both).await;

    for session in [&ada, &bo] {
        let messages = session.messages().lock().await;
        let reactions = &messages.get(&sent.id).unwrap().reactions;
        assert!(reactions.iter().any(|r| r.user_id == EntityId::from("u-1")));
        assert!(reactions.iter().any(|r| r.user_id == EntityId::from("u-2")));
    }

    ada.toggle_reaction(&sent.id, DEFAULT_REACTION).await.unwrap();
    let only_bo = |c: &EntityCollection<Message>| {
        c.get(&sent.id).is_some_and(|m| {
            m.reactions.len() == 1 && m.reactions[0].user_id == EntityId::from("u-2")
        })
    };
    wait_for(ada.messages(), only_bo).await;
    wait_for(bo.messages(), only_bo).await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_toggles_from_one_actor_store_one_reaction() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();

    let sent = ada.send_message("movie night?", None).await.unwrap();
    household
        .store()
        .delay_writes(Some(Duration::from_millis(20)))
        .await;

    let (a, b) = tokio::join!(
        ada.toggle_reaction(&sent.id, DEFAULT_REACTION),
        ada.toggle_reaction(&sent.id, DEFAULT_REACTION),
    );
    a.unwrap();
    assert!(matches!(b, Err(HearthError::Validation(_))));

    let reactions = household.store().inner();
    assert_eq!(reactions.row_count(Table::MessageReactions).await, 1);
    assert_eq!(reaction_count(ada.messages(), &sent.id).await, 1);

    ada.toggle_reaction(&sent.id, DEFAULT_REACTION).await.unwrap();
    assert_eq!(reactions.row_count(Table::MessageReactions).await, 0);
    assert_eq!(reaction_count(ada.messages(), &sent.id).await, 0);

    let fresh = household.client("u-2").await.unwrap();
    assert_eq!(reaction_count(fresh.messages(), &sent.id).await, 0);
}

#[tokio::test]
async fn failed_hydration_drops_only_that_event() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    household.store().set_fail_reads(true).await;
    let dropped = ada.send_message("unhydrated", None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    household.store().set_fail_reads(false).await;

    let delivered = ada.send_message("hydrated", None).await.unwrap();
    wait_for(bo.messages(), |c| c.contains(&delivered.id)).await;

    let bo_messages = bo.messages().lock().await;
    assert!(!bo_messages.contains(&dropped.id));
    assert_eq!(
        bo_messages.get(&delivered.id).unwrap().sender_name.as_deref(),
        Some("Ada")
    );
    assert!(ada.messages().lock().await.contains(&dropped.id));
}

// ---- Chores and typing ----

#[tokio::test]
async fn completing_daily_chore_at_month_end_rolls_over() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let chore = ada
        .assign_task(NewChore {
            title: "Feed the cat".into(),
            assignee: Some("u-1".into()),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            recurrence: Some(RecurrenceRule::Daily),
            ..NewChore::default()
        })
        .await
        .unwrap();
    ada.toggle_chore_status(&chore.id).await.unwrap();

    wait_for(bo.chores(), |c| c.len() == 2).await;
    let chores = bo.chores().lock().await.snapshot();
    let follow_up = chores.iter().find(|c| c.id != chore.id).unwrap();
    assert_eq!(follow_up.due_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    assert_eq!(follow_up.status, ChoreStatus::Pending);
    assert_eq!(follow_up.recurrence, Some(RecurrenceRule::Daily));

    // Reopening does not schedule another occurrence.
    ada.toggle_chore_status(&chore.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ada.chores().lock().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_status_toggles_complete_once() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();

    let chore = ada
        .assign_task(NewChore {
            title: "Water plants".into(),
            assignee: Some("u-1".into()),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            recurrence: Some(RecurrenceRule::Daily),
            ..NewChore::default()
        })
        .await
        .unwrap();
    household
        .store()
        .delay_writes(Some(Duration::from_millis(20)))
        .await;

    let (a, b) = tokio::join!(
        ada.toggle_chore_status(&chore.id),
        ada.toggle_chore_status(&chore.id),
    );
    assert_eq!(a.unwrap().status, ChoreStatus::Completed);
    assert!(matches!(b, Err(HearthError::Validation(_))));

    let chores = ada.chores().lock().await.snapshot();
    assert_eq!(chores.len(), 2);
    let original = chores.iter().find(|c| c.id == chore.id).unwrap();
    assert_eq!(original.status, ChoreStatus::Completed);
    let follow_up = chores.iter().find(|c| c.id != chore.id).unwrap();
    assert_eq!(follow_up.due_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    assert_eq!(household.store().inner().row_count(Table::Chores).await, 2);
}

#[tokio::test]
async fn unrecognized_recurrence_completes_without_follow_up() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();

    let chore = ada
        .assign_task(NewChore {
            title: "Clean gutters".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            recurrence: Some(RecurrenceRule::Unrecognized("YEARLY".into())),
            ..NewChore::default()
        })
        .await
        .unwrap();

    let done = ada.toggle_chore_status(&chore.id).await.unwrap();
    assert_eq!(done.status, ChoreStatus::Completed);
    assert_eq!(ada.chores().lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_indicator_expires_without_refresh() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let mut typers = ada.watch_typers();
    assert!(bo.notify_typing().await.unwrap());
    typers.changed().await.unwrap();
    assert_eq!(ada.typers().await.len(), 1);

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    assert!(ada.typers().await.is_empty());
    typers.borrow_and_update();

    // The debounce window has passed, so the next keystroke signals again.
    assert!(bo.notify_typing().await.unwrap());
    typers.changed().await.unwrap();
    assert_eq!(ada.typers().await[0].display_name, "Bo");
}

#[tokio::test]
async fn deleted_chore_disappears_everywhere() {
    let household = household(HearthConfig::default()).await;
    let ada = household.client("u-1").await.unwrap();
    let bo = household.client("u-2").await.unwrap();

    let chore = ada
        .assign_task(NewChore {
            title: "Water plants".into(),
            ..NewChore::default()
        })
        .await
        .unwrap();
    wait_for(bo.chores(), |c| c.contains(&chore.id)).await;

    let removed = bo.delete_chore(&chore.id).await.unwrap();
    assert_eq!(removed.id, chore.id);
    wait_for(ada.chores(), |c| c.is_empty()).await;
    assert_eq!(household.store().inner().row_count(Table::Chores).await, 0);

    let err = bo.delete_chore(&chore.id).await.unwrap_err();
    assert!(matches!(err, HearthError::NotFound { .. }));
}
