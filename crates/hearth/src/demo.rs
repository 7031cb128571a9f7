// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hearth demo` command implementation.
//!
//! Opens two simulated household members against one in-process store,
//! drives a short scripted exchange (chat, reaction, typing, a recurring
//! chore) and prints what each client sees once the feeds have settled.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hearth_config::HearthConfig;
use hearth_core::{
    ChoreStatus, DEFAULT_REACTION, EntityId, HearthError, Record, RecurrenceRule, RemoteStore,
    Table,
};
use hearth_store::{MemoryStore, MemoryUploader};
use hearth_sync::{
    EntityCollection, HouseholdSession, Identity, NewChore, ReactionAggregator, SharedCollection,
};
use serde_json::json;

const HOUSEHOLD: &str = "demo-household";
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Run the `hearth demo` command.
pub async fn run_demo(config: HearthConfig, plain: bool) -> Result<(), HearthError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let store = Arc::new(MemoryStore::new());
    let uploader = Arc::new(MemoryUploader::new());
    let ada = member("u-ada", "Ada");
    let bo = member("u-bo", "Bo");
    for who in [&ada, &bo] {
        store
            .insert(
                Table::Profiles,
                json!({ "id": who.id, "full_name": who.display_name }),
            )
            .await?;
    }

    let open = |who: Identity| {
        HouseholdSession::open(
            HOUSEHOLD.into(),
            who,
            store.clone(),
            uploader.clone(),
            config.clone(),
        )
    };
    let ada = open(ada).await?;
    let bo = open(bo).await?;

    let template = ada
        .add_template("Take out the bins", Some(RecurrenceRule::Weekly))
        .await?;
    settle(bo.templates(), "template", |c| c.contains(&template.id)).await?;

    let sent = ada.send_message("Dinner at 7?", None).await?;
    settle(bo.messages(), "message", |c| c.contains(&sent.id)).await?;

    let kind = config
        .reactions
        .allowed
        .first()
        .map(String::as_str)
        .unwrap_or(DEFAULT_REACTION);
    bo.toggle_reaction(&sent.id, kind).await?;
    settle(ada.messages(), "reaction", |c| {
        c.get(&sent.id).is_some_and(|m| !m.reactions.is_empty())
    })
    .await?;

    let mut typers = ada.watch_typers();
    bo.notify_typing().await?;
    tokio::time::timeout(SETTLE_TIMEOUT, typers.changed())
        .await
        .map_err(|_| HearthError::Timeout {
            duration: SETTLE_TIMEOUT,
        })?
        .map_err(|_| HearthError::Internal("typing observer closed".into()))?;
    let typing_now: Vec<String> = ada
        .typers()
        .await
        .into_iter()
        .map(|t| t.display_name)
        .collect();

    let chore = ada
        .assign_task(NewChore {
            title: template.title.clone(),
            assignee: Some(bo.identity().id.clone()),
            template_id: Some(template.id.clone()),
            due_date: Some(Utc::now().date_naive()),
            recurrence: template.recurrence.clone(),
        })
        .await?;
    settle(bo.chores(), "chore", |c| c.contains(&chore.id)).await?;
    bo.toggle_chore_status(&chore.id).await?;
    settle(ada.chores(), "follow-up chore", |c| {
        c.len() == 2
            && c.get(&chore.id)
                .is_some_and(|c| c.status == ChoreStatus::Completed)
    })
    .await?;

    println!();
    println!("  hearth demo");
    println!("  {}", "-".repeat(50));
    print_typing(&typing_now, use_color);
    for session in [&ada, &bo] {
        print_client(session, use_color).await;
    }

    let converged = same_ids(ada.messages(), bo.messages()).await
        && same_ids(ada.chores(), bo.chores()).await
        && same_ids(ada.templates(), bo.templates()).await;
    println!();
    if converged {
        println!("  {}", paint("clients converged", Tone::Good, use_color));
    } else {
        println!("  {}", paint("clients diverged", Tone::Bad, use_color));
    }
    println!();

    ada.close().await;
    bo.close().await;

    if converged {
        Ok(())
    } else {
        Err(HearthError::Internal("demo clients did not converge".into()))
    }
}

fn member(id: &str, display_name: &str) -> Identity {
    Identity {
        id: id.into(),
        display_name: display_name.into(),
    }
}

/// Waits until `check` holds for `collection`.
async fn settle<T: Record>(
    collection: &SharedCollection<T>,
    what: &str,
    check: impl Fn(&EntityCollection<T>) -> bool,
) -> Result<(), HearthError> {
    let mut changes = collection.lock().await.subscribe();
    let waited = tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            if check(&*collection.lock().await) {
                return true;
            }
            if changes.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;

    match waited {
        Ok(true) => Ok(()),
        Ok(false) => Err(HearthError::Internal(format!("{what}: collection dropped"))),
        Err(_) => {
            tracing::warn!(what, "demo step did not settle");
            Err(HearthError::Timeout {
                duration: SETTLE_TIMEOUT,
            })
        }
    }
}

async fn same_ids<T: Record>(a: &SharedCollection<T>, b: &SharedCollection<T>) -> bool {
    let left: Vec<EntityId> = a.lock().await.iter().map(|e| e.id().clone()).collect();
    let right: Vec<EntityId> = b.lock().await.iter().map(|e| e.id().clone()).collect();
    left == right
}

async fn print_client(session: &HouseholdSession, use_color: bool) {
    let me = session.identity();
    println!();
    println!("  {} sees:", paint(&me.display_name, Tone::Title, use_color));

    for message in session.messages().lock().await.iter() {
        let reactions: Vec<String> = ReactionAggregator::new(&message.reactions)
            .summarize(&me.id)
            .into_iter()
            .map(|s| {
                let mine = if s.reacted_by_actor { "*" } else { "" };
                format!("{}{}{mine}", s.kind, s.count)
            })
            .collect();
        println!(
            "    [chat]     {:<8} {:<24} {}",
            message.sender_name.as_deref().unwrap_or("?"),
            message.content,
            reactions.join(" ")
        );
    }

    for chore in session.chores().lock().await.iter() {
        let (label, tone) = match chore.status {
            ChoreStatus::Pending => ("pending", Tone::Warn),
            ChoreStatus::Completed => ("done", Tone::Good),
        };
        let due = chore
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "    [chore]    {:<33} due {due}  {}",
            chore.title,
            paint(label, tone, use_color)
        );
    }

    for template in session.templates().lock().await.iter() {
        let every = template
            .recurrence
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "once".into());
        println!("    [template] {:<33} {every}", template.title);
    }
}

fn print_typing(typers: &[String], use_color: bool) {
    let line = if typers.is_empty() {
        "nobody is typing".to_string()
    } else {
        format!("{} typing...", typers.join(", "))
    };
    println!("    {}", paint(&line, Tone::Warn, use_color));
}

enum Tone {
    Title,
    Good,
    Warn,
    Bad,
}

fn paint(text: &str, tone: Tone, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    use colored::Colorize;
    match tone {
        Tone::Title => text.bold().to_string(),
        Tone::Good => text.green().to_string(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Bad => text.red().to_string(),
    }
}
