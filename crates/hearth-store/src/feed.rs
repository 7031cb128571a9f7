// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscriber registries for the change feed and broadcast channels.
//!
//! Each subscriber owns an unbounded channel; the stream handed out ends when
//! the registry drops the sender. Subscribers whose stream was dropped are
//! pruned on the next publish.

use futures::stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use hearth_core::{BroadcastStream, ChangeEvent, ChangeKind, ChangeStream, Filter, Table};

struct FeedSubscriber {
    table: Table,
    filter: Filter,
    kinds: Vec<ChangeKind>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl FeedSubscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.table == event.table
            && self.kinds.contains(&event.kind)
            && self.filter.matches(&event.row)
    }
}

#[derive(Default)]
pub(crate) struct FeedSubscribers {
    subscribers: Vec<FeedSubscriber>,
}

impl FeedSubscribers {
    pub(crate) fn register(
        &mut self,
        table: Table,
        filter: Filter,
        kinds: Vec<ChangeKind>,
    ) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(FeedSubscriber {
            table,
            filter,
            kinds,
            tx,
        });
        Box::pin(receiver_stream(rx))
    }

    pub(crate) fn publish(&mut self, event: &ChangeEvent) {
        self.subscribers.retain(|sub| {
            if sub.tx.is_closed() {
                trace!(table = %sub.table, "pruning closed feed subscriber");
                return false;
            }
            if sub.wants(event) {
                return sub.tx.send(event.clone()).is_ok();
            }
            true
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.iter().filter(|s| !s.tx.is_closed()).count()
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }
}

struct BroadcastSubscriber {
    channel: String,
    event: String,
    tx: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
pub(crate) struct BroadcastSubscribers {
    subscribers: Vec<BroadcastSubscriber>,
}

impl BroadcastSubscribers {
    pub(crate) fn register(&mut self, channel: &str, event: &str) -> BroadcastStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(BroadcastSubscriber {
            channel: channel.to_string(),
            event: event.to_string(),
            tx,
        });
        Box::pin(receiver_stream(rx))
    }

    pub(crate) fn publish(&mut self, channel: &str, event: &str, payload: &Value) {
        self.subscribers.retain(|sub| {
            if sub.channel == channel && sub.event == event {
                sub.tx.send(payload.clone()).is_ok()
            } else {
                !sub.tx.is_closed()
            }
        });
    }

    pub(crate) fn clear(&mut self) {
        self.subscribers.clear();
    }
}

fn receiver_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
) -> impl futures::Stream<Item = T> + Send + 'static {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}
