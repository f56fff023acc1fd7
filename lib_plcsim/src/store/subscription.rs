//! # Change Subscriptions
//!
//! Instead of calling back into its subscriber, the store drops change events
//! into a [`ChangeQueue`] owned by the [`Subscription`]. The subscriber pulls
//! them with [`Subscription::recv`], which samples the queue once per
//! publishing interval.
//!
//! Several changes to the same node inside one interval collapse into the most
//! recent one. Changes to different nodes keep the order in which the store
//! first saw them.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::StoreError;
use crate::store::{NodeId, Variable, VariableValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One value change as observed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    pub node: NodeId,
    pub value: VariableValue,
    pub source_timestamp: DateTime<Utc>,
}

/// Store side of a subscription: changes waiting for the next sample.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: Mutex<Vec<DataChange>>,
}

impl ChangeQueue {
    /// Queues a change, replacing any pending change of the same node.
    pub fn push(&self, change: DataChange) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.iter_mut().find(|c| c.node == change.node) {
            Some(slot) => *slot = change,
            None => pending.push(change),
        }
    }

    fn drain(&self) -> Vec<DataChange> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }
}

/// Subscriber side of a change subscription.
pub struct Subscription {
    id: SubscriptionId,
    interval: Duration,
    queue: Arc<ChangeQueue>,
    ready: VecDeque<DataChange>,
    // Created on first recv so a subscription can be built outside a runtime.
    ticker: Option<Interval>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, interval: Duration, queue: Arc<ChangeQueue>) -> Self {
        Self {
            id,
            interval: interval.max(Duration::from_millis(1)),
            queue,
            ready: VecDeque::new(),
            ticker: None,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Registers `variable` with this subscription in the variable's store.
    pub fn subscribe_to_changes(&self, variable: &Variable) -> Result<(), StoreError> {
        variable.store().subscribe_to_changes(self.id, variable.node())
    }

    /// Waits for the next change. Suspends at least until the next publishing
    /// interval when nothing has been sampled yet.
    pub async fn recv(&mut self) -> DataChange {
        loop {
            if let Some(change) = self.ready.pop_front() {
                return change;
            }
            let period = self.interval;
            let ticker = self.ticker.get_or_insert_with(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
            self.ready.extend(self.queue.drain());
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("ready", &self.ready.len())
            .finish()
    }
}
