//! # In-Memory Variable Store
//!
//! A `VariableStore` kept entirely in process. All state sits behind one
//! mutex; no call holds it across an await, so tasks on any runtime thread can
//! write concurrently.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::store::subscription::ChangeQueue;
use crate::store::{
    DataChange, HistoryEntry, NodeId, RetentionPolicy, Subscription, SubscriptionId,
    VariableInfo, VariableStore, VariableType, VariableValue,
};

struct Node {
    name: String,
    ty: VariableType,
    value: VariableValue,
    writable: bool,
    history: Option<History>,
}

struct History {
    policy: RetentionPolicy,
    entries: VecDeque<HistoryEntry>,
}

impl History {
    fn record(&mut self, value: VariableValue, timestamp: DateTime<Utc>) {
        self.entries.push_back(HistoryEntry { value, timestamp });

        if let Some(count) = self.policy.count {
            while self.entries.len() > count {
                self.entries.pop_front();
            }
        }
        if let Some(period) = self.policy.period.and_then(|p| chrono::Duration::from_std(p).ok()) {
            let oldest = timestamp - period;
            while self.entries.front().is_some_and(|e| e.timestamp < oldest) {
                self.entries.pop_front();
            }
        }
    }
}

struct Watch {
    nodes: HashSet<NodeId>,
    queue: Weak<ChangeQueue>,
}

#[derive(Default)]
struct Inner {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    subscriptions: HashMap<SubscriptionId, Watch>,
    next_subscription: u64,
}

impl Inner {
    fn node(&self, id: NodeId) -> Result<&Node, StoreError> {
        id.0
            .checked_sub(1)
            .and_then(|idx| self.nodes.get(idx as usize))
            .ok_or(StoreError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, StoreError> {
        id.0
            .checked_sub(1)
            .and_then(|idx| self.nodes.get_mut(idx as usize))
            .ok_or(StoreError::UnknownNode(id))
    }

    /// Hands a change to every live subscription watching `id` and forgets
    /// subscriptions whose subscriber has gone away.
    fn notify(&mut self, id: NodeId, value: &VariableValue, timestamp: DateTime<Utc>) {
        self.subscriptions.retain(|_, watch| match watch.queue.upgrade() {
            Some(queue) => {
                if watch.nodes.contains(&id) {
                    queue.push(DataChange {
                        node: id,
                        value: value.clone(),
                        source_timestamp: timestamp,
                    });
                }
                true
            }
            None => false,
        });
    }
}

/// In-process [`VariableStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// A write arriving from a remote client. Only variables marked writable
    /// accept it.
    pub fn client_write(&self, node: NodeId, value: VariableValue) -> Result<(), StoreError> {
        if !self.lock()?.node(node)?.writable {
            return Err(StoreError::NotWritable(node));
        }
        self.write_value(node, value)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.lock().ok()?.by_name.get(name).copied()
    }
}

impl VariableStore for MemoryStore {
    fn create_variable(
        &self,
        name: &str,
        initial: VariableValue,
        ty: VariableType,
    ) -> Result<NodeId, StoreError> {
        let mut inner = self.lock()?;
        if inner.by_name.contains_key(name) {
            return Err(StoreError::DuplicateName(name.to_string()));
        }

        let id = NodeId(inner.nodes.len() as u32 + 1);
        if initial.value_type() != ty {
            return Err(StoreError::TypeMismatch {
                node: id,
                expected: ty,
                actual: initial.value_type(),
            });
        }

        inner.nodes.push(Node {
            name: name.to_string(),
            ty,
            value: initial,
            writable: false,
            history: None,
        });
        inner.by_name.insert(name.to_string(), id);
        tracing::debug!(node = %id, name, %ty, "variable created");
        Ok(id)
    }

    fn write_value(&self, id: NodeId, value: VariableValue) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let now = Utc::now();

        let node = inner.node_mut(id)?;
        if node.ty != value.value_type() {
            return Err(StoreError::TypeMismatch {
                node: id,
                expected: node.ty,
                actual: value.value_type(),
            });
        }

        let changed = node.value != value;
        node.value = value.clone();
        if let Some(history) = node.history.as_mut() {
            history.record(value.clone(), now);
        }

        if changed {
            inner.notify(id, &value, now);
        }
        Ok(())
    }

    fn read_value(&self, id: NodeId) -> Result<VariableValue, StoreError> {
        Ok(self.lock()?.node(id)?.value.clone())
    }

    fn set_writable(&self, id: NodeId) -> Result<(), StoreError> {
        self.lock()?.node_mut(id)?.writable = true;
        Ok(())
    }

    fn create_subscription(&self, interval: Duration) -> Result<Subscription, StoreError> {
        let mut inner = self.lock()?;
        inner.next_subscription += 1;
        let id = SubscriptionId(inner.next_subscription);

        let queue = Arc::new(ChangeQueue::default());
        inner.subscriptions.insert(
            id,
            Watch {
                nodes: HashSet::new(),
                queue: Arc::downgrade(&queue),
            },
        );
        Ok(Subscription::new(id, interval, queue))
    }

    fn subscribe_to_changes(
        &self,
        subscription: SubscriptionId,
        id: NodeId,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let current = inner.node(id)?.value.clone();

        let watch = inner
            .subscriptions
            .get_mut(&subscription)
            .ok_or(StoreError::UnknownSubscription(subscription.0))?;
        let queue = watch
            .queue
            .upgrade()
            .ok_or(StoreError::UnknownSubscription(subscription.0))?;

        watch.nodes.insert(id);
        queue.push(DataChange {
            node: id,
            value: current,
            source_timestamp: Utc::now(),
        });
        Ok(())
    }

    fn historize(&self, id: NodeId, policy: RetentionPolicy) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let node = inner.node_mut(id)?;
        node.history = Some(History {
            policy,
            entries: VecDeque::new(),
        });
        tracing::debug!(node = %id, name = %node.name, ?policy, "historization enabled");
        Ok(())
    }

    fn read_history(&self, id: NodeId) -> Result<Vec<HistoryEntry>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .node(id)?
            .history
            .as_ref()
            .map(|h| h.entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn snapshot(&self) -> Result<Vec<VariableInfo>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| VariableInfo {
                node: NodeId(idx as u32 + 1),
                name: node.name.clone(),
                ty: node.ty,
                writable: node.writable,
                value: node.value.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_rejects_wrong_type() {
        let store = MemoryStore::new();
        let id = store
            .create_variable("BooleanData", true.into(), VariableType::Boolean)
            .unwrap();

        let err = store.write_value(id, 1.5.into()).unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(store.read_value(id).unwrap(), VariableValue::Boolean(true));
    }

    #[test]
    fn test_create_rejects_duplicates_and_bad_initial() {
        let store = MemoryStore::new();
        store
            .create_variable("CyclicData", 0.0.into(), VariableType::Double)
            .unwrap();

        assert!(matches!(
            store.create_variable("CyclicData", 0.0.into(), VariableType::Double),
            Err(StoreError::DuplicateName(_))
        ));
        assert!(store
            .create_variable("GPSLatitude", 0.0.into(), VariableType::String)
            .unwrap_err()
            .is_type_mismatch());
    }

    #[test]
    fn test_unknown_node() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read_value(NodeId(0)),
            Err(StoreError::UnknownNode(NodeId(0)))
        ));
        assert!(matches!(
            store.write_value(NodeId(42), true.into()),
            Err(StoreError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_client_write_requires_writable() {
        let store = MemoryStore::new();
        let id = store
            .create_variable("MirrorDataOriginal", true.into(), VariableType::Boolean)
            .unwrap();

        assert!(matches!(
            store.client_write(id, false.into()),
            Err(StoreError::NotWritable(_))
        ));
        store.set_writable(id).unwrap();
        store.client_write(id, false.into()).unwrap();
        assert_eq!(store.read_value(id).unwrap(), VariableValue::Boolean(false));
    }

    #[test]
    fn test_history_respects_count() {
        let store = MemoryStore::new();
        let id = store
            .create_variable("CyclicData", 0.0.into(), VariableType::Double)
            .unwrap();
        store.historize(id, RetentionPolicy::with_count(3)).unwrap();

        for i in 0..5 {
            store.write_value(id, (i as f64).into()).unwrap();
        }
        let values: Vec<_> = store
            .read_history(id)
            .unwrap()
            .into_iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(
            values,
            vec![
                VariableValue::Double(2.0),
                VariableValue::Double(3.0),
                VariableValue::Double(4.0)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_reports_initial_and_changed_values() {
        let store = MemoryStore::new();
        let id = store
            .create_variable("MirrorDataOriginal", true.into(), VariableType::Boolean)
            .unwrap();
        let mut sub = store.create_subscription(Duration::from_millis(500)).unwrap();
        store.subscribe_to_changes(sub.id(), id).unwrap();

        assert_eq!(sub.recv().await.value, VariableValue::Boolean(true));

        // Same value again is not a change
        store.write_value(id, true.into()).unwrap();
        store.write_value(id, false.into()).unwrap();
        let change = sub.recv().await;
        assert_eq!(change.node, id);
        assert_eq!(change.value, VariableValue::Boolean(false));
    }

    #[test]
    fn test_snapshot_lists_in_creation_order() {
        let store = MemoryStore::new();
        store
            .create_variable("GPSLatitude", "".into(), VariableType::String)
            .unwrap();
        store
            .create_variable("GPSLongitude", "".into(), VariableType::String)
            .unwrap();

        let names: Vec<_> = store.snapshot().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["GPSLatitude", "GPSLongitude"]);
        assert_eq!(store.find("GPSLongitude"), Some(NodeId(2)));
    }
}
