//! # Core Engine Module
//!
//! Everything that ties the generators and the track feed to the store and
//! keeps them running:
//!
//! - **`task_group`**: structured concurrency for every engine task. One
//!   cancellation token, one join point, failures isolated per task.
//! - **`mirror`**: forwards boolean changes of one variable onto another
//!   through a store subscription.
//! - **`monitor`**: periodic snapshot of all variables into the log.
//! - **`simulation`**: creates the plant's variables and launches every
//!   component into a task group.

pub mod mirror;
pub mod monitor;
pub mod simulation;
pub mod task_group;

pub use mirror::{MirrorEngine, MirrorOutcome, SubscribedMirror};
pub use simulation::{Simulation, SimulationPlan, SimulationVariables};
pub use task_group::{GroupReport, TaskExit, TaskGroup};

use crate::error::EngineError;
use crate::store::{Variable, VariableValue};

/// Writes `value` on behalf of `component`.
///
/// A type mismatch is logged and the value dropped; the writer keeps running.
/// Any other store failure is returned and ends the writer's task.
pub fn publish(
    variable: &Variable,
    value: VariableValue,
    component: &'static str,
) -> Result<(), EngineError> {
    tracing::trace!(component, variable = variable.name(), %value, "write");
    match variable.write_value(value) {
        Ok(()) => Ok(()),
        Err(e) if e.is_type_mismatch() => {
            tracing::error!(component, variable = variable.name(), error = %e, "value dropped");
            Ok(())
        }
        Err(source) => Err(EngineError::Write {
            component,
            variable: variable.name().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::error::StoreError;
    use crate::generators::{drive, Ramp, Toggle};
    use crate::store::{
        HistoryEntry, MemoryStore, NodeId, RetentionPolicy, Subscription, SubscriptionId,
        VariableInfo, VariableStore, VariableType,
    };

    #[derive(Debug, Clone, Copy)]
    enum Fault {
        Mismatch,
        Reject,
    }

    /// Memory store that fails writes to chosen nodes and records when every
    /// write was attempted.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        faults: Mutex<HashMap<NodeId, Fault>>,
        attempts: Mutex<HashMap<NodeId, Vec<Instant>>>,
    }

    impl FaultyStore {
        fn fail(&self, node: NodeId, fault: Fault) {
            self.faults.lock().unwrap().insert(node, fault);
        }

        fn attempts(&self, node: NodeId) -> Vec<Instant> {
            self.attempts.lock().unwrap().get(&node).cloned().unwrap_or_default()
        }
    }

    impl VariableStore for FaultyStore {
        fn create_variable(
            &self,
            name: &str,
            initial: VariableValue,
            ty: VariableType,
        ) -> Result<NodeId, StoreError> {
            self.inner.create_variable(name, initial, ty)
        }

        fn write_value(&self, node: NodeId, value: VariableValue) -> Result<(), StoreError> {
            self.attempts.lock().unwrap().entry(node).or_default().push(Instant::now());
            match self.faults.lock().unwrap().get(&node) {
                Some(Fault::Mismatch) => Err(StoreError::TypeMismatch {
                    node,
                    expected: VariableType::String,
                    actual: value.value_type(),
                }),
                Some(Fault::Reject) => Err(StoreError::UnknownNode(node)),
                None => self.inner.write_value(node, value),
            }
        }

        fn read_value(&self, node: NodeId) -> Result<VariableValue, StoreError> {
            self.inner.read_value(node)
        }

        fn set_writable(&self, node: NodeId) -> Result<(), StoreError> {
            self.inner.set_writable(node)
        }

        fn create_subscription(&self, interval: Duration) -> Result<Subscription, StoreError> {
            self.inner.create_subscription(interval)
        }

        fn subscribe_to_changes(
            &self,
            subscription: SubscriptionId,
            node: NodeId,
        ) -> Result<(), StoreError> {
            self.inner.subscribe_to_changes(subscription, node)
        }

        fn historize(&self, node: NodeId, policy: RetentionPolicy) -> Result<(), StoreError> {
            self.inner.historize(node, policy)
        }

        fn read_history(&self, node: NodeId) -> Result<Vec<HistoryEntry>, StoreError> {
            self.inner.read_history(node)
        }

        fn snapshot(&self) -> Result<Vec<VariableInfo>, StoreError> {
            self.inner.snapshot()
        }
    }

    fn setup() -> (Arc<FaultyStore>, Arc<dyn VariableStore>) {
        let faulty = Arc::new(FaultyStore::default());
        let store: Arc<dyn VariableStore> = faulty.clone();
        (faulty, store)
    }

    #[test]
    fn test_publish_drops_type_mismatch() {
        let (faulty, store) = setup();
        let var = Variable::create(&store, "BooleanData", true, VariableType::Boolean).unwrap();
        faulty.fail(var.node(), Fault::Mismatch);

        publish(&var, false.into(), "toggle").unwrap();
        assert_eq!(var.read_value().unwrap(), VariableValue::Boolean(true));
    }

    #[test]
    fn test_publish_wraps_other_store_errors() {
        let (faulty, store) = setup();
        let var = Variable::create(&store, "PositiveTrendData", 0.0, VariableType::Double).unwrap();
        faulty.fail(var.node(), Fault::Reject);

        let err = publish(&var, 1.0.into(), "ramp").unwrap_err();
        match err {
            EngineError::Write {
                component,
                variable,
                source,
            } => {
                assert_eq!(component, "ramp");
                assert_eq!(variable, "PositiveTrendData");
                assert!(matches!(source, StoreError::UnknownNode(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_errors_only_affect_their_own_generator() {
        let (faulty, store) = setup();
        let dropped = Variable::create(&store, "BooleanData", true, VariableType::Boolean).unwrap();
        let rejected = Variable::create(&store, "NegativeTrendData", 0.0, VariableType::Double).unwrap();
        let healthy = Variable::create(&store, "PositiveTrendData", 0.0, VariableType::Double).unwrap();
        faulty.fail(dropped.node(), Fault::Mismatch);
        faulty.fail(rejected.node(), Fault::Reject);

        let period = Duration::from_secs(1);
        let mut group = TaskGroup::new();
        group.spawn("BooleanData", drive(dropped.clone(), Toggle::new(true, period)));
        group.spawn("NegativeTrendData", drive(rejected.clone(), Ramp::new(0.0, -2.0, period)));
        group.spawn("PositiveTrendData", drive(healthy.clone(), Ramp::new(0.0, 1.0, period)));

        tokio::time::sleep(Duration::from_millis(3500)).await;

        // The mismatching writer kept trying, the rejected one stopped at once
        assert_eq!(faulty.attempts(dropped.node()).len(), 4);
        assert_eq!(faulty.attempts(rejected.node()).len(), 1);
        assert_eq!(healthy.read_value().unwrap(), VariableValue::Double(3.0));

        let report = group.shutdown().await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "NegativeTrendData");
        assert!(report.failed[0].1.contains("NegativeTrendData"));
        let mut cancelled = report.cancelled;
        cancelled.sort();
        assert_eq!(cancelled, vec!["BooleanData", "PositiveTrendData"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_spaces_writes_by_period() {
        let (faulty, store) = setup();
        let var = Variable::create(&store, "BooleanData", true, VariableType::Boolean).unwrap();

        let period = Duration::from_secs(10);
        let mut group = TaskGroup::new();
        group.spawn("BooleanData", drive(var.clone(), Toggle::new(true, period)));

        tokio::time::sleep(Duration::from_secs(45)).await;
        group.shutdown().await;

        let attempts = faulty.attempts(var.node());
        assert_eq!(attempts.len(), 5);
        assert!(attempts.windows(2).all(|w| w[1] - w[0] >= period));
    }
}
