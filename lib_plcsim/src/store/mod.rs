//! # Variable Store
//!
//! The address space the engine writes into. The protocol server owns the real
//! thing; the engine only talks to it through [`VariableStore`], so anything
//! that can create typed variables, accept writes, push change notifications
//! and keep history can sit behind it.
//!
//! [`MemoryStore`] is the in-process implementation used by `server_plc` and by
//! the tests. [`Variable`] is the handle every generator, the mirror and the
//! track feed hold: a node id plus a reference back to its store. Nothing in the
//! engine caches a variable's value; reads always go to the store.

use std::time::Duration;

use crate::error::StoreError;

pub mod memory;
pub mod subscription;
pub mod types;
pub mod variable;

pub use memory::MemoryStore;
pub use subscription::{DataChange, Subscription, SubscriptionId};
pub use types::{HistoryEntry, NodeId, RetentionPolicy, VariableInfo, VariableType, VariableValue};
pub use variable::Variable;

/// Operations the engine consumes from the server that owns the variables.
///
/// Implementations must accept calls from many tasks at once. Writes to
/// different variables need no coordination from the caller.
pub trait VariableStore: Send + Sync {
    /// Registers a new variable. The initial value must match `ty`.
    fn create_variable(
        &self,
        name: &str,
        initial: VariableValue,
        ty: VariableType,
    ) -> Result<NodeId, StoreError>;

    /// Writes a value. Fails with [`StoreError::TypeMismatch`] when the value's
    /// type differs from the declared one.
    fn write_value(&self, node: NodeId, value: VariableValue) -> Result<(), StoreError>;

    fn read_value(&self, node: NodeId) -> Result<VariableValue, StoreError>;

    /// Allows remote clients to write the variable.
    fn set_writable(&self, node: NodeId) -> Result<(), StoreError>;

    /// Opens a change subscription sampled every `interval`.
    fn create_subscription(&self, interval: Duration) -> Result<Subscription, StoreError>;

    /// Starts reporting value changes of `node` to `subscription`. The current
    /// value is reported first.
    fn subscribe_to_changes(
        &self,
        subscription: SubscriptionId,
        node: NodeId,
    ) -> Result<(), StoreError>;

    fn historize(&self, node: NodeId, policy: RetentionPolicy) -> Result<(), StoreError>;

    /// Historized values of `node`, oldest first.
    fn read_history(&self, node: NodeId) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Every variable with its current value, in creation order.
    fn snapshot(&self) -> Result<Vec<VariableInfo>, StoreError>;
}
