//! # Variable Handle
//!
//! A `Variable` is what the engine passes around instead of values: the node
//! id, the display name for logs, and the store the node lives in. Cloning it
//! is cheap and never copies the value.

use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::{NodeId, RetentionPolicy, VariableStore, VariableType, VariableValue};

#[derive(Clone)]
pub struct Variable {
    node: NodeId,
    name: Arc<str>,
    store: Arc<dyn VariableStore>,
}

impl Variable {
    /// Creates the variable in `store` and returns a handle to it.
    pub fn create(
        store: &Arc<dyn VariableStore>,
        name: &str,
        initial: impl Into<VariableValue>,
        ty: VariableType,
    ) -> Result<Self, StoreError> {
        let node = store.create_variable(name, initial.into(), ty)?;
        Ok(Self {
            node,
            name: Arc::from(name),
            store: Arc::clone(store),
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn VariableStore> {
        &self.store
    }

    pub fn write_value(&self, value: impl Into<VariableValue>) -> Result<(), StoreError> {
        self.store.write_value(self.node, value.into())
    }

    pub fn read_value(&self) -> Result<VariableValue, StoreError> {
        self.store.read_value(self.node)
    }

    pub fn set_writable(&self) -> Result<(), StoreError> {
        self.store.set_writable(self.node)
    }

    pub fn historize(&self, policy: RetentionPolicy) -> Result<(), StoreError> {
        self.store.historize(self.node, policy)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && Arc::ptr_eq(&self.store, &other.store)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("node", &self.node)
            .field("name", &self.name)
            .finish()
    }
}
