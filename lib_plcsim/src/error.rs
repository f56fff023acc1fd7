//! # Error Types
//!
//! One enum per layer. `StoreError` comes back from the variable store,
//! `FeedError` from reading a track file, and `EngineError` is what a running
//! task reports to its `TaskGroup` when it gives up.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::{NodeId, VariableType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("type mismatch on {node}: declared {expected}, got {actual}")]
    TypeMismatch {
        node: NodeId,
        expected: VariableType,
        actual: VariableType,
    },

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown subscription {0}")]
    UnknownSubscription(u64),

    #[error("a variable named '{0}' already exists")]
    DuplicateName(String),

    #[error("node {0} is not writable by clients")]
    NotWritable(NodeId),

    #[error("variable store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Type mismatches are dropped by writers, everything else is fatal to them.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, StoreError::TypeMismatch { .. })
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot read track file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed track file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("track file {0} contains no waypoints")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{component}: write to '{variable}' failed: {source}")]
    Write {
        component: &'static str,
        variable: String,
        #[source]
        source: StoreError,
    },

    #[error("track feed failed: {0}")]
    FeedSource(#[from] FeedError),

    #[error("mirror subscription could not be established: {0}")]
    SubscriptionSetup(#[source] StoreError),

    #[error("variable setup failed: {0}")]
    Setup(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
