//! # lib_plcsim
//!
//! The simulation engine behind `server_plc`, a stand-in for a process-control
//! endpoint. It publishes a handful of named, typed variables and keeps them
//! moving:
//!
//! - **`store`**: the variable store contract (`VariableStore`) and the
//!   in-memory implementation used by the server and the tests.
//! - **`generators`**: independent periodic value producers (toggle, ramp,
//!   random, triangular wave), each owning its own state.
//! - **`core`**: the change mirror, the task group that runs everything under a
//!   single cancellation signal, and the `Simulation` that wires the plant.
//! - **`ingestors`**: track file replay, turning waypoints into timed position
//!   writes.
//!
//! Configuration and logging setup live behind the `configs` and `loggers`
//! features.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod core;
pub mod error;
pub mod generators;
pub mod ingestors;
pub mod store;

#[cfg(feature = "configs")]
pub mod configs;
#[cfg(feature = "loggers")]
pub mod loggers;

// Re-export the pieces most callers need
pub use error::{EngineError, FeedError, StoreError};
pub use store::{MemoryStore, NodeId, Variable, VariableStore, VariableType, VariableValue};
