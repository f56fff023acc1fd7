//! # Value Generators
//!
//! Each generator is a small state machine that owns its simulation state and
//! its period. [`drive`] runs any of them against one [`Variable`]:
//! write the current value, sleep one period, advance, repeat.
//!
//! - **`toggle`**: flips a boolean every period.
//! - **`ramp`**: adds a fixed increment every period, never clamped.
//! - **`random_walk`**: redraws a uniform value in `[min, max]` every period.
//! - **`triangle`**: walks between `min` and `max` in fixed steps.
//!
//! Generators never stop on their own. The owning `TaskGroup` cancels them.

use std::time::Duration;

use crate::core::publish;
use crate::error::EngineError;
use crate::store::{Variable, VariableValue};

pub mod ramp;
pub mod random_walk;
pub mod toggle;
pub mod triangle;

pub use ramp::Ramp;
pub use random_walk::RandomWalk;
pub use toggle::Toggle;
pub use triangle::Triangle;

/// A periodic value producer.
pub trait Generator: Send {
    /// Short name used in log records.
    fn kind(&self) -> &'static str;

    /// The value to publish on this tick.
    fn current(&self) -> VariableValue;

    /// Moves to the next tick's value.
    fn advance(&mut self);

    /// Time between two writes.
    fn period(&self) -> Duration;
}

/// Runs `generator` against `variable` until the surrounding task is
/// cancelled or a write fails.
pub async fn drive<G: Generator>(variable: Variable, mut generator: G) -> Result<(), EngineError> {
    tracing::info!(
        component = generator.kind(),
        variable = variable.name(),
        period_ms = generator.period().as_millis() as u64,
        "generator started"
    );

    loop {
        publish(&variable, generator.current(), generator.kind())?;
        tokio::time::sleep(generator.period()).await;
        generator.advance();
    }
}
