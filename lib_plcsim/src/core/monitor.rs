//! Periodic dump of every variable into the log.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::error::EngineError;
use crate::store::{VariableInfo, VariableStore};

/// Logs a snapshot of `store` every `every`. Never returns on its own.
pub async fn run(store: Arc<dyn VariableStore>, every: Duration) -> Result<(), EngineError> {
    let mut ticker = interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so the plant has started writing.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match store.snapshot() {
            Ok(vars) => tracing::info!(target: "snapshot", "{}", format_snapshot(&vars)),
            Err(e) => tracing::warn!(component = "monitor", error = %e, "snapshot failed"),
        }
    }
}

/// `Name=value` pairs in creation order, on one line.
pub fn format_snapshot(vars: &[VariableInfo]) -> String {
    vars.iter()
        .map(|v| format!("{}={}", v.name, v.value))
        .collect::<Vec<_>>()
        .join(" ")
}
