//! # Mirror Engine
//!
//! Copies boolean state from an "original" variable onto a "copy" variable.
//! The original is opened for client writes and watched through a store
//! subscription; every sampled change is forwarded as-is to the copy.
//!
//! The engine is a two-state machine expressed in types: a [`MirrorEngine`] is
//! idle, and [`MirrorEngine::start`] turns it into a [`SubscribedMirror`],
//! which stays subscribed for as long as its task lives.

use std::time::Duration;

use crate::core::publish;
use crate::error::EngineError;
use crate::store::{DataChange, Subscription, Variable, VariableType};

const COMPONENT: &str = "mirror";

/// Publishing interval used by the plant's mirror.
pub const DEFAULT_MIRROR_INTERVAL: Duration = Duration::from_millis(500);

/// What happened to one change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    Forwarded,
    IgnoredForeignNode,
    RejectedNonBoolean,
}

/// Idle mirror, not yet subscribed.
#[derive(Debug)]
pub struct MirrorEngine {
    original: Variable,
    copy: Variable,
    interval: Duration,
}

impl MirrorEngine {
    pub fn new(original: Variable, copy: Variable, interval: Duration) -> Self {
        Self {
            original,
            copy,
            interval,
        }
    }

    /// Marks the original writable and subscribes to its changes.
    pub fn start(self) -> Result<SubscribedMirror, EngineError> {
        self.original
            .set_writable()
            .map_err(EngineError::SubscriptionSetup)?;

        let subscription = self
            .original
            .store()
            .create_subscription(self.interval)
            .map_err(EngineError::SubscriptionSetup)?;
        subscription
            .subscribe_to_changes(&self.original)
            .map_err(EngineError::SubscriptionSetup)?;

        tracing::info!(
            component = COMPONENT,
            original = self.original.name(),
            copy = self.copy.name(),
            subscription = %subscription.id(),
            interval_ms = self.interval.as_millis() as u64,
            "mirror subscribed"
        );

        Ok(SubscribedMirror {
            original: self.original,
            copy: self.copy,
            subscription,
        })
    }
}

/// Mirror with a live subscription on the original variable.
#[derive(Debug)]
pub struct SubscribedMirror {
    original: Variable,
    copy: Variable,
    subscription: Subscription,
}

impl SubscribedMirror {
    /// Consumes change notifications until cancelled or a forwarding write
    /// fails.
    pub async fn run(mut self) -> Result<(), EngineError> {
        loop {
            let change = self.subscription.recv().await;
            self.on_change(&change)?;
        }
    }

    /// Handles one notification. Only boolean changes of the original node are
    /// written to the copy; anything else is logged and dropped.
    pub fn on_change(&self, change: &DataChange) -> Result<MirrorOutcome, EngineError> {
        if change.node != self.original.node() {
            tracing::debug!(component = COMPONENT, node = %change.node, "change from foreign node ignored");
            return Ok(MirrorOutcome::IgnoredForeignNode);
        }

        if change.value.value_type() != VariableType::Boolean {
            tracing::error!(
                component = COMPONENT,
                variable = self.original.name(),
                value = %change.value,
                "node value is not boolean"
            );
            return Ok(MirrorOutcome::RejectedNonBoolean);
        }

        publish(&self.copy, change.value.clone(), COMPONENT)?;
        Ok(MirrorOutcome::Forwarded)
    }
}
