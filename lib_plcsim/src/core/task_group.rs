//! # Task Group
//!
//! Every long-running engine component runs as a named task inside one
//! `TaskGroup`. The group owns a single `CancellationToken`; cancelling it stops
//! all tasks together. A task is dropped at whatever await point it is
//! suspended on, which closes anything it owns (track readers, subscriptions).
//!
//! A task that returns an error or panics is logged under its name and
//! counted in the [`GroupReport`]. Its siblings keep running.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// How a task left the group.
#[derive(Debug)]
pub enum TaskExit {
    Completed,
    Cancelled,
    Failed(EngineError),
    Panicked(String),
}

#[derive(Debug, Default)]
pub struct GroupReport {
    pub completed: Vec<String>,
    pub cancelled: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl GroupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<(String, TaskExit)>,
    // Resolves the name of a task that panicked.
    names: HashMap<Id, String>,
    // Exits observed so far. Survives a `wait` that is dropped mid-way.
    report: GroupReport,
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Builds a group that is cancelled along with `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            tasks: JoinSet::new(),
            names: HashMap::new(),
            report: GroupReport::default(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawns `task` under `name`. The task is raced against the group's
    /// cancellation token.
    pub fn spawn<F>(&mut self, name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let name = name.into();
        let token = self.token.clone();
        tracing::debug!(task = %name, "spawning");

        let task_name = name.clone();
        let handle = self.tasks.spawn(async move {
            let exit = tokio::select! {
                biased;
                _ = token.cancelled() => TaskExit::Cancelled,
                result = task => match result {
                    Ok(()) => TaskExit::Completed,
                    Err(e) => TaskExit::Failed(e),
                },
            };
            (task_name, exit)
        });
        self.names.insert(handle.id(), name);
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits until every task has exited, logging each exit as it happens.
    ///
    /// Exits are collected inside the group, so a `wait` that is dropped early
    /// (for example when it loses a `select!`) loses nothing: the next `wait`
    /// or [`TaskGroup::shutdown`] reports them.
    pub async fn wait(&mut self) -> GroupReport {
        while let Some(joined) = self.tasks.join_next_with_id().await {
            let (name, exit) = match joined {
                Ok((id, (name, exit))) => {
                    self.names.remove(&id);
                    (name, exit)
                }
                Err(e) => {
                    let name = self
                        .names
                        .remove(&e.id())
                        .unwrap_or_else(|| format!("task {}", e.id()));
                    let exit = if e.is_cancelled() {
                        TaskExit::Cancelled
                    } else {
                        TaskExit::Panicked(e.to_string())
                    };
                    (name, exit)
                }
            };
            self.record(name, exit);
        }
        std::mem::take(&mut self.report)
    }

    fn record(&mut self, name: String, exit: TaskExit) {
        let report = &mut self.report;
        match exit {
            TaskExit::Completed => {
                tracing::info!(task = %name, "task finished");
                report.completed.push(name);
            }
            TaskExit::Cancelled => {
                tracing::debug!(task = %name, "task cancelled");
                report.cancelled.push(name);
            }
            TaskExit::Failed(e) => {
                tracing::error!(task = %name, error = %e, "task failed");
                report.failed.push((name, e.to_string()));
            }
            TaskExit::Panicked(msg) => {
                tracing::error!(task = %name, error = %msg, "task panicked");
                report.failed.push((name, msg));
            }
        }
    }

    /// Cancels the group and waits for every task to observe it.
    pub async fn shutdown(mut self) -> GroupReport {
        self.cancel();
        self.wait().await
    }
}
