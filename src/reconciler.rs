//! Background reconciliation of due-date derived task state.
//!
//! Every tick scans the whole `tasks` table, re-derives `priority` and
//! `is_overdue` for each task that has a due date, and writes back only the
//! tasks whose derived state differs from what is stored. Failures never
//! leave this module: a failed read aborts the tick, a failed write or an
//! unparsable due date skips one task, and the loop keeps ticking until it is
//! cancelled.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::store::{SharedTaskStore, StoreError};
use crate::task::derive_state;

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome counts of a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: usize,
    pub updated: usize,
    /// Tasks with no due date, an unparsable one, or deleted mid-tick.
    pub skipped: usize,
    pub failed: usize,
}

pub struct Reconciler {
    store: SharedTaskStore,
    interval: Duration,
}

impl Reconciler {
    pub fn new(store: SharedTaskStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one reconciliation pass against the current time.
    pub async fn tick(&self) -> Result<TickSummary, StoreError> {
        self.tick_at(Utc::now()).await
    }

    /// Run one reconciliation pass as if the current time were `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickSummary, StoreError> {
        let tasks = self.store.fetch_all_tasks().await?;
        let mut summary = TickSummary {
            scanned: tasks.len(),
            ..TickSummary::default()
        };

        for task in tasks {
            let due = match task.parsed_due_date() {
                None => {
                    summary.skipped += 1;
                    continue;
                }
                Some(Ok(due)) => due,
                Some(Err(e)) => {
                    tracing::warn!(
                        task_id = %task.id,
                        due_date = task.due_date.as_deref().unwrap_or(""),
                        "Skipping task with unparsable due date: {}",
                        e
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            let (priority, is_overdue) = derive_state(due, now);
            if priority == task.priority && is_overdue == task.is_overdue {
                continue;
            }

            match self
                .store
                .update_task_derived_state(task.id, priority, is_overdue)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        task_id = %task.id,
                        %priority,
                        is_overdue,
                        "Reconciled task"
                    );
                    summary.updated += 1;
                }
                Err(StoreError::Missing(_)) => {
                    tracing::debug!(task_id = %task.id, "Task deleted before reconciliation");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(task_id = %task.id, "Failed to update derived state: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Tick every `interval` until `cancel` fires.
    ///
    /// The first tick runs immediately. Cancellation is observed between
    /// ticks; a tick that has started runs to completion.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            "Reconciler started (interval {}s)",
            self.interval.as_secs_f64()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(summary) => tracing::debug!(
                    scanned = summary.scanned,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Reconciliation tick complete"
                ),
                Err(e) => tracing::error!("Reconciliation tick aborted: {}", e),
            }
        }

        tracing::info!("Reconciler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
