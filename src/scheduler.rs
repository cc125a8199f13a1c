//! Periodic evaluation
//!
//! Runs `analyze_recent` for each scheduled user on a fixed cadence. Each
//! user gets one tokio task, and each evaluation runs on the blocking pool so
//! a slow collaborator never stalls the runtime. Cancelling stops future runs
//! while a run already in progress finishes. Expected outcomes such as
//! missing data are logged at debug level and do not stop the schedule.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerConfig;
use crate::error::{Result, WellbeingError};
use crate::pipeline::WellbeingEngine;
use crate::types::UserId;

struct ScheduledTask {
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct EvaluationScheduler {
    engine: Arc<WellbeingEngine>,
    interval: Duration,
    tasks: Mutex<HashMap<UserId, ScheduledTask>>,
}

impl EvaluationScheduler {
    pub fn new(engine: Arc<WellbeingEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(engine: Arc<WellbeingEngine>, config: &SchedulerConfig) -> Self {
        Self::new(engine, config.interval())
    }

    /// Start evaluating `user_id` every interval, beginning immediately.
    ///
    /// Returns `false` if the user was already scheduled. Must be called from
    /// within a tokio runtime.
    pub fn schedule(&self, user_id: &str) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WellbeingError::Config(format!("scheduler needs a tokio runtime: {e}")))?;

        let mut tasks = self.tasks.lock().map_err(|_| tasks_poisoned())?;
        if tasks.get(user_id).is_some_and(|t| !t.handle.is_finished()) {
            return Ok(false);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = runtime.spawn(run_evaluations(
            Arc::clone(&self.engine),
            user_id.to_string(),
            self.interval,
            cancel_rx,
        ));
        tasks.insert(user_id.to_string(), ScheduledTask { cancel_tx, handle });

        tracing::info!(user_id, interval_secs = self.interval.as_secs(), "evaluation scheduled");
        Ok(true)
    }

    /// Stop future evaluations for `user_id`. Returns `false` if it was not
    /// scheduled.
    pub fn cancel(&self, user_id: &str) -> Result<bool> {
        let removed = self
            .tasks
            .lock()
            .map_err(|_| tasks_poisoned())?
            .remove(user_id);

        match removed {
            Some(task) => {
                let _ = task.cancel_tx.send(true);
                tracing::info!(user_id, "evaluation cancelled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Users with a live schedule, sorted
    pub fn scheduled_users(&self) -> Result<Vec<UserId>> {
        let tasks = self.tasks.lock().map_err(|_| tasks_poisoned())?;
        let mut users: Vec<UserId> = tasks
            .iter()
            .filter(|(_, t)| !t.handle.is_finished())
            .map(|(u, _)| u.clone())
            .collect();
        users.sort();
        Ok(users)
    }

    /// Cancel every schedule and wait for in-flight runs to finish
    pub async fn shutdown(&self) -> Result<()> {
        let drained: Vec<(UserId, ScheduledTask)> = self
            .tasks
            .lock()
            .map_err(|_| tasks_poisoned())?
            .drain()
            .collect();

        for (_, task) in &drained {
            let _ = task.cancel_tx.send(true);
        }
        for (user_id, task) in drained {
            if let Err(e) = task.handle.await {
                tracing::warn!(%user_id, error = %e, "evaluation task ended abnormally");
            }
        }

        tracing::info!("evaluation scheduler stopped");
        Ok(())
    }
}

async fn run_evaluations(
    engine: Arc<WellbeingEngine>,
    user_id: UserId,
    interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = cancel_rx.changed() => {
                // A dropped sender also stops the loop
                if changed.is_err() || *cancel_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                // Collaborator calls and the per-user lock block, so the run
                // goes to the blocking pool. Awaiting it here lets an
                // in-flight run finish even if a cancel arrives meanwhile.
                let run_engine = Arc::clone(&engine);
                let run_user = user_id.clone();
                let outcome =
                    tokio::task::spawn_blocking(move || run_engine.analyze_recent(&run_user)).await;

                match outcome {
                    Ok(Ok(result)) => tracing::debug!(
                        %user_id,
                        status = result.status.as_str(),
                        "scheduled evaluation complete"
                    ),
                    Ok(Err(e)) if e.is_recoverable() => {
                        tracing::debug!(%user_id, error = %e, "scheduled evaluation skipped")
                    }
                    Ok(Err(e)) => tracing::warn!(%user_id, error = %e, "scheduled evaluation failed"),
                    Err(e) => tracing::warn!(%user_id, error = %e, "scheduled evaluation task failed"),
                }
            }
        }
    }

    tracing::debug!(%user_id, "evaluation loop ended");
}

fn tasks_poisoned() -> WellbeingError {
    WellbeingError::Collaborator("scheduler task table poisoned".to_string())
}
