//! Periodic pulls and the dispatcher that runs them

use crate::fetcher::SnapshotFetcher;
use crate::reconciler::{PullKind, PullTrigger, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Runs every pull as its own task and hands the result to the reconciler.
///
/// Pulls of the same kind may overlap; whichever resolves last is applied
/// last. Results that resolve after teardown are dropped.
#[derive(Clone)]
pub struct FetchDispatcher {
    fetcher: Arc<dyn SnapshotFetcher>,
    updates: mpsc::UnboundedSender<Update>,
}

impl FetchDispatcher {
    pub fn new(fetcher: Arc<dyn SnapshotFetcher>, updates: mpsc::UnboundedSender<Update>) -> Self {
        Self { fetcher, updates }
    }
}

impl PullTrigger for FetchDispatcher {
    fn request_pull(&self, kind: PullKind) {
        let fetcher = self.fetcher.clone();
        let updates = self.updates.clone();

        tokio::spawn(async move {
            tracing::trace!("Pulling {}", kind);
            let update = match kind {
                PullKind::ObserverStatus => Update::ObserverFetched(fetcher.fetch_observer_status().await),
                PullKind::ClusterSnapshot => Update::ClusterFetched(fetcher.fetch_cluster_snapshot().await),
            };

            if updates.send(update).is_err() {
                tracing::debug!("Dropping {} that resolved after teardown", kind);
            }
        });
    }
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer armed
    Idle,
    /// Periodic timer armed
    Running,
}

/// Drives one observer pull and one roster pull per tick
pub struct Scheduler {
    interval: Duration,
    pulls: Arc<dyn PullTrigger>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(interval: Duration, pulls: Arc<dyn PullTrigger>) -> Self {
        Self {
            interval,
            pulls,
            timer: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        if self.timer.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Arm the periodic timer; the first tick fires immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.timer.is_some() {
            return;
        }

        tracing::info!("Starting status refresh every {:?}", self.interval);
        let pulls = self.pulls.clone();
        let period = self.interval;

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                // Issued independently; a slow pull never delays the other
                pulls.request_pull(PullKind::ObserverStatus);
                pulls.request_pull(PullKind::ClusterSnapshot);
            }
        }));
    }

    /// Cancel the timer
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            tracing::info!("Stopping status refresh");
            timer.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
