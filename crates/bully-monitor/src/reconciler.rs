//! Single writer of the status model.
//!
//! Pull results and push events arrive here in whatever order the network
//! delivers them. Each concern (observer status, cluster roster) is replaced
//! wholesale by its latest arrival, so an interleaving of stale and fresh
//! updates can never corrupt the other concern. Failures only raise an
//! indicator; the last good data stays on screen.

use crate::error::FetchError;
use crate::model::{
    ClusterSnapshot, ConnectionState, Indicators, LeaderChangeEvent, ObserverStatus, StatusModel,
};
use crate::push::PushEvent;
use crate::render::{self, DashboardView};
use std::fmt;
use std::sync::Arc;

/// Kind of pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullKind {
    ObserverStatus,
    ClusterSnapshot,
}

impl fmt::Display for PullKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObserverStatus => write!(f, "observer status"),
            Self::ClusterSnapshot => write!(f, "cluster snapshot"),
        }
    }
}

/// Issues pull requests on behalf of the reconciler and the scheduler.
///
/// Requests are fire-and-forget; results come back as [`Update`]s.
pub trait PullTrigger: Send + Sync {
    fn request_pull(&self, kind: PullKind);
}

/// Display surface fed by the reconciler
pub trait DashboardSink: Send {
    /// Show a freshly rendered view
    fn render(&mut self, view: &DashboardView);

    /// Surface a leader change to the operator, once per event
    fn notify(&mut self, _event: &LeaderChangeEvent) {}
}

/// Everything that can reach the reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    ObserverFetched(Result<ObserverStatus, FetchError>),
    ClusterFetched(Result<ClusterSnapshot, FetchError>),
    Push(PushEvent),
}

pub struct Reconciler {
    model: StatusModel,
    indicators: Indicators,
    pulls: Arc<dyn PullTrigger>,
    sink: Box<dyn DashboardSink>,
    renders: u64,
    disposed: bool,
}

impl Reconciler {
    pub fn new(pulls: Arc<dyn PullTrigger>, sink: Box<dyn DashboardSink>, push_enabled: bool) -> Self {
        let connection = if push_enabled {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disabled
        };

        Self {
            model: StatusModel::default(),
            indicators: Indicators::new(connection),
            pulls,
            sink,
            renders: 0,
            disposed: false,
        }
    }

    pub fn model(&self) -> &StatusModel {
        &self.model
    }

    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }

    /// Number of render passes so far
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Current view, without rendering it to the sink
    pub fn view(&self) -> DashboardView {
        render::render(&self.model, &self.indicators)
    }

    /// Route one update to its apply operation
    pub fn handle(&mut self, update: Update) {
        match update {
            Update::ObserverFetched(Ok(status)) => self.apply_observer_status(status),
            Update::ObserverFetched(Err(e)) => self.apply_fetch_failure(PullKind::ObserverStatus, e),
            Update::ClusterFetched(Ok(snapshot)) => self.apply_cluster_snapshot(snapshot),
            Update::ClusterFetched(Err(e)) => self.apply_fetch_failure(PullKind::ClusterSnapshot, e),
            Update::Push(PushEvent::Connected) => {
                self.apply_connection_change(ConnectionState::Connected)
            }
            Update::Push(PushEvent::Disconnected { .. }) => {
                self.apply_connection_change(ConnectionState::Disconnected)
            }
            Update::Push(PushEvent::LeaderChanged(event)) => self.apply_leader_change_event(event),
            Update::Push(PushEvent::ObserverBroadcast(status)) => self.apply_observer_status(status),
        }
    }

    /// Replace the observer concern with `status`
    pub fn apply_observer_status(&mut self, status: ObserverStatus) {
        if self.disposed {
            return;
        }

        tracing::debug!(
            "Applying observer status: node {}, leader {:?}",
            status.node_id,
            status.current_leader_id
        );
        self.model.replace_observer(status);
        self.indicators.observer_error = None;
        self.render();
    }

    /// Replace the roster concern with `snapshot`; never merged
    pub fn apply_cluster_snapshot(&mut self, snapshot: ClusterSnapshot) {
        if self.disposed {
            return;
        }

        tracing::debug!("Applying cluster snapshot with {} nodes", snapshot.nodes.len());
        self.model.replace_roster(snapshot);
        self.indicators.roster_error = None;
        self.render();
    }

    /// Notify and pull fresh ground truth; the roster itself is untouched
    pub fn apply_leader_change_event(&mut self, event: LeaderChangeEvent) {
        if self.disposed {
            return;
        }

        tracing::debug!(
            "Applying leader change to node {} (term {})",
            event.new_leader_id,
            event.term.as_deref().unwrap_or("unknown")
        );
        self.pulls.request_pull(PullKind::ClusterSnapshot);
        self.sink.notify(&event);
        self.indicators.last_leader_change = Some(event);
        self.render();
    }

    /// Keep the last good data and raise the concern's error indicator
    pub fn apply_fetch_failure(&mut self, kind: PullKind, error: FetchError) {
        if self.disposed {
            return;
        }

        tracing::warn!("Failed to fetch {}: {}", kind, error);
        match kind {
            PullKind::ObserverStatus => self.indicators.observer_error = Some(error),
            PullKind::ClusterSnapshot => self.indicators.roster_error = Some(error),
        }
        self.render();
    }

    /// Track push connectivity; a (re)connect pulls everything that may
    /// have been missed while disconnected
    pub fn apply_connection_change(&mut self, state: ConnectionState) {
        if self.disposed {
            return;
        }

        tracing::debug!("Push channel is now {}", state);
        if state == ConnectionState::Connected {
            self.pulls.request_pull(PullKind::ObserverStatus);
            self.pulls.request_pull(PullKind::ClusterSnapshot);
        }
        self.indicators.connection = state;
        self.render();
    }

    /// Render the current state without changing it
    pub fn refresh(&mut self) {
        if !self.disposed {
            self.render();
        }
    }

    /// Stop accepting updates; late arrivals are ignored from now on
    pub fn dispose(&mut self) {
        self.disposed = true;
    }

    fn render(&mut self) {
        let view = render::render(&self.model, &self.indicators);
        self.sink.render(&view);
        self.renders += 1;
    }
}
