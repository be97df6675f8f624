//! Bully Cluster Monitor
//!
//! This crate observes a cluster running the Bully leader-election algorithm
//! and keeps a consistent view of who leads and what state every node is in.
//! Two unordered channels feed it: periodic pulls of full status snapshots
//! and a push channel of leader-change and status notifications. It never
//! takes part in the election; it only displays what the cluster reports.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod push;
pub mod reconciler;
pub mod render;
pub mod scheduler;
pub mod socketio;
pub mod wire;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardHandle};
pub use error::{FetchError, MonitorError, Result};
pub use fetcher::{HttpSnapshotFetcher, SnapshotFetcher};
pub use model::{
    ClusterSnapshot, ConnectionState, Indicators, LeaderChangeEvent, NodeId, NodeState, NodeStatus,
    ObserverStatus, StatusModel,
};
pub use push::{PushChannel, PushEvent, PushSubscription};
pub use reconciler::{DashboardSink, PullKind, PullTrigger, Reconciler, Update};
pub use render::{render, DashboardView, NodeCard, ObserverPanel, RoleBadge, RosterBody, RosterPanel};
pub use scheduler::{FetchDispatcher, Scheduler, SchedulerState};
