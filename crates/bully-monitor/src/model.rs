//! Observed cluster status

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// State of a node as reported by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeState {
    Leader,
    Follower,
    #[default]
    Unknown,
}

impl NodeState {
    /// Parse a remote state string; anything unrecognized is `Unknown`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "leader" => Self::Leader,
            "follower" => Self::Follower,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leader => write!(f, "leader"),
            Self::Follower => write!(f, "follower"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One entry of the cluster roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub state: NodeState,
    /// True only for the node serving this dashboard
    pub is_current_observer: bool,
    /// Display-only address metadata
    pub address: Option<String>,
    pub tcp_port: Option<u16>,
}

impl NodeStatus {
    pub fn new(node_id: impl Into<NodeId>, state: NodeState) -> Self {
        Self {
            node_id: node_id.into(),
            state,
            is_current_observer: false,
            address: None,
            tcp_port: None,
        }
    }

    pub fn observed(mut self) -> Self {
        self.is_current_observer = true;
        self
    }
}

/// Self-report of the node serving this dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverStatus {
    pub node_id: NodeId,
    pub is_leader: bool,
    pub current_leader_id: Option<NodeId>,
    pub seconds_since_last_heartbeat: f64,
}

/// Full roster returned by one pull, in server order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub nodes: Vec<NodeStatus>,
    /// Cluster size as reported by the server, display only
    pub reported_size: Option<usize>,
    /// Leader as reported by the server, display only
    pub reported_leader: Option<NodeId>,
}

impl ClusterSnapshot {
    pub fn new(nodes: Vec<NodeStatus>) -> Self {
        Self {
            nodes,
            reported_size: None,
            reported_leader: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes claiming leadership; zero or several is possible mid-election
    pub fn leaders(&self) -> impl Iterator<Item = &NodeStatus> {
        self.nodes.iter().filter(|node| node.state == NodeState::Leader)
    }
}

/// Leader change notification from the push channel.
///
/// `term` is display-only and never used to order events; the service may
/// omit it or send it in any JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderChangeEvent {
    pub new_leader_id: NodeId,
    pub term: Option<String>,
}

impl LeaderChangeEvent {
    pub fn new(new_leader_id: impl Into<NodeId>) -> Self {
        Self {
            new_leader_id: new_leader_id.into(),
            term: None,
        }
    }

    pub fn with_term<T: ToString>(mut self, term: T) -> Self {
        self.term = Some(term.to_string());
        self
    }
}

/// Last-known view of the cluster.
///
/// Each concern is replaced wholesale by its most recent arrival. Only the
/// reconciler can write it; everybody else sees a shared reference or a copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusModel {
    observer: Option<ObserverStatus>,
    roster: Option<ClusterSnapshot>,
}

impl StatusModel {
    pub fn observer(&self) -> Option<&ObserverStatus> {
        self.observer.as_ref()
    }

    pub fn roster(&self) -> Option<&ClusterSnapshot> {
        self.roster.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.observer.is_none() && self.roster.is_none()
    }

    pub(crate) fn replace_observer(&mut self, status: ObserverStatus) {
        self.observer = Some(status);
    }

    pub(crate) fn replace_roster(&mut self, snapshot: ClusterSnapshot) {
        self.roster = Some(snapshot);
    }
}

/// State of the push channel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No push channel configured
    Disabled,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Non-data flags shown next to the model: errors, connectivity, alerts
#[derive(Debug, Clone, PartialEq)]
pub struct Indicators {
    pub observer_error: Option<FetchError>,
    pub roster_error: Option<FetchError>,
    pub connection: ConnectionState,
    pub last_leader_change: Option<LeaderChangeEvent>,
}

impl Indicators {
    pub fn new(connection: ConnectionState) -> Self {
        Self {
            observer_error: None,
            roster_error: None,
            connection,
            last_leader_change: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.observer_error.is_some() || self.roster_error.is_some()
    }
}
