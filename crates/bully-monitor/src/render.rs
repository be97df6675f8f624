//! Projection of the status model onto a displayable view.
//!
//! Rendering is a pure function of the model and its indicators. It shows
//! exactly what the data says: a roster with no leader or with two leaders is
//! drawn as such, never corrected.

use crate::model::{
    ClusterSnapshot, ConnectionState, Indicators, LeaderChangeEvent, NodeId, NodeState, NodeStatus,
    ObserverStatus, StatusModel,
};
use std::fmt;

/// Everything the dashboard displays for one model state
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub observer: ObserverPanel,
    pub roster: RosterPanel,
    pub connection: ConnectionState,
    /// Non-blocking error lines, one per failing concern
    pub alerts: Vec<String>,
    /// Most recent leader change, if any
    pub notification: Option<String>,
}

/// Local node identity, role, leader and heartbeat age
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverPanel {
    /// No status has arrived yet
    Waiting,
    Ready {
        node_id: NodeId,
        role: RoleBadge,
        leader: String,
        heartbeat: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleBadge {
    Leader,
    Follower,
}

impl RoleBadge {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Follower => "FOLLOWER",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RosterPanel {
    /// Reported cluster size and leader, when the server sent them
    pub header: Option<String>,
    pub body: RosterBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterBody {
    /// No roster has arrived yet
    Loading,
    /// The server returned zero nodes
    Empty,
    Cards(Vec<NodeCard>),
}

/// One roster entry, in server order
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCard {
    pub node_id: NodeId,
    pub title: String,
    pub state: NodeState,
    pub icon: &'static str,
    pub label: &'static str,
    pub is_current: bool,
    pub address: Option<String>,
}

impl NodeCard {
    pub fn is_leader(&self) -> bool {
        self.state == NodeState::Leader
    }
}

pub const NO_LEADER_LABEL: &str = "No leader";
pub const THIS_NODE_LABEL: &str = "this node";

/// Project the model onto a view
pub fn render(model: &StatusModel, indicators: &Indicators) -> DashboardView {
    let mut alerts = Vec::new();
    if let Some(err) = &indicators.observer_error {
        alerts.push(format!("Node status unavailable ({})", err));
    }
    if let Some(err) = &indicators.roster_error {
        alerts.push(format!("Cluster status unavailable ({})", err));
    }

    DashboardView {
        observer: model.observer().map_or(ObserverPanel::Waiting, observer_panel),
        roster: model.roster().map_or(
            RosterPanel {
                header: None,
                body: RosterBody::Loading,
            },
            roster_panel,
        ),
        connection: indicators.connection,
        alerts,
        notification: indicators.last_leader_change.as_ref().map(leader_change_notice),
    }
}

/// Operator-facing text of a leader change; the term is shown when reported
pub fn leader_change_notice(event: &LeaderChangeEvent) -> String {
    match &event.term {
        Some(term) => format!("Node {} is the new leader (term {})", event.new_leader_id, term),
        None => format!("Node {} is the new leader", event.new_leader_id),
    }
}

fn observer_panel(status: &ObserverStatus) -> ObserverPanel {
    let leader = match &status.current_leader_id {
        Some(leader) if status.is_leader => format!("Node {} (me)", leader),
        Some(leader) => format!("Node {}", leader),
        None => NO_LEADER_LABEL.to_string(),
    };

    ObserverPanel::Ready {
        node_id: status.node_id.clone(),
        role: if status.is_leader {
            RoleBadge::Leader
        } else {
            RoleBadge::Follower
        },
        leader,
        heartbeat: heartbeat_age(status.seconds_since_last_heartbeat),
    }
}

/// Whole seconds since the last heartbeat, e.g. `"3s ago"`
pub fn heartbeat_age(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    format!("{}s ago", seconds.round() as u64)
}

fn roster_panel(snapshot: &ClusterSnapshot) -> RosterPanel {
    let header = match (snapshot.reported_size, &snapshot.reported_leader) {
        (None, None) => None,
        (size, leader) => Some(format!(
            "{} nodes, leader: {}",
            size.unwrap_or(snapshot.nodes.len()),
            leader.as_ref().map_or(NO_LEADER_LABEL.to_string(), |id| format!("Node {}", id))
        )),
    };

    let body = if snapshot.is_empty() {
        RosterBody::Empty
    } else {
        RosterBody::Cards(snapshot.nodes.iter().map(node_card).collect())
    };

    RosterPanel { header, body }
}

fn node_card(node: &NodeStatus) -> NodeCard {
    let (icon, label) = match node.state {
        NodeState::Leader => ("👑", "Leader"),
        NodeState::Follower => ("📡", "Follower"),
        NodeState::Unknown => ("❓", "Unknown"),
    };

    NodeCard {
        node_id: node.node_id.clone(),
        title: format!("Node {}", node.node_id),
        state: node.state,
        icon,
        label,
        is_current: node.is_current_observer,
        address: node.address.clone(),
    }
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Push channel: {}", self.connection)?;

        match &self.observer {
            ObserverPanel::Waiting => writeln!(f, "Node: waiting for status")?,
            ObserverPanel::Ready {
                node_id,
                role,
                leader,
                heartbeat,
            } => {
                writeln!(f, "Node: {} [{}]", node_id, role.label())?;
                writeln!(f, "Current leader: {}", leader)?;
                writeln!(f, "Last heartbeat: {}", heartbeat)?;
            }
        }

        if let Some(header) = &self.roster.header {
            writeln!(f, "Cluster: {}", header)?;
        }
        match &self.roster.body {
            RosterBody::Loading => writeln!(f, "  loading cluster status")?,
            RosterBody::Empty => writeln!(f, "  no nodes reported")?,
            RosterBody::Cards(cards) => {
                for card in cards {
                    write!(f, "  {} {} - {}", card.icon, card.title, card.label)?;
                    if card.is_current {
                        write!(f, " ({})", THIS_NODE_LABEL)?;
                    }
                    writeln!(f)?;
                }
            }
        }

        if let Some(notification) = &self.notification {
            writeln!(f, "Notice: {}", notification)?;
        }
        for alert in &self.alerts {
            writeln!(f, "Warning: {}", alert)?;
        }

        Ok(())
    }
}
