//! Wire formats of the status service and the push channel.
//!
//! Payloads are decoded into loosely-typed transfer structs first and only
//! then validated into model types, so a missing field becomes a
//! `FetchError::MalformedData` instead of an undefined value in the model.

use crate::error::FetchError;
use crate::model::{ClusterSnapshot, LeaderChangeEvent, NodeId, NodeState, NodeStatus, ObserverStatus};
use crate::push::PushEvent;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Event name of a leader change notification
pub const LEADER_CHANGE_EVENT: &str = "lider_cambio";
/// Event name of an unsolicited status broadcast
pub const STATUS_BROADCAST_EVENT: &str = "bully_status";
/// Event name of the server greeting
pub const CONNECTED_EVENT: &str = "connected";
/// Event name of the "request current status" signal
pub const REQUEST_STATUS_EVENT: &str = "solicitar_bully_status";

/// Node ids arrive as numbers or strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Text(String),
}

impl From<WireId> for NodeId {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Int(n) => NodeId::new(n.to_string()),
            WireId::Text(s) => NodeId::new(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObserverStatusDto {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    node_id: Option<WireId>,
    #[serde(default)]
    is_leader: Option<bool>,
    #[serde(default)]
    current_leader: Option<WireId>,
    #[serde(default)]
    time_since_last_heartbeat: Option<f64>,
}

impl ObserverStatusDto {
    fn into_model(self) -> Result<ObserverStatus, FetchError> {
        if let Some(marker) = self.error {
            return Err(FetchError::service(marker_text(&marker)));
        }

        let node_id = self
            .node_id
            .ok_or_else(|| FetchError::malformed("observer status is missing node_id"))?;

        let heartbeat = self
            .time_since_last_heartbeat
            .filter(|secs| secs.is_finite())
            .unwrap_or(0.0)
            .max(0.0);

        Ok(ObserverStatus {
            node_id: node_id.into(),
            is_leader: self.is_leader.unwrap_or(false),
            current_leader_id: self.current_leader.map(NodeId::from),
            seconds_since_last_heartbeat: heartbeat,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NodeStatusDto {
    #[serde(default)]
    id: Option<WireId>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    is_current: Option<bool>,
    // Display metadata: a bad value drops only itself
    #[serde(default)]
    url: Option<Value>,
    #[serde(default)]
    tcp_port: Option<Value>,
}

impl NodeStatusDto {
    fn into_model(self, position: usize) -> Result<NodeStatus, FetchError> {
        let id = self.id.ok_or_else(|| {
            FetchError::malformed(format!("roster entry {} is missing id", position))
        })?;

        Ok(NodeStatus {
            node_id: id.into(),
            state: self.state.as_deref().map(NodeState::parse).unwrap_or_default(),
            is_current_observer: self.is_current.unwrap_or(false),
            address: self.url.as_ref().and_then(Value::as_str).map(str::to_string),
            tcp_port: self.tcp_port.as_ref().and_then(port_number),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ClusterSnapshotDto {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    nodes: Option<Vec<NodeStatusDto>>,
    #[serde(default)]
    cluster_size: Option<Value>,
    #[serde(default)]
    current_leader: Option<WireId>,
}

impl ClusterSnapshotDto {
    fn into_model(self) -> Result<ClusterSnapshot, FetchError> {
        if let Some(marker) = self.error {
            return Err(FetchError::service(marker_text(&marker)));
        }

        let nodes = self
            .nodes
            .ok_or_else(|| FetchError::malformed("cluster snapshot is missing nodes"))?
            .into_iter()
            .enumerate()
            .map(|(position, node)| node.into_model(position))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ClusterSnapshot {
            nodes,
            reported_size: self
                .cluster_size
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|size| usize::try_from(size).ok()),
            reported_leader: self.current_leader.map(NodeId::from),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LeaderChangeDto {
    #[serde(default, alias = "new_leader")]
    nuevo_lider: Option<WireId>,
    #[serde(default)]
    term: Option<Value>,
}

impl LeaderChangeDto {
    fn into_model(self) -> Result<LeaderChangeEvent, FetchError> {
        let leader = self
            .nuevo_lider
            .ok_or_else(|| FetchError::malformed("leader change is missing the new leader"))?;

        Ok(LeaderChangeEvent {
            new_leader_id: leader.into(),
            term: self.term.filter(|term| !term.is_null()).map(|term| marker_text(&term)),
        })
    }
}

fn port_number(raw: &Value) -> Option<u16> {
    match raw {
        Value::Number(n) => n.as_u64().and_then(|port| u16::try_from(port).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn marker_text(marker: &Value) -> String {
    match marker {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::malformed(format!("invalid JSON: {}", e)))
}

/// Decode the single-node status payload
pub fn decode_observer_status(body: &[u8]) -> Result<ObserverStatus, FetchError> {
    decode::<ObserverStatusDto>(body)?.into_model()
}

/// Decode the cluster roster payload
pub fn decode_cluster_snapshot(body: &[u8]) -> Result<ClusterSnapshot, FetchError> {
    decode::<ClusterSnapshotDto>(body)?.into_model()
}

/// Extract the `error` marker from a response body, if there is one
pub fn error_marker(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("error").filter(|v| !v.is_null()).map(marker_text)
}

/// Decode the payload of one named push event.
///
/// `Ok(None)` means the event is valid but carries nothing to reconcile.
pub fn decode_push_event(event: &str, data: Value) -> Result<Option<PushEvent>, FetchError> {
    match event {
        LEADER_CHANGE_EVENT => {
            let dto: LeaderChangeDto = serde_json::from_value(data)
                .map_err(|e| FetchError::malformed(format!("invalid leader change: {}", e)))?;
            Ok(Some(PushEvent::LeaderChanged(dto.into_model()?)))
        }
        STATUS_BROADCAST_EVENT => {
            let dto: ObserverStatusDto = serde_json::from_value(data)
                .map_err(|e| FetchError::malformed(format!("invalid status broadcast: {}", e)))?;
            Ok(Some(PushEvent::ObserverBroadcast(dto.into_model()?)))
        }
        CONNECTED_EVENT => {
            tracing::debug!("Push channel greeting: {}", data);
            Ok(None)
        }
        other => {
            tracing::debug!("Ignoring push event {}", other);
            Ok(None)
        }
    }
}
