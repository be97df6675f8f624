//! Socket.IO packets over a plain websocket transport.
//!
//! The status service runs Flask-SocketIO, so every websocket text frame is
//! an Engine.IO v4 packet (`0` open, `1` close, `2`/`3` ping/pong, `4`
//! message) and every message carries a Socket.IO v5 packet (`40` namespace
//! connect, `42["event",data]` event). Only the default namespace and text
//! packets are supported.

use crate::error::{FetchError, MonitorError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const ENGINE_IO_VERSION: &str = "4";

/// Path the server mounts its endpoint on unless the URL names another
pub const DEFAULT_PATH: &str = "/socket.io/";

const DEFAULT_NAMESPACE: &str = "/";

/// How long to wait for the server's open packet
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(20);

/// Session parameters from the server's open packet
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Longest silence after which the server counts as gone
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    /// Upgrade and noop packets; meaningless on a websocket-only session
    Noop,
}

/// Socket.IO packet carried in an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event { namespace: String, name: String, data: Value },
    ConnectError { namespace: String, message: String },
    /// Acks and binary packets, which the status service never sends
    Unsupported { namespace: String, kind: char },
}

impl SocketPacket {
    /// Whether the packet belongs to the default namespace
    pub fn is_default_namespace(&self) -> bool {
        let namespace = match self {
            Self::Connect { namespace }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::ConnectError { namespace, .. }
            | Self::Unsupported { namespace, .. } => namespace,
        };
        namespace == DEFAULT_NAMESPACE
    }
}

/// Decode one websocket text frame
pub fn decode_packet(text: &str) -> std::result::Result<Packet, FetchError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| FetchError::malformed("empty Engine.IO packet"))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(Packet::Open)
            .map_err(|e| FetchError::malformed(format!("invalid open packet: {}", e))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping(rest.to_string())),
        '3' => Ok(Packet::Pong(rest.to_string())),
        '4' => decode_socket_packet(rest).map(Packet::Message),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(FetchError::malformed(format!(
            "unknown Engine.IO packet type '{}'",
            other
        ))),
    }
}

fn decode_socket_packet(text: &str) -> std::result::Result<SocketPacket, FetchError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| FetchError::malformed("empty Socket.IO packet"))?;
    let mut rest = chars.as_str();

    let namespace = if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        let namespace = rest[..end].to_string();
        rest = rest.get(end + 1..).unwrap_or("");
        namespace
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    // Optional ack id
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let args: Vec<Value> = serde_json::from_str(rest)
                .map_err(|e| FetchError::malformed(format!("invalid event packet: {}", e)))?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(FetchError::malformed("event packet without a name")),
            };

            Ok(SocketPacket::Event {
                namespace,
                name,
                data: args.next().unwrap_or(Value::Null),
            })
        }
        '4' => {
            let message = match serde_json::from_str::<Value>(rest) {
                Ok(Value::Object(map)) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connection refused")
                    .to_string(),
                Ok(Value::String(message)) => message,
                _ => rest.to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        '3' | '5' | '6' => Ok(SocketPacket::Unsupported { namespace, kind }),
        other => Err(FetchError::malformed(format!(
            "unknown Socket.IO packet type '{}'",
            other
        ))),
    }
}

/// Join the default namespace
pub fn connect_frame() -> String {
    "40".to_string()
}

/// Answer a server ping, echoing its payload
pub fn pong_frame(payload: &str) -> String {
    format!("3{}", payload)
}

/// Emit `name` on the default namespace
pub fn event_frame(name: &str, data: Option<&Value>) -> String {
    let args = match data {
        Some(data) => Value::Array(vec![Value::from(name), data.clone()]),
        None => Value::Array(vec![Value::from(name)]),
    };
    format!("42{}", args)
}

/// Websocket endpoint for a configured push URL.
///
/// A bare host gets the default Socket.IO path; the Engine.IO version and
/// transport are always set.
pub fn endpoint_url(push_url: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(push_url)
        .map_err(|e| MonitorError::configuration(format!("Invalid push URL: {}", e)))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path(DEFAULT_PATH);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "EIO" && key != "transport")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &kept {
            query.append_pair(key, value);
        }
        query
            .append_pair("EIO", ENGINE_IO_VERSION)
            .append_pair("transport", "websocket");
    }

    Ok(url.to_string())
}
