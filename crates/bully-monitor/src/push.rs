//! Socket.IO push channel to the status service

use crate::config::DashboardConfig;
use crate::error::{MonitorError, Result};
use crate::model::{LeaderChangeEvent, ObserverStatus};
use crate::reconciler::Update;
use crate::socketio::{self, Packet, SocketPacket};
use crate::wire;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

/// Notification delivered by the push channel, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Connection (re)established; anything missed must be pulled again
    Connected,
    Disconnected { reason: String },
    LeaderChanged(LeaderChangeEvent),
    ObserverBroadcast(ObserverStatus),
}

/// How a session ended
enum SessionEnd {
    /// Server closed the stream or the connection dropped
    Lost(String),
    /// Nobody listens to updates anymore
    Unsubscribed,
}

/// What the session does after one packet
enum Reaction {
    Continue,
    Reply(Message),
    End(SessionEnd),
}

/// Explicitly constructed push channel; one per dashboard
#[derive(Debug, Clone)]
pub struct PushChannel {
    url: String,
    session_cookie: Option<String>,
    reconnect_delay: Duration,
}

impl PushChannel {
    pub fn new<T: Into<String>>(url: T, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            session_cookie: None,
            reconnect_delay,
        }
    }

    /// Build the channel described by the configuration, if any
    pub fn from_config(config: &DashboardConfig) -> Option<Self> {
        config.push_url.as_ref().map(|url| Self {
            url: url.clone(),
            session_cookie: config.session_cookie.clone(),
            reconnect_delay: config.reconnect_delay,
        })
    }

    pub fn with_session_cookie<T: Into<String>>(mut self, cookie: T) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start delivering events into `updates` until unsubscribed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, updates: mpsc::UnboundedSender<Update>) -> PushSubscription {
        let channel = self.clone();
        let task = tokio::spawn(async move { channel.run(updates).await });

        PushSubscription { task: Some(task) }
    }

    async fn run(self, updates: mpsc::UnboundedSender<Update>) {
        tracing::info!("Subscribing to push channel at {}", self.url);

        loop {
            let reason = match self.session(&updates).await {
                Ok(SessionEnd::Unsubscribed) => return,
                Ok(SessionEnd::Lost(reason)) => reason,
                Err(e) => e.to_string(),
            };

            tracing::warn!(
                "Push channel disconnected ({}), retrying in {:?}",
                reason,
                self.reconnect_delay
            );
            if deliver(&updates, PushEvent::Disconnected { reason }).is_err() {
                return;
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn session(&self, updates: &mpsc::UnboundedSender<Update>) -> Result<SessionEnd> {
        let (stream, _) = tokio_tungstenite::connect_async(self.handshake_request()?).await?;
        let (mut write, mut read) = stream.split();

        // Until the open packet arrives nothing tells us the heartbeat period
        let mut liveness = socketio::OPEN_TIMEOUT;

        loop {
            let message = match tokio::time::timeout(liveness, read.next()).await {
                Ok(Some(message)) => message?,
                Ok(None) => return Ok(SessionEnd::Lost("stream ended".to_string())),
                Err(_) => return Ok(SessionEnd::Lost("heartbeat timed out".to_string())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return Ok(SessionEnd::Lost(reason));
                }
                _ => continue,
            };

            tracing::trace!("Push frame: {}", text);
            let packet = match socketio::decode_packet(&text) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::warn!("Dropping push frame: {}", e);
                    continue;
                }
            };

            match packet {
                Packet::Open(info) => {
                    tracing::debug!("Push session {} opened", info.sid);
                    liveness = info.liveness_window();
                    write.send(Message::Text(socketio::connect_frame())).await?;
                }
                Packet::Ping(payload) => {
                    write.send(Message::Text(socketio::pong_frame(&payload))).await?;
                }
                Packet::Close => {
                    return Ok(SessionEnd::Lost("session closed by server".to_string()));
                }
                Packet::Message(packet) if packet.is_default_namespace() => {
                    match self.on_socket_packet(packet, updates)? {
                        Reaction::Reply(reply) => write.send(reply).await?,
                        Reaction::Continue => {}
                        Reaction::End(end) => return Ok(end),
                    }
                }
                _ => {}
            }
        }
    }

    /// React to one packet of the default namespace
    fn on_socket_packet(
        &self,
        packet: SocketPacket,
        updates: &mpsc::UnboundedSender<Update>,
    ) -> Result<Reaction> {
        match packet {
            SocketPacket::Connect { .. } => {
                tracing::info!("Push channel connected to {}", self.url);
                if deliver(updates, PushEvent::Connected).is_err() {
                    return Ok(Reaction::End(SessionEnd::Unsubscribed));
                }
                Ok(Reaction::Reply(request_status_message()))
            }
            SocketPacket::ConnectError { message, .. } => Err(MonitorError::push_channel(
                format!("Connection refused: {}", message),
            )),
            SocketPacket::Disconnect { .. } => Ok(Reaction::End(SessionEnd::Lost(
                "disconnected by server".to_string(),
            ))),
            SocketPacket::Event { name, data, .. } => {
                let event = match wire::decode_push_event(&name, data) {
                    Ok(Some(event)) => event,
                    Ok(None) => return Ok(Reaction::Continue),
                    Err(e) => {
                        tracing::warn!("Dropping {} event: {}", name, e);
                        return Ok(Reaction::Continue);
                    }
                };

                let reaction = match &event {
                    PushEvent::LeaderChanged(change) => {
                        tracing::info!(
                            "Leader changed to node {} (term {})",
                            change.new_leader_id,
                            change.term.as_deref().unwrap_or("unknown")
                        );
                        Reaction::Reply(request_status_message())
                    }
                    _ => Reaction::Continue,
                };

                if deliver(updates, event).is_err() {
                    return Ok(Reaction::End(SessionEnd::Unsubscribed));
                }
                Ok(reaction)
            }
            SocketPacket::Unsupported { kind, .. } => {
                tracing::debug!("Ignoring Socket.IO packet type {}", kind);
                Ok(Reaction::Continue)
            }
        }
    }

    fn handshake_request(&self) -> Result<Request> {
        let mut request = socketio::endpoint_url(&self.url)?.into_client_request()?;

        if let Some(cookie) = &self.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| MonitorError::configuration(format!("Invalid session cookie: {}", e)))?;
            request.headers_mut().insert(header::COOKIE, value);
        }

        Ok(request)
    }
}

fn deliver(
    updates: &mpsc::UnboundedSender<Update>,
    event: PushEvent,
) -> std::result::Result<(), mpsc::error::SendError<Update>> {
    updates.send(Update::Push(event))
}

fn request_status_message() -> Message {
    Message::Text(socketio::event_frame(wire::REQUEST_STATUS_EVENT, None))
}

/// Live subscription to a push channel; released on `unsubscribe` or drop
#[derive(Debug)]
pub struct PushSubscription {
    task: Option<JoinHandle<()>>,
}

impl PushSubscription {
    pub fn is_active(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    /// Release the subscription and close the connection
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            tracing::info!("Unsubscribing from push channel");
            task.abort();
        }
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.release();
    }
}
