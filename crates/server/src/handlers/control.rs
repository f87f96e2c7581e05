//! Control channel between the foreground application and the agent.
//!
//! `KEEP_ALIVE` is answered with `ALIVE` on the attached reply port within the
//! same handler call; the application uses the round trip to detect that the
//! agent was evicted. `ACTIVATE_NOW` (or its older name `SKIP_WAITING`) asks
//! for immediate activation. Everything else is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::Outbound;

/// A message posted by the application.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    KeepAlive {
        /// Sender's clock in epoch milliseconds. Any JSON value is accepted;
        /// only numbers are read.
        #[serde(default)]
        timestamp: Option<Value>,
    },
    #[serde(alias = "SKIP_WAITING")]
    ActivateNow,
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Decode a posted value. Returns `None` for anything that is not an
    /// object with a string `type`.
    pub fn parse(data: &Value) -> Option<Self> {
        if !data.get("type").is_some_and(Value::is_string) {
            return None;
        }
        match serde_json::from_value(data.clone()) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(error = %e, "undecodable control message");
                None
            }
        }
    }
}

/// Reply posted back on a message's port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Alive { timestamp: i64 },
}

/// The reply channel attached to a single message.
#[derive(Debug, Clone)]
pub struct ReplyPort {
    port: u64,
    out: UnboundedSender<Outbound>,
}

impl ReplyPort {
    pub fn new(port: u64, out: UnboundedSender<Outbound>) -> Self {
        Self { port, out }
    }

    /// Post a reply. A closed transport is not an error for the sender.
    pub fn post(&self, reply: ControlReply) {
        if self.out.send(Outbound::PortMessage { port: self.port, data: reply }).is_err() {
            tracing::debug!(port = self.port, "reply port closed");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Heartbeat handled (and answered if a port was attached).
    Alive,
    /// The caller should promote the waiting generation.
    ActivateRequested,
    Ignored,
}

/// Handle one posted message.
pub fn handle_message(data: &Value, port: Option<&ReplyPort>, now: DateTime<Utc>) -> ControlOutcome {
    match ControlMessage::parse(data) {
        Some(ControlMessage::KeepAlive { timestamp }) => {
            let sent = timestamp
                .as_ref()
                .and_then(Value::as_f64)
                .and_then(|millis| DateTime::<Utc>::from_timestamp_millis(millis as i64))
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".into());
            tracing::info!(sent = %sent, "heartbeat");
            if let Some(port) = port {
                port.post(ControlReply::Alive { timestamp: now.timestamp_millis() });
            }
            ControlOutcome::Alive
        }
        Some(ControlMessage::ActivateNow) => {
            tracing::info!("activation requested by application");
            ControlOutcome::ActivateRequested
        }
        Some(ControlMessage::Unknown) | None => ControlOutcome::Ignored,
    }
}
