//! Newline-delimited JSON frames exchanged with the host over stdio.
//!
//! Inbound frames carry an `id` and an `event`; every inbound frame except
//! `shutdown` is answered by exactly one outbound frame with the same `id`.
//! Port messages are sent in addition, while the event is being handled.

use roadcache_core::{CachedResponse, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WireError;
use crate::handlers::{ControlReply, LifecycleState, PlatformAction, ResponseSource};

/// A platform event delivered to the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Install,
    Activate,
    Fetch {
        request: Request,
    },
    Message {
        #[serde(default)]
        data: Value,
        /// Reply port attached by the sender, if any.
        #[serde(default)]
        port: Option<u64>,
    },
    Push {
        #[serde(default)]
        data: Option<String>,
    },
    NotificationClick {
        #[serde(default)]
        tag: Option<String>,
    },
    Sync {
        tag: String,
    },
    /// Stop reading, finish in-flight work, exit.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Inbound {
    #[serde(default)]
    pub id: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// Response snapshot as sent to the host. The body is hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body_hex: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<String>,
}

impl From<CachedResponse> for WireResponse {
    fn from(response: CachedResponse) -> Self {
        Self {
            url: response.url,
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body_hex: hex::encode(&response.body),
            kind: response.kind.as_str().to_string(),
            stored_at: response.stored_at,
        }
    }
}

/// A frame written to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    /// A lifecycle event completed.
    Done {
        id: u64,
        state: LifecycleState,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        purged: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        actions: Vec<PlatformAction>,
    },
    Failed {
        id: u64,
        error: WireError,
    },
    Respond {
        id: u64,
        source: ResponseSource,
        response: WireResponse,
    },
    /// The host should perform the request itself.
    Passthrough {
        id: u64,
    },
    NetworkError {
        id: u64,
        error: WireError,
    },
    PortMessage {
        port: u64,
        data: ControlReply,
    },
    Actions {
        id: u64,
        actions: Vec<PlatformAction>,
    },
    Ignored {
        id: u64,
    },
    ProtocolError {
        error: WireError,
    },
}
