//! Platform event handlers.
//!
//! Each handler takes one event plus the store/network handles it needs and
//! returns a description of what must happen next: a response to hand back,
//! background work the runtime must keep alive, or platform actions for the
//! host to perform. Handlers never talk to the transport themselves.

pub mod control;
pub mod fetch;
pub mod lifecycle;
pub mod notification;
pub mod sync;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use control::{ControlMessage, ControlOutcome, ControlReply, ReplyPort, handle_message};
pub use fetch::{FetchDisposition, FetchReply, ResponseSource, handle_fetch};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleController, LifecycleState};
pub use notification::{NotificationOptions, handle_notification_click, handle_push};
pub use sync::handle_sync;

/// Work that must run to completion after its handler has returned.
pub type BackgroundTask = BoxFuture<'static, ()>;

/// A side effect the host platform performs on the agent's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformAction {
    /// Display a notification.
    ShowNotification { title: String, options: NotificationOptions },
    /// Dismiss the notification that was interacted with.
    CloseNotification {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// Focus the application at `url`, opening a new instance if none exists.
    OpenWindow { url: String },
    /// Route requests from already-open sessions through this agent now.
    ClaimClients,
}
