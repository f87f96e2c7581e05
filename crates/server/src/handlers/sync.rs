//! Background sync boundary. The agent has nothing to replay, so a sync
//! event is only acknowledged.

pub fn handle_sync(tag: &str) {
    tracing::info!(tag, "background sync");
}
