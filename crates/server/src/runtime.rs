//! Newline-delimited JSON transport between the host and the agent.
//!
//! Every inbound line is decoded and handled on its own task, so a slow
//! network fetch never holds up a heartbeat. All outbound frames go through
//! one writer task fed by an unbounded channel.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;

use crate::agent::{Agent, actions_of};
use crate::error::{ProtocolError, WireError};
use crate::protocol::{Event, Inbound, Outbound};

/// Serve host frames from `reader` until EOF or a `shutdown` event.
///
/// In-flight events are answered and background work is drained before this
/// returns.
pub async fn serve<R, W>(agent: Arc<Agent>, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out, rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(writer, rx));

    let mut events = JoinSet::new();
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("host closed the transport");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "transport read error");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let inbound = match serde_json::from_str::<Inbound>(line) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::warn!(error = %e, "invalid frame");
                let error = WireError::from(ProtocolError::InvalidFrame(e.to_string()));
                if out.send(Outbound::ProtocolError { error }).is_err() {
                    tracing::debug!("transport closed before protocol error");
                }
                continue;
            }
        };

        if matches!(inbound.event, Event::Shutdown) {
            tracing::info!("shutdown requested");
            break;
        }

        let agent = agent.clone();
        let out = out.clone();
        events.spawn(async move { dispatch(&agent, inbound, &out).await });
    }

    while let Some(result) = events.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "event handler panicked");
        }
    }
    agent.drain().await;

    drop(out);
    writer_task.await.map_err(std::io::Error::other)?
}

async fn dispatch(agent: &Agent, inbound: Inbound, out: &UnboundedSender<Outbound>) {
    let Inbound { id, event } = inbound;
    let frame = agent.handle(id, event, out).await;
    let actions = actions_of(&frame);
    if !actions.is_empty() {
        tracing::debug!(id, actions = actions.len(), "platform actions requested");
    }
    if out.send(frame).is_err() {
        tracing::debug!(id, "transport closed before reply");
    }
}

async fn write_frames<W>(mut writer: W, mut rx: UnboundedReceiver<Outbound>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let mut json = serde_json::to_string(&frame).map_err(std::io::Error::other)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
