use anyhow::{Context, Result};
use serde::Deserialize;
use shared::types::Container;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Container lifecycle event from the runtime watcher
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContainerEvent {
    Start {
        container: Container,
    },
    Die {
        id: String,
        #[serde(default)]
        exit_code: i64,
    },
}

/// Read newline-delimited JSON events from `reader` and forward them.
/// Malformed lines are logged and skipped; returns at end of input.
pub async fn read_events<R>(
    reader: R,
    tx: mpsc::Sender<ContainerEvent>,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read container events")? else {
                    tracing::info!("Container event stream closed");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<ContainerEvent>(line) {
                    Ok(event) => {
                        if let Err(e) = tx.send(event).await {
                            tracing::error!("Failed to send container event: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Skipping malformed container event: {}", e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Event reader shutting down");
                break;
            }
        }
    }

    Ok(())
}
