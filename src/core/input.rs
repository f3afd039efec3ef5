//! Operator command input
//!
//! Reads one command per line from stdin and forwards the parsed events to
//! the session loop. Malformed lines are logged and skipped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::InputEvent;

/// Forward stdin commands until stdin closes or the session goes away
pub fn spawn_stdin_reader(tx: mpsc::Sender<InputEvent>) -> JoinHandle<()> {
    tokio::spawn(forward_lines(BufReader::new(tokio::io::stdin()), tx))
}

pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<InputEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!("Input closed, no more operator commands");
                return;
            }
            Err(e) => {
                log::error!("Failed to read operator input: {}", e);
                return;
            }
        };
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        match line.parse::<InputEvent>() {
            Ok(event) => {
                log::debug!("Input: {:?}", event);
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Err(e) => log::warn!("Ignoring input '{}': {}", line.trim(), e),
        }
    }
}
