//! Console input provider: asks on stderr, reads one line from stdin.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::application::input_gate::InputProvider;

/// Reads `${input}` values from the terminal.
///
/// End of input (Ctrl+D) or a read error counts as a dismissed prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl InputProvider for StdinPrompt {
    async fn request_input(&self, prompt: &str) -> Option<String> {
        if let Err(e) = show_prompt(&mut tokio::io::stderr(), prompt).await {
            debug!("could not show input prompt: {e}");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        match lines.next_line().await {
            Ok(Some(line)) => Some(line.trim_end_matches('\r').to_string()),
            Ok(None) => None,
            Err(e) => {
                debug!("input prompt read failed: {e}");
                None
            }
        }
    }
}

/// Writes `"{prompt}: "` and flushes so it shows before the read blocks.
async fn show_prompt<W: AsyncWrite + Unpin>(out: &mut W, prompt: &str) -> io::Result<()> {
    out.write_all(format!("{prompt}: ").as_bytes()).await?;
    out.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
