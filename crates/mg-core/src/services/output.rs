use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

pub const CHILD_TARGET: &str = "mcp_gateway::child";

/// Node prints these on every start of the bridging tool.
static NOISY_STDERR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ExperimentalWarning").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of child output, tagged with the server it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub server: String,
    pub stream: OutputStream,
    pub line: String,
}

impl OutputLine {
    /// Blank lines and known-noisy stderr diagnostics are dropped.
    pub fn is_suppressed(&self) -> bool {
        if self.line.trim().is_empty() {
            return true;
        }
        self.stream == OutputStream::Stderr && NOISY_STDERR_RE.is_match(&self.line)
    }
}

/// Forward every line read from `reader` into `tx`.
///
/// Bytes are decoded lossily. The reader is drained to EOF even once the
/// receiver is gone, so the child never writes into a closed pipe.
pub fn pipe<R>(
    reader: R,
    server: String,
    stream: OutputStream,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut forwarding = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(server = %server, error = %e, "output_read_failed");
                    break;
                }
            }
            if !forwarding {
                continue;
            }
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\n', '\r'])
                .to_string();
            let event = OutputLine {
                server: server.clone(),
                stream,
                line,
            };
            forwarding = tx.send(event).is_ok();
        }
    })
}

/// Route a child's output into the log, prefixed by server name.
pub fn log_line(line: &OutputLine) {
    if line.is_suppressed() {
        return;
    }
    let text = line.line.trim_end();
    match line.stream {
        OutputStream::Stdout => {
            tracing::info!(target: CHILD_TARGET, "[{}] {text}", line.server)
        }
        OutputStream::Stderr => {
            tracing::warn!(target: CHILD_TARGET, "[{}] {text}", line.server)
        }
    }
}

/// Drain a receiver into the log until every sender is gone.
pub fn spawn_logger(mut rx: mpsc::UnboundedReceiver<OutputLine>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            log_line(&line);
        }
    })
}
