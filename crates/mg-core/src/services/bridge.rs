use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::{GatewayError, Result};
use crate::models::{BridgeSettings, ServerSpec};

use super::output::{self, OutputLine, OutputStream};

pub const BIND_ALL_HOST: &str = "0.0.0.0";

/// Arguments passed to the bridging tool after its own configured args:
/// `--stdio "<command> <args...>" --port <port> --host 0.0.0.0`.
pub fn build_args(bridge: &BridgeSettings, spec: &ServerSpec) -> Vec<String> {
    let mut args = bridge.args.clone();
    args.extend([
        "--stdio".to_string(),
        spec.stdio_command(),
        "--port".to_string(),
        spec.port.to_string(),
        "--host".to_string(),
        BIND_ALL_HOST.to_string(),
    ]);
    args
}

/// Spawn the bridging tool for one server.
///
/// Returns the child handle; its stdout/stderr lines are forwarded to `tx`.
pub fn spawn(
    bridge: &BridgeSettings,
    spec: &ServerSpec,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> Result<Child> {
    let mut cmd = Command::new(&bridge.command);
    cmd.args(build_args(bridge, spec));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    #[cfg(windows)]
    {
        // CREATE_NO_WINDOW
        cmd.creation_flags(0x08000000);
    }

    let mut child = cmd.spawn().map_err(|e| GatewayError::Spawn {
        name: spec.name.clone(),
        reason: format!("{}: {e}", bridge.command),
    })?;

    if let Some(stdout) = child.stdout.take() {
        output::pipe(stdout, spec.name.clone(), OutputStream::Stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        output::pipe(stderr, spec.name.clone(), OutputStream::Stderr, tx);
    }

    Ok(child)
}
