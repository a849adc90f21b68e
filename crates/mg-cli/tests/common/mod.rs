// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Run the built binary with `args`, isolated from any ambient config.
pub fn run_gateway(args: &[&str], cwd: &Path) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mcp-gateway"));
    command
        .args(args)
        .current_dir(cwd)
        .env_remove("MCP_GATEWAY_CONFIG")
        .env("RUST_LOG", "error");
    // Own process group: a stray group-wide signal cannot reach the test runner.
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut command, 0);
    command.output().unwrap()
}

/// Write a config with no servers and return its path.
pub fn write_empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{ "servers": [] }"#).unwrap();
    path
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
