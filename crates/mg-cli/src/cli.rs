use std::path::PathBuf;

use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

pub const USAGE: &str = "\
Usage: mcp-gateway [--config <path>] [--log-file <path>] [--status | --stop]

Runs stdio MCP servers behind an HTTP/SSE bridge and serves a client
configuration on the config port (default 8930).

Options:
  --config <path>    Config file (default: $MCP_GATEWAY_CONFIG, or config.json
                     found walking up from the current directory)
  --log-file <path>  Also write logs to this file
  --status           Report the recorded session and re-probe its ports
  --stop             Signal a running gateway and clear its record
  -h, --help         Show this help
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Status,
    Stop,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub command: Command,
    pub config: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

/// Parse arguments, excluding the program name.
pub fn parse<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs {
        command: Command::Run,
        config: None,
        log_file: None,
    };
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().ok_or_else(|| eyre!("--config needs a path"))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--log-file" => {
                let value = args
                    .next()
                    .ok_or_else(|| eyre!("--log-file needs a path"))?;
                parsed.log_file = Some(PathBuf::from(value));
            }
            "--status" => set_command(&mut parsed, Command::Status)?,
            "--stop" => set_command(&mut parsed, Command::Stop)?,
            "-h" | "--help" => parsed.command = Command::Help,
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(parsed)
}

fn set_command(parsed: &mut CliArgs, command: Command) -> Result<()> {
    match parsed.command {
        Command::Run => {
            parsed.command = command;
            Ok(())
        }
        Command::Help => Ok(()),
        existing if existing == command => Ok(()),
        _ => bail!("--status and --stop cannot be combined"),
    }
}
