use std::path::Path;

use mg_core::models::{GatewayConfig, GatewaySettings};
use mg_core::services::config_loader;
use mg_core::services::gateway::{self, Gateway};
use mg_core::services::report;
use mg_core::services::signals;
use mg_core::services::state::TopologyStore;

use mg_cli::cli::{self, CliArgs, Command};
use mg_cli::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = match cli::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };
    if args.command == Command::Help {
        print!("{}", cli::USAGE);
        return Ok(());
    }

    let _guard = logging::init(args.log_file.as_deref())?;

    let cwd = std::env::current_dir()?;
    let config_path = config_loader::locate(args.config.as_deref(), &cwd);
    let loaded = config_loader::load(&config_path);

    match args.command {
        Command::Status | Command::Stop => {
            // A session recorded earlier stays reachable even if the config
            // has since become unreadable.
            let settings = match &loaded {
                Ok(config) => config.gateway.clone(),
                Err(_) => GatewaySettings::default(),
            };
            let store = TopologyStore::new(config_loader::state_file_path(&config_path, &settings));
            if args.command == Command::Status {
                let status = gateway::status(&store).await?;
                print!("{}", report::render_status(&status));
            } else {
                let outcome = gateway::stop(&store).await?;
                println!("{}", report::render_stop(&outcome));
            }
            Ok(())
        }
        Command::Run => {
            let config = match loaded {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(path = %config_path.display(), "Failed to load config: {e}");
                    std::process::exit(1);
                }
            };
            run(config, &config_path, &args).await
        }
        Command::Help => Ok(()),
    }
}

async fn run(config: GatewayConfig, config_path: &Path, args: &CliArgs) -> color_eyre::Result<()> {
    tracing::debug!(config = %config_path.display(), log_file = ?args.log_file, "config_loaded");
    let store = TopologyStore::new(config_loader::state_file_path(config_path, &config.gateway));
    let mut gateway = Gateway::new(config, store)?;
    let _signals = signals::cancel_on_signal(gateway.shutdown_token());

    let summary = gateway.start().await?;
    if !gateway.shutdown_token().is_cancelled() {
        println!();
        print!("{}", report::render_instructions(&summary, gateway.config()));
    }

    gateway.run_until_shutdown().await?;
    Ok(())
}
