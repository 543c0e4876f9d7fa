// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! wagate: multi-session WhatsApp event gateway.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use wagate_config::{ConfigError, LogFormat, LoggingConfig, WagateConfig};

mod serve;
mod shutdown;

#[derive(Parser, Debug)]
#[command(name = "wagate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway (default).
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            wagate_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::CheckConfig => {
            println!(
                "configuration ok: {} session(s), {} webhook(s), listening on {}:{}",
                config.sessions.len(),
                config.webhooks.len(),
                config.server.host,
                config.server.port
            );
            ExitCode::SUCCESS
        }
        Commands::Serve => {
            init_tracing(&config.logging);
            match serve::run_serve(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, code = e.code(), "gateway failed");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn load(path: Option<&std::path::Path>) -> Result<WagateConfig, Vec<ConfigError>> {
    match path {
        Some(path) => wagate_config::load_and_validate_path(path),
        None => wagate_config::load_and_validate(),
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wagate={},warn", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        assert!(stats::allocated::read().unwrap() > 0);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_config_accepts_explicit_path() {
        let cli = Cli::parse_from(["wagate", "check-config", "--config", "/tmp/wagate.toml"]);
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wagate.toml")));
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["wagate"]);
        assert!(cli.command.is_none());
    }
}
