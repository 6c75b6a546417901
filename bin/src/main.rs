//! tickwire CLI - Stream live prices and account events as JSON lines.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tickwire_lib::prelude::*;

mod commands;
mod config;
mod display;
mod logging;

use commands::stream::StreamOptions;
use config::Config;

#[derive(Parser)]
#[command(name = "tickwire")]
#[command(about = "Stream live prices and account events as JSON lines", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API domain (sandbox, practice, live)
    #[arg(long, global = true)]
    domain: Option<Domain>,

    /// Access token. Prefer TICKWIRE_ACCESS_TOKEN to keep it out of shell history.
    #[arg(long, global = true)]
    access_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream prices for one or more instruments
    Prices {
        /// Instruments (e.g., EUR_USD USD_JPY)
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Account id. Defaults to the configured account.
        #[arg(short, long)]
        account: Option<String>,

        #[command(flatten)]
        options: StreamOptions,
    },

    /// Stream account events (transactions)
    Events {
        /// Account ids (repeatable). Defaults to the configured account.
        #[arg(short, long)]
        account: Vec<String>,

        #[command(flatten)]
        options: StreamOptions,
    },

    /// Print the request a stream command would send, without connecting
    Url {
        #[command(subcommand)]
        target: UrlTarget,
    },
}

/// Streams whose request can be shown.
#[derive(Subcommand)]
enum UrlTarget {
    /// Price stream request
    Prices {
        /// Instruments (e.g., EUR_USD USD_JPY)
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Account id. Defaults to the configured account.
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Event stream request
    Events {
        /// Account ids (repeatable). Defaults to the configured account.
        #[arg(short, long)]
        account: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    logging::init(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(domain) = cli.domain {
        config.domain = domain;
    }
    if let Some(token) = cli.access_token {
        config.access_token = Some(token);
    }

    match command {
        Commands::Prices {
            instruments,
            account,
            options,
        } => {
            let request = commands::stream::prices_request(&config, &instruments, account)?;
            commands::stream::stream(&config, request, &options).await
        }
        Commands::Events { account, options } => {
            let request = commands::stream::events_request(&config, account)?;
            commands::stream::stream(&config, request, &options).await
        }
        Commands::Url { target } => {
            let request = match target {
                UrlTarget::Prices {
                    instruments,
                    account,
                } => commands::stream::prices_request(&config, &instruments, account)?,
                UrlTarget::Events { account } => {
                    commands::stream::events_request(&config, account)?
                }
            };
            commands::url::show_url(&request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_prices() {
        let cli = Cli::try_parse_from([
            "tickwire", "--domain", "practice", "prices", "EUR_USD", "USD_JPY", "-a", "1234",
            "-n", "5", "--heartbeats",
        ])
        .unwrap();
        assert_eq!(cli.domain, Some(Domain::Practice));
        match cli.command {
            Some(Commands::Prices {
                instruments,
                account,
                options,
            }) => {
                assert_eq!(instruments, ["EUR_USD", "USD_JPY"]);
                assert_eq!(account.as_deref(), Some("1234"));
                assert_eq!(options.limit, Some(5));
                assert!(options.heartbeats);
                assert_eq!(options.format, display::Format::Ndjson);
            }
            _ => panic!("expected prices command"),
        }
    }

    #[test]
    fn test_parse_events_accounts() {
        let cli = Cli::try_parse_from([
            "tickwire", "events", "-a", "1", "--account", "2", "-f", "text", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Commands::Events { account, options }) => {
                assert_eq!(account, ["1", "2"]);
                assert_eq!(options.format, display::Format::Text);
            }
            _ => panic!("expected events command"),
        }
    }

    #[test]
    fn test_prices_requires_instruments() {
        assert!(Cli::try_parse_from(["tickwire", "prices"]).is_err());
    }

    #[test]
    fn test_bad_domain_rejected() {
        assert!(Cli::try_parse_from(["tickwire", "--domain", "moon", "events"]).is_err());
    }
}
