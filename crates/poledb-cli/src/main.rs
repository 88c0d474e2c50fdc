//! poledb CLI
//!
//! Command-line interface for the pole and user account tables.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poledb_core::{Config, DataService, Database};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "poledb")]
#[command(about = "poledb - Pole and user account records")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage poles
    Pole {
        #[command(subcommand)]
        command: PoleCommands,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum PoleCommands {
    /// Create a new pole
    #[command(alias = "add")]
    Create {
        /// Pole number
        #[arg(long)]
        number: String,
        /// Latitude
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude
        #[arg(long, allow_negative_numbers = true)]
        long: f64,
    },
    /// List poles
    #[command(alias = "ls")]
    List {
        /// Exact-match filter (column=value), repeatable
        #[arg(short, long)]
        filter: Vec<String>,
        /// Case-insensitive search on the pole number
        #[arg(long, conflicts_with = "filter")]
        number: Option<String>,
    },
    /// Show a pole
    Show {
        /// Pole ID
        id: i64,
    },
    /// Update a pole
    Update {
        /// Pole ID
        id: i64,
        /// New values (column=value)
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Delete a pole
    #[command(alias = "rm")]
    Delete {
        /// Pole ID
        id: i64,
    },
    /// Search poles by number
    Search {
        /// Search key
        key: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user account
    #[command(alias = "add")]
    Create {
        /// Values (column=value)
        assignments: Vec<String>,
    },
    /// List active user accounts
    #[command(alias = "ls")]
    List {
        /// Exact-match filter (column=value), repeatable
        #[arg(short, long)]
        filter: Vec<String>,
    },
    /// Show a user account
    Show {
        /// User account ID
        id: i64,
    },
    /// Update a user account
    Update {
        /// User account ID
        id: i64,
        /// New values (column=value)
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Deactivate a user account
    #[command(alias = "rm")]
    Delete {
        /// User account ID
        id: i64,
    },
    /// Search user accounts
    Search {
        /// Search key
        key: String,
        /// Column to search
        #[arg(short, long, default_value = "full_name")]
        column: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output.error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    // Config doesn't need a database connection
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &config, cli.config.as_ref(), output);
    }

    let mut service = open_service(&config)?;

    match cli.command {
        Commands::Pole { command } => handle_pole_command(command, &mut service, output),
        Commands::User { command } => handle_user_command(command, &mut service, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_pole_command(
    command: PoleCommands,
    service: &mut DataService<Database>,
    output: &Output,
) -> Result<()> {
    match command {
        PoleCommands::Create { number, lat, long } => {
            commands::pole::create(service, number, lat, long, output)
        }
        PoleCommands::List { filter, number } => {
            commands::pole::list(service, &filter, number, output)
        }
        PoleCommands::Show { id } => commands::show(service, "pole", id, output),
        PoleCommands::Update { id, assignments } => {
            commands::update(service, "pole", id, &assignments, output)
        }
        PoleCommands::Delete { id } => commands::delete(service, "pole", id, output),
        PoleCommands::Search { key } => commands::pole::search(service, &key, output),
    }
}

fn handle_user_command(
    command: UserCommands,
    service: &mut DataService<Database>,
    output: &Output,
) -> Result<()> {
    match command {
        UserCommands::Create { assignments } => commands::user::create(service, &assignments, output),
        UserCommands::List { filter } => commands::user::list(service, &filter, output),
        UserCommands::Show { id } => commands::show(service, "user_account", id, output),
        UserCommands::Update { id, assignments } => {
            commands::update(service, "user_account", id, &assignments, output)
        }
        UserCommands::Delete { id } => commands::delete(service, "user_account", id, output),
        UserCommands::Search { key, column } => {
            commands::user::search(service, &key, &column, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config: &Config,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config, config_path, output),
    }
}

fn open_service(config: &Config) -> Result<DataService<Database>> {
    let database = Database::open(config)
        .with_context(|| format!("Failed to open {} database", config.backend))?;
    Ok(DataService::new(database).with_debug(config.debug))
}

/// Log to stderr so stdout stays clean for --json and --quiet
///
/// `RUST_LOG` wins over the config file and `-v` flags.
fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.log_level.as_deref().unwrap_or("warn"),
        1 => "info",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("poledb_core={},poledb={}", level, level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pole_create_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "poledb", "pole", "create", "--number", "P-7", "--lat", "-33.9", "--long", "-70.6",
        ])
        .unwrap();

        match cli.command {
            Commands::Pole {
                command: PoleCommands::Create { number, lat, long },
            } => {
                assert_eq!(number, "P-7");
                assert_eq!(lat, -33.9);
                assert_eq!(long, -70.6);
            }
            _ => panic!("expected pole create"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["poledb", "user", "ls", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::User {
                command: UserCommands::List { .. }
            }
        ));
    }

    #[test]
    fn test_user_search_defaults_to_full_name() {
        let cli = Cli::try_parse_from(["poledb", "user", "search", "ali"]).unwrap();
        match cli.command {
            Commands::User {
                command: UserCommands::Search { key, column },
            } => {
                assert_eq!(key, "ali");
                assert_eq!(column, "full_name");
            }
            _ => panic!("expected user search"),
        }
    }

    #[test]
    fn test_update_requires_assignments() {
        assert!(Cli::try_parse_from(["poledb", "pole", "update", "1"]).is_err());
    }
}
