// ordertrace CLI - order extraction and reconciliation

mod exit_codes;
mod extract;
mod recon;
mod store;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::{
    config_exit_code, extract_exit_code, recon_exit_code, store_exit_code, EXIT_AUTH_REJECTED,
    EXIT_BRIDGE_UNREACHABLE, EXIT_IO, EXIT_SUCCESS,
};

#[derive(Parser)]
#[command(name = "otrace")]
#[command(about = "Extract orders from a retail console and reconcile order datasets")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the console month by month and persist one CSV pair per day
    #[command(after_help = "\
Examples:
  otrace extract --root ./orders
  otrace extract --config settings.toml --start-month 2024-05 --max-months 3
  OTRACE_PASSWORD=... otrace extract --username ops@example.com --bridge http://127.0.0.1:9515
  otrace extract --root ./orders --delay-ms 250 -q")]
    Extract(extract::ExtractArgs),

    /// Compare a candidate dataset against a reference dataset
    #[command(after_help = "\
Examples:
  otrace recon --candidate ./orders --reference ./export --from 2024-01 --to 2024-06 --out ./recon
  otrace recon --config recon.toml --out ./recon --json
  otrace recon --config recon.toml --fulfillment-location Downtown --top 25
  otrace recon --candidate a --reference b --from 2024-05 --to 2024-05 --out r --include-placeholders")]
    Recon(recon::ReconArgs),

    /// Inspect an incremental store
    #[command(subcommand)]
    Store(StoreCommands),
}

#[derive(Subcommand)]
enum StoreCommands {
    /// List extracted months and their completed or partial days
    #[command(after_help = "\
Examples:
  otrace store status --root ./orders
  otrace store status --root ./orders --month 2024-05")]
    Status(store::StatusArgs),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("OTRACE_COMMIT"),
        ")",
        "\ntarget:  ",
        env!("OTRACE_TARGET"),
    )
}

/// Install the fmt subscriber on stderr. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Extract(args) => extract::cmd_extract(args, cli.quiet),
        Commands::Recon(args) => recon::cmd_recon(args),
        Commands::Store(StoreCommands::Status(args)) => store::cmd_status(args),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn config(err: ordertrace_config::ConfigError) -> Self {
        let code = config_exit_code(&err);
        let hint = match &err {
            ordertrace_config::ConfigError::MissingCredential { env, .. } => {
                Some(format!("export {} or pass it as a flag", env))
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Create error from an extraction failure with proper exit code.
    pub fn extract(err: ordertrace_extract::ExtractError) -> Self {
        let err = match err {
            ordertrace_extract::ExtractError::Config(inner) => return Self::config(inner),
            other => other,
        };
        let code = extract_exit_code(&err);
        let hint = match code {
            EXIT_AUTH_REJECTED => Some("check the console username and password".to_string()),
            EXIT_BRIDGE_UNREACHABLE => {
                Some("is the browser bridge running? see bridge.endpoint or --bridge".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    pub fn recon(err: ordertrace_recon::ReconError) -> Self {
        Self::new(recon_exit_code(&err), err.to_string())
    }

    pub fn store(err: ordertrace_io::StoreError) -> Self {
        Self::new(store_exit_code(&err), err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::EXIT_AUTH_MISSING;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn store_status_parses_month() {
        let cli = Cli::try_parse_from(["otrace", "store", "status", "--root", "data", "--month", "2024-05"])
            .unwrap();
        match cli.command {
            Commands::Store(StoreCommands::Status(args)) => {
                assert_eq!(args.month.map(|m| m.to_string()).as_deref(), Some("2024-05"));
            }
            _ => panic!("expected store status"),
        }
    }

    #[test]
    fn bad_month_is_a_usage_error() {
        let err = Cli::try_parse_from(["otrace", "store", "status", "--root", "d", "--month", "May"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["otrace", "-q", "-v", "store", "status", "--root", "d"]).is_err());
    }

    #[test]
    fn missing_credentials_carry_a_hint() {
        let err = CliError::config(ordertrace_config::ConfigError::MissingCredential {
            what: "password",
            env: "OTRACE_PASSWORD".into(),
        });
        assert_eq!(err.code, EXIT_AUTH_MISSING);
        assert!(err.hint.unwrap().contains("OTRACE_PASSWORD"));
    }
}
