//! `otrace extract` - run the month driver against the live console.

use std::path::PathBuf;

use clap::Args;
use ordertrace_config::{resolve_secret, Settings};
use ordertrace_core::YearMonth;
use ordertrace_extract::{
    BridgeClient, BridgeProvider, DriverOptions, MonthDriver, QueryFilterConfigurator, RunState,
    StopReason, TracingSink,
};
use ordertrace_io::IncrementalStore;
use tracing::info;

use crate::CliError;

#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Settings file (default: <config dir>/ordertrace/settings.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Incremental store root (overrides extraction.output_root)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Browser bridge endpoint (overrides bridge.endpoint)
    #[arg(long, value_name = "URL")]
    pub bridge: Option<String>,

    /// Console username (overrides credentials.username)
    #[arg(long, value_name = "USER")]
    pub username: Option<String>,

    /// Environment variable holding the console password
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,

    /// First month to walk back from (default: the current month)
    #[arg(long, value_name = "YYYY-MM")]
    pub start_month: Option<YearMonth>,

    /// Stop after visiting this many months
    #[arg(long, value_name = "N")]
    pub max_months: Option<u32>,

    /// Stop after this many consecutive months without orders
    #[arg(long, value_name = "N")]
    pub max_empty_months: Option<u32>,

    /// Pause between order detail fetches, in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,
}

/// Fold flag values over the loaded settings. Flags win.
pub fn apply_overrides(settings: &mut Settings, args: &ExtractArgs) -> Result<(), CliError> {
    if let Some(root) = &args.root {
        settings.extraction.output_root = root.clone();
    }
    if let Some(endpoint) = &args.bridge {
        settings.bridge.endpoint = endpoint.clone();
    }
    if let Some(username) = &args.username {
        settings.credentials.username = Some(username.clone());
    }
    if let Some(var) = &args.password_env {
        settings.credentials.password_env = var.clone();
    }
    if let Some(n) = args.max_months {
        settings.extraction.max_months = n;
    }
    if let Some(n) = args.max_empty_months {
        settings.extraction.max_empty_months = n;
    }
    if let Some(ms) = args.delay_ms {
        settings.extraction.fetch_delay_ms = ms;
    }
    settings.validate().map_err(CliError::config)
}

/// Username and password, flag or settings value first, then environment.
pub fn resolve_credentials(settings: &Settings) -> Result<(String, String), CliError> {
    let creds = &settings.credentials;
    let username = resolve_secret(creds.username.as_deref(), &creds.username_env, "username")
        .map_err(CliError::config)?;
    let password =
        resolve_secret(None, &creds.password_env, "password").map_err(CliError::config)?;
    Ok((username, password))
}

pub fn cmd_extract(args: ExtractArgs, quiet: bool) -> Result<(), CliError> {
    let mut settings = Settings::load(args.config.as_deref()).map_err(CliError::config)?;
    apply_overrides(&mut settings, &args)?;
    let (username, password) = resolve_credentials(&settings)?;

    let login_url = settings.login_url().map_err(CliError::config)?;
    let client = BridgeClient::new(&settings.bridge).map_err(CliError::extract)?;
    let provider = BridgeProvider::new(client, &login_url, &username, &password);
    let filters = QueryFilterConfigurator::from_settings(&settings).map_err(CliError::extract)?;
    let store = IncrementalStore::new(&settings.extraction.output_root);

    let mut options =
        DriverOptions::from_settings(&settings.extraction, chrono::Local::now().date_naive());
    options.start_month = args.start_month;

    info!(
        root = %store.root().display(),
        bridge = %settings.bridge.endpoint,
        "starting extraction"
    );
    let mut driver = MonthDriver::new(provider, filters, store, options);
    let report = driver.run(&mut TracingSink);

    if !quiet {
        print_summary(&report.state);
    }
    match report.fatal {
        Some(err) => Err(CliError::extract(err)),
        None => Ok(()),
    }
}

fn print_summary(state: &RunState) {
    let reason = match state.stop_reason {
        Some(StopReason::EmptyMonths) => "consecutive empty months",
        Some(StopReason::MonthCap) => "month cap reached",
        Some(StopReason::Fatal) | None => "aborted",
    };
    let last = state
        .last_month
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    eprintln!(
        "extract: {} months visited (last {}), stopped: {}",
        state.months_visited, last, reason
    );
    eprintln!(
        "  orders: {} listed, {} extracted, {} line items ({} placeholders, {} errors)",
        state.orders_listed,
        state.orders_extracted,
        state.line_items,
        state.placeholders,
        state.error_placeholders
    );
    eprintln!(
        "  days: {} written, {} already present, {} still open",
        state.days_written, state.days_skipped, state.open_days
    );
    if state.month_failures > 0 {
        eprintln!("  {} month(s) failed and will be retried next run", state.month_failures);
    }
    let skipped = state.undated_orders + state.out_of_range_orders;
    if skipped > 0 || state.duplicate_orders > 0 || state.malformed_rows > 0 {
        eprintln!(
            "  skipped: {} undated or out of range, {} duplicates, {} malformed rows",
            skipped, state.duplicate_orders, state.malformed_rows
        );
    }
}
