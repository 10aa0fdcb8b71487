//! `otrace recon` - compare two day-partitioned datasets month by month.

use std::path::PathBuf;

use clap::Args;
use ordertrace_core::YearMonth;
use ordertrace_recon::{run, write_outputs, ReconConfig, ReconResult, ReconSummary};
use serde::Serialize;

use crate::exit_codes::{EXIT_ERROR, EXIT_RECON_CONFIG, EXIT_RECON_DIFFS, EXIT_RECON_FAILED_MONTHS};
use crate::CliError;

#[derive(Args, Debug, Default)]
pub struct ReconArgs {
    /// Reconciliation config (TOML); flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Candidate dataset root (the extraction under test)
    #[arg(long, value_name = "DIR")]
    pub candidate: Option<PathBuf>,

    /// Reference dataset root (the trusted export)
    #[arg(long, value_name = "DIR")]
    pub reference: Option<PathBuf>,

    /// First month, inclusive
    #[arg(long, value_name = "YYYY-MM")]
    pub from: Option<YearMonth>,

    /// Last month, inclusive
    #[arg(long, value_name = "YYYY-MM")]
    pub to: Option<YearMonth>,

    /// Output directory for report files
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Rows in the top-discrepancy reports
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Rank placeholder line items alongside real products
    #[arg(long)]
    pub include_placeholders: bool,

    /// Keep only orders fulfilled at this location. Repeatable.
    #[arg(long = "fulfillment-location", value_name = "LOCATION")]
    pub fulfillment_locations: Vec<String>,

    /// Keep only orders demanded at this location. Repeatable.
    #[arg(long = "demand-location", value_name = "LOCATION")]
    pub demand_locations: Vec<String>,

    /// Write recon.json and print a JSON summary to stdout
    #[arg(long)]
    pub json: bool,
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError::new(code, msg)
}

/// Load the optional config file and fold flags over it.
pub fn build_config(args: &ReconArgs) -> Result<(ReconConfig, PathBuf), CliError> {
    let mut config = match &args.config {
        Some(path) => ReconConfig::load(path).map_err(CliError::recon)?,
        None => ReconConfig::default(),
    };
    if let Some(dir) = &args.candidate {
        config.candidate.root = dir.clone();
    }
    if let Some(dir) = &args.reference {
        config.reference.root = dir.clone();
    }
    if args.from.is_some() {
        config.range.from = args.from;
    }
    if args.to.is_some() {
        config.range.to = args.to;
    }
    if let Some(dir) = &args.out {
        config.output.dir = Some(dir.clone());
    }
    if let Some(top) = args.top {
        config.output.top = top;
    }
    if args.include_placeholders {
        config.output.include_placeholders = true;
    }
    if args.json {
        config.output.json = true;
    }
    if !args.fulfillment_locations.is_empty() {
        config.perspective.fulfillment_locations = args.fulfillment_locations.clone();
    }
    if !args.demand_locations.is_empty() {
        config.perspective.demand_locations = args.demand_locations.clone();
    }

    config.validate().map_err(|e| {
        CliError::recon(e).with_hint("pass --candidate, --reference, --from and --to, or a --config file")
    })?;
    let out = config.output.dir.clone().ok_or_else(|| {
        recon_err(EXIT_RECON_CONFIG, "output directory is required")
            .with_hint("pass --out DIR or set [output] dir")
    })?;
    Ok((config, out))
}

/// Exit status for a completed run: failed months outrank differences.
pub fn outcome(summary: &ReconSummary) -> Result<(), CliError> {
    if summary.failed_months > 0 {
        return Err(recon_err(
            EXIT_RECON_FAILED_MONTHS,
            format!("{} month(s) could not be reconciled", summary.failed_months),
        ));
    }
    if !summary.is_clean() {
        return Err(recon_err(EXIT_RECON_DIFFS, "discrepancies found"));
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonMonth<'a> {
    month: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    orders_delta: i64,
    line_items_delta: i64,
    only_candidate: usize,
    only_reference: usize,
    raw_mismatches: usize,
    normalized_mismatches: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a ReconSummary,
    months: Vec<JsonMonth<'a>>,
    files: Vec<String>,
}

fn print_json(result: &ReconResult, written: &[PathBuf]) -> Result<(), CliError> {
    let report = JsonReport {
        summary: &result.summary,
        months: result
            .months
            .iter()
            .map(|m| JsonMonth {
                month: m.month.to_string(),
                status: m.status.to_string(),
                error: m.error.as_deref(),
                orders_delta: m.orders_delta(),
                line_items_delta: m.line_items_delta(),
                only_candidate: m.only_candidate.len(),
                only_reference: m.only_reference.len(),
                raw_mismatches: m.raw_mismatches.len(),
                normalized_mismatches: m.normalized_mismatches.len(),
            })
            .collect(),
        files: written.iter().map(|p| p.display().to_string()).collect(),
    };
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
    println!("{}", text);
    Ok(())
}

fn print_summary(result: &ReconResult) {
    for m in &result.months {
        if m.is_ok() {
            eprintln!(
                "  {}: orders {:+}, line items {:+}, only candidate {}, only reference {}, mismatches {} raw / {} normalized",
                m.month,
                m.orders_delta(),
                m.line_items_delta(),
                m.only_candidate.len(),
                m.only_reference.len(),
                m.raw_mismatches.len(),
                m.normalized_mismatches.len()
            );
        } else {
            eprintln!(
                "  {}: FAILED ({})",
                m.month,
                m.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    let s = &result.summary;
    eprintln!(
        "recon: {} months ({} failed), {} vs {} orders, {} discrepant keys raw, {} normalized",
        s.months,
        s.failed_months,
        s.candidate_orders,
        s.reference_orders,
        s.raw_discrepant_keys,
        s.normalized_discrepant_keys
    );
    if let Some(top) = result.raw.top.first() {
        eprintln!(
            "  largest: {} (candidate {}, reference {}, delta {:+})",
            top.key, top.candidate, top.reference, top.delta
        );
    }
}

pub fn cmd_recon(args: ReconArgs) -> Result<(), CliError> {
    let (config, out) = build_config(&args)?;
    let result = run(&config).map_err(CliError::recon)?;
    let written = write_outputs(&result, &out, config.output.json).map_err(CliError::recon)?;

    if args.json {
        print_json(&result, &written)?;
    } else {
        print_summary(&result);
        eprintln!("wrote {} files to {}", written.len(), out.display());
    }
    outcome(&result.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[candidate]
root = "/data/a"

[reference]
root = "/data/b"

[range]
from = "2024-01"
to = "2024-03"

[output]
dir = "/tmp/recon"
top = 10
"#
        )
        .unwrap();

        let args = ReconArgs {
            config: Some(file.path().to_path_buf()),
            to: Some("2024-06".parse().unwrap()),
            top: Some(5),
            demand_locations: vec!["Web".into()],
            ..Default::default()
        };
        let (config, out) = build_config(&args).unwrap();
        assert_eq!(config.candidate.root, PathBuf::from("/data/a"));
        assert_eq!(config.range.to.unwrap().to_string(), "2024-06");
        assert_eq!(config.output.top, 5);
        assert_eq!(config.perspective.demand_locations, vec!["Web".to_string()]);
        assert_eq!(out, PathBuf::from("/tmp/recon"));
    }

    #[test]
    fn missing_output_dir_is_a_config_error() {
        let args = ReconArgs {
            candidate: Some("a".into()),
            reference: Some("b".into()),
            from: Some("2024-05".parse().unwrap()),
            to: Some("2024-05".parse().unwrap()),
            ..Default::default()
        };
        let err = build_config(&args).unwrap_err();
        assert_eq!(err.code, EXIT_RECON_CONFIG);
        assert!(err.hint.is_some());
    }

    #[test]
    fn failed_months_outrank_discrepancies() {
        let mut summary = ReconSummary { only_reference: 2, ..Default::default() };
        assert_eq!(outcome(&summary).unwrap_err().code, EXIT_RECON_DIFFS);
        summary.failed_months = 1;
        assert_eq!(outcome(&summary).unwrap_err().code, EXIT_RECON_FAILED_MONTHS);
        assert!(outcome(&ReconSummary::default()).is_ok());
    }
}
