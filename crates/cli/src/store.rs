//! `otrace store status` - what an incremental store already holds.

use std::path::PathBuf;

use clap::Args;
use ordertrace_core::YearMonth;
use ordertrace_io::{IncrementalStore, StoreError};

use crate::CliError;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Incremental store root
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Show individual days of one month
    #[arg(long, value_name = "YYYY-MM")]
    pub month: Option<YearMonth>,
}

/// One line per month, or one line per day when `month` is given.
pub fn status_lines(
    store: &IncrementalStore,
    month: Option<YearMonth>,
) -> Result<Vec<String>, StoreError> {
    let mut lines = Vec::new();
    match month {
        Some(month) => {
            let mut days: Vec<_> = store
                .completed_dates(month)?
                .into_iter()
                .map(|d| (d, "complete"))
                .chain(store.partial_dates(month)?.into_iter().map(|d| (d, "partial")))
                .collect();
            days.sort();
            for (date, state) in days {
                lines.push(format!("{}  {}", date.format("%Y-%m-%d"), state));
            }
        }
        None => {
            for month in store.months()? {
                let complete = store.completed_dates(month)?.len();
                let partial = store.partial_dates(month)?.len();
                let mut line = format!("{}  {:>2} days", month, complete);
                if partial > 0 {
                    line.push_str(&format!("  ({} partial)", partial));
                }
                lines.push(line);
            }
        }
    }
    Ok(lines)
}

pub fn cmd_status(args: StatusArgs) -> Result<(), CliError> {
    if !args.root.is_dir() {
        return Err(CliError::io(format!("{}: not a directory", args.root.display()))
            .with_hint("pass the directory given to `otrace extract --root`"));
    }
    let store = IncrementalStore::new(&args.root);
    let lines = status_lines(&store, args.month).map_err(CliError::store)?;
    if lines.is_empty() {
        eprintln!("nothing extracted under {}", args.root.display());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
