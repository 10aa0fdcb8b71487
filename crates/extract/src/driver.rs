//! Month Driver.
//!
//! ```text
//! INIT → AUTH → FILTER_SETUP → { SET_RANGE → EXTRACT_ORDERS → PARTITION_AND_PERSIST }* → DONE
//! ```
//!
//! Months are walked strictly backward, one at a time, from the start month
//! (default: the month containing `today`). The walk stops after
//! `max_empty_months` consecutive months without orders or after
//! `max_months` months. A month that fails counts as empty; only fatal
//! errors (authentication, store writes) end the run early.
//!
//! The incremental store is the only resumption mechanism: a day that
//! already exists is skipped before any detail fetch, and a day on or after
//! `today` is never persisted because it may still receive orders.

use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use ordertrace_config::ExtractionSettings;
use ordertrace_core::{PlaceholderKind, YearMonth};
use ordertrace_io::IncrementalStore;
use serde::Serialize;
use tracing::{debug, debug_span, error, info, info_span, warn};

use crate::error::ExtractError;
use crate::items::StrategyChain;
use crate::list::{extract_orders, ListOptions};
use crate::partition::partition_by_day;
use crate::session::{within_session, ConsoleSession, FilterConfigurator, SessionProvider};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_empty_months: u32,
    pub max_months: u32,
    pub fetch_delay: Duration,
    pub start_month: Option<YearMonth>,
    pub today: NaiveDate,
    pub list: ListOptions,
}

impl DriverOptions {
    pub fn from_settings(settings: &ExtractionSettings, today: NaiveDate) -> Self {
        Self {
            max_empty_months: settings.max_empty_months,
            max_months: settings.max_months,
            fetch_delay: Duration::from_millis(settings.fetch_delay_ms),
            start_month: None,
            today,
            list: ListOptions {
                dedupe: settings.dedupe_orders,
                max_pages: settings.max_pages_per_month,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "month")]
pub enum DriverState {
    Init,
    Auth,
    FilterSetup,
    SetRange(YearMonth),
    ExtractOrders(YearMonth),
    PartitionAndPersist(YearMonth),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyMonths,
    MonthCap,
    Fatal,
}

/// Informational progress. Sinks never influence the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ProgressEvent {
    State { state: DriverState },
    MonthFinished { month: YearMonth, orders: usize, days_written: usize, days_skipped: usize },
    MonthFailed { month: YearMonth, error: String },
    DaySkipped { date: NaiveDate },
    DayPersisted { date: NaiveDate, orders: usize, line_items: usize },
    OrderExtracted { order_id: String, strategy: &'static str, line_items: usize },
    Finished { months_visited: u32, reason: StopReason },
}

pub trait ProgressSink {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// Collects events; used by tests and `--json` style reporting.
impl ProgressSink for Vec<ProgressEvent> {
    fn on_event(&mut self, event: &ProgressEvent) {
        self.push(event.clone());
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::State { state } => debug!(?state, "driver state"),
            ProgressEvent::MonthFinished { month, orders, days_written, days_skipped } => info!(
                month = %month,
                orders,
                days_written,
                days_skipped,
                "month done"
            ),
            ProgressEvent::MonthFailed { month, error } => {
                warn!(month = %month, error = %error, "month failed")
            }
            ProgressEvent::DaySkipped { date } => debug!(date = %date, "day already extracted"),
            ProgressEvent::DayPersisted { date, orders, line_items } => {
                info!(date = %date, orders, line_items, "day written")
            }
            ProgressEvent::OrderExtracted { order_id, strategy, line_items } => {
                debug!(order_id = %order_id, strategy, line_items, "order extracted")
            }
            ProgressEvent::Finished { months_visited, reason } => {
                info!(months_visited, reason = ?reason, "extraction finished")
            }
        }
    }
}

/// Counters for one run, threaded through the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    pub months_visited: u32,
    pub consecutive_empty_months: u32,
    pub month_failures: u32,
    pub last_month: Option<YearMonth>,
    pub orders_listed: usize,
    pub orders_extracted: usize,
    pub line_items: usize,
    pub placeholders: usize,
    pub error_placeholders: usize,
    pub days_written: usize,
    pub days_skipped: usize,
    pub open_days: usize,
    pub undated_orders: usize,
    pub out_of_range_orders: usize,
    pub duplicate_orders: usize,
    pub malformed_rows: usize,
    pub detail_fetches: usize,
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// The error that ended the run early, if any.
    pub fatal: Option<ExtractError>,
}

pub struct MonthDriver<P, F> {
    provider: P,
    filters: F,
    store: IncrementalStore,
    chain: StrategyChain,
    options: DriverOptions,
}

impl<P, F> MonthDriver<P, F>
where
    P: SessionProvider,
    F: FilterConfigurator,
{
    pub fn new(provider: P, filters: F, store: IncrementalStore, options: DriverOptions) -> Self {
        Self {
            provider,
            filters,
            store,
            chain: StrategyChain::default(),
            options,
        }
    }

    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn run(&mut self, sink: &mut dyn ProgressSink) -> RunReport {
        let mut state = RunState::default();
        sink.on_event(&ProgressEvent::State { state: DriverState::Init });
        sink.on_event(&ProgressEvent::State { state: DriverState::Auth });

        let result = {
            let mut ctx = Ctx {
                filters: &mut self.filters,
                store: &self.store,
                chain: &self.chain,
                options: &self.options,
                state: &mut state,
                sink: &mut *sink,
            };
            within_session(&self.provider, |session| ctx.walk(session))
        };

        let fatal = match result {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "extraction aborted");
                state.stop_reason = Some(StopReason::Fatal);
                Some(e)
            }
        };

        sink.on_event(&ProgressEvent::State { state: DriverState::Done });
        sink.on_event(&ProgressEvent::Finished {
            months_visited: state.months_visited,
            reason: state.stop_reason.unwrap_or(StopReason::Fatal),
        });
        RunReport { state, fatal }
    }
}

struct Ctx<'a, F> {
    filters: &'a mut F,
    store: &'a IncrementalStore,
    chain: &'a StrategyChain,
    options: &'a DriverOptions,
    state: &'a mut RunState,
    sink: &'a mut dyn ProgressSink,
}

impl<F: FilterConfigurator> Ctx<'_, F> {
    fn emit(&mut self, event: ProgressEvent) {
        self.sink.on_event(&event);
    }

    fn walk<S: ConsoleSession>(&mut self, session: &mut S) -> Result<(), ExtractError> {
        self.emit(ProgressEvent::State { state: DriverState::FilterSetup });
        // Months load their own filtered range; only fatal errors stop here.
        match self.filters.apply_filters(session) {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(error = %e, "filter setup failed, continuing with per-month ranges"),
        }

        let mut month = self
            .options
            .start_month
            .unwrap_or_else(|| YearMonth::from_date(self.options.today));

        loop {
            if self.state.consecutive_empty_months >= self.options.max_empty_months {
                info!(
                    empty = self.state.consecutive_empty_months,
                    "stopping after consecutive empty months"
                );
                self.state.stop_reason = Some(StopReason::EmptyMonths);
                return Ok(());
            }
            if self.state.months_visited >= self.options.max_months {
                info!(months = self.state.months_visited, "stopping at month cap");
                self.state.stop_reason = Some(StopReason::MonthCap);
                return Ok(());
            }

            self.state.months_visited += 1;
            self.state.last_month = Some(month);
            let span = info_span!("month", month = %month);
            let _guard = span.enter();

            match self.month(session, month) {
                Ok(0) => self.state.consecutive_empty_months += 1,
                Ok(_) => self.state.consecutive_empty_months = 0,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.state.month_failures += 1;
                    self.state.consecutive_empty_months += 1;
                    self.emit(ProgressEvent::MonthFailed {
                        month,
                        error: e.to_string(),
                    });
                }
            }
            month = month.prev();
        }
    }

    /// Process one month. Returns the number of orders listed.
    fn month<S: ConsoleSession>(
        &mut self,
        session: &mut S,
        month: YearMonth,
    ) -> Result<usize, ExtractError> {
        self.emit(ProgressEvent::State { state: DriverState::SetRange(month) });
        let url = self
            .filters
            .set_date_range(session, month.first_day(), month.last_day())?;

        self.emit(ProgressEvent::State { state: DriverState::ExtractOrders(month) });
        let listing = extract_orders(session, &url, &self.options.list)?;
        self.state.orders_listed += listing.orders.len();
        self.state.duplicate_orders += listing.duplicates;
        self.state.malformed_rows += listing.malformed_rows;
        if let Some(reason) = listing.incomplete {
            // A partial listing may split a day; nothing from it is persisted.
            return Err(ExtractError::IncompleteListing {
                month: month.to_string(),
                reason,
            });
        }
        let listed = listing.orders.len();

        self.emit(ProgressEvent::State { state: DriverState::PartitionAndPersist(month) });
        let parts = partition_by_day(listing.orders);
        self.state.undated_orders += parts.undated.len();

        let mut days_written = 0;
        let mut days_skipped = 0;
        for (date, orders) in parts.days {
            if !month.contains(date) {
                debug!(date = %date, orders = orders.len(), "orders dated outside the month ignored");
                self.state.out_of_range_orders += orders.len();
                continue;
            }
            if date >= self.options.today {
                debug!(date = %date, "day still open, not persisted");
                self.state.open_days += 1;
                continue;
            }
            if self.store.exists(date) {
                self.state.days_skipped += 1;
                days_skipped += 1;
                self.emit(ProgressEvent::DaySkipped { date });
                continue;
            }

            let span = debug_span!("day", date = %date);
            let _guard = span.enter();

            let mut items = Vec::new();
            for order in &orders {
                if self.state.detail_fetches > 0 && !self.options.fetch_delay.is_zero() {
                    thread::sleep(self.options.fetch_delay);
                }
                self.state.detail_fetches += 1;

                let detail = if order.detail_ref.is_empty() {
                    Err(ExtractError::Navigation {
                        url: String::new(),
                        detail: format!("order {} has no detail link", order.order_id),
                    })
                } else {
                    session.open_detail(&order.detail_ref)
                };
                let detail = match detail {
                    Err(e) if e.is_fatal() => return Err(e),
                    other => other,
                };

                let extraction = self.chain.extract(order, detail.as_ref());
                match extraction.placeholder {
                    Some(PlaceholderKind::Error) => self.state.error_placeholders += 1,
                    Some(PlaceholderKind::StorePurchase) => self.state.placeholders += 1,
                    None => {}
                }
                self.state.orders_extracted += 1;
                self.state.line_items += extraction.items.len();
                self.emit(ProgressEvent::OrderExtracted {
                    order_id: order.order_id.clone(),
                    strategy: extraction.strategy,
                    line_items: extraction.items.len(),
                });
                items.extend(extraction.items);
            }

            self.store.write(date, &orders, &items)?;
            self.state.days_written += 1;
            days_written += 1;
            self.emit(ProgressEvent::DayPersisted {
                date,
                orders: orders.len(),
                line_items: items.len(),
            });
        }

        self.emit(ProgressEvent::MonthFinished {
            month,
            orders: listed,
            days_written,
            days_skipped,
        });
        Ok(listed)
    }
}
