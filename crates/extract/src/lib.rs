//! Order console extraction.
//!
//! A [`MonthDriver`] authenticates through a [`SessionProvider`], walks
//! months backward, lists each month's orders, extracts line items from every
//! order's detail view and persists complete days into the incremental store.
//! The console itself is reached through an HTTP bridge ([`BridgeProvider`]);
//! everything above the [`ConsoleSession`] trait is pure.

pub mod bridge;
pub mod driver;
pub mod error;
pub mod filters;
pub mod items;
pub mod list;
pub mod page;
pub mod partition;
pub mod session;

pub use bridge::{BridgeClient, BridgeProvider, BridgeSession};
pub use driver::{
    DriverOptions, DriverState, MonthDriver, ProgressEvent, ProgressSink, RunReport, RunState,
    StopReason, TracingSink,
};
pub use error::ExtractError;
pub use filters::QueryFilterConfigurator;
pub use items::{Extraction, LineItemStrategy, StrategyChain};
pub use list::{extract_orders, parse_list_page, ListOptions, ListOutcome};
pub use page::{Node, PageSnapshot, Rect};
pub use partition::{partition_by_day, Partitioned};
pub use session::{within_session, ConsoleSession, FilterConfigurator, SessionProvider};
