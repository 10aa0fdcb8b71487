//! Filter setup by URL query parameters.

use chrono::NaiveDate;
use ordertrace_config::{FilterSettings, Settings};
use tracing::{debug, info};
use url::Url;

use crate::error::ExtractError;
use crate::session::{ConsoleSession, FilterConfigurator};

/// Encodes location, channel, page-size and date-range filters as query
/// parameters on the order list URL.
///
/// ```text
/// <list_url>?location=A&location=B&channel=Web&pageSize=100&from=2024-05-01&to=2024-05-31
/// ```
#[derive(Debug, Clone)]
pub struct QueryFilterConfigurator {
    list_url: Url,
    filters: FilterSettings,
}

impl QueryFilterConfigurator {
    pub fn new(list_url: &str, filters: FilterSettings) -> Result<Self, ExtractError> {
        let list_url = Url::parse(list_url).map_err(|e| ExtractError::Navigation {
            url: list_url.to_string(),
            detail: format!("invalid list URL: {}", e),
        })?;
        Ok(Self { list_url, filters })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ExtractError> {
        let list_url = settings.list_url()?;
        Self::new(&list_url, settings.filters.clone())
    }

    fn filtered_url(&self) -> Url {
        let mut url = self.list_url.clone();
        {
            let mut q = url.query_pairs_mut();
            for location in &self.filters.locations {
                q.append_pair("location", location);
            }
            for channel in &self.filters.channels {
                q.append_pair("channel", channel);
            }
            q.append_pair("pageSize", &self.filters.page_size.to_string());
        }
        url
    }
}

impl FilterConfigurator for QueryFilterConfigurator {
    fn apply_filters(&mut self, session: &mut dyn ConsoleSession) -> Result<String, ExtractError> {
        let url = self.filtered_url().to_string();
        // Loading the list once confirms the session can reach it before
        // months are walked.
        session.navigate(&url)?;
        info!(
            locations = self.filters.locations.len(),
            channels = self.filters.channels.len(),
            page_size = self.filters.page_size,
            "filters applied"
        );
        Ok(url)
    }

    fn set_date_range(
        &mut self,
        _session: &mut dyn ConsoleSession,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, ExtractError> {
        let mut url = self.filtered_url();
        url.query_pairs_mut()
            .append_pair("from", &start.format("%Y-%m-%d").to_string())
            .append_pair("to", &end.format("%Y-%m-%d").to_string());
        debug!(from = %start, to = %end, "date range set");
        Ok(url.to_string())
    }
}
