//! Narrow interfaces to the remote console.
//!
//! The extraction core only ever sees these traits, so it runs against the
//! HTTP bridge in production and against in-memory fakes in tests.

use chrono::NaiveDate;
use tracing::warn;

use crate::error::ExtractError;
use crate::page::PageSnapshot;

/// An authenticated, navigable console session.
pub trait ConsoleSession {
    /// Load `url` in the main page and return its rendered structure.
    fn navigate(&mut self, url: &str) -> Result<PageSnapshot, ExtractError>;

    /// Load an order's detail view in the auxiliary page. `detail_ref` may be
    /// relative to the page last navigated to.
    fn open_detail(&mut self, detail_ref: &str) -> Result<PageSnapshot, ExtractError>;

    fn close(&mut self) -> Result<(), ExtractError>;
}

pub trait SessionProvider {
    type Session: ConsoleSession;

    fn authenticate(&self) -> Result<Self::Session, ExtractError>;
}

/// Authenticate, run `f`, and close the session on every path.
pub fn within_session<P, T>(
    provider: &P,
    f: impl FnOnce(&mut P::Session) -> Result<T, ExtractError>,
) -> Result<T, ExtractError>
where
    P: SessionProvider,
{
    let mut session = provider.authenticate()?;
    let result = f(&mut session);
    if let Err(e) = session.close() {
        warn!(error = %e, "session close failed");
    }
    result
}

/// Applies list filters and the date range before extraction.
pub trait FilterConfigurator {
    /// One-time filter setup after authentication. Returns the filtered list
    /// URL.
    fn apply_filters(&mut self, session: &mut dyn ConsoleSession) -> Result<String, ExtractError>;

    /// Select `start..=end` and return the URL of the first list page.
    fn set_date_range(
        &mut self,
        session: &mut dyn ConsoleSession,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Fake<'a> {
        closed: &'a Cell<bool>,
    }

    impl ConsoleSession for Fake<'_> {
        fn navigate(&mut self, url: &str) -> Result<PageSnapshot, ExtractError> {
            Err(ExtractError::Timeout { url: url.into() })
        }
        fn open_detail(&mut self, detail_ref: &str) -> Result<PageSnapshot, ExtractError> {
            self.navigate(detail_ref)
        }
        fn close(&mut self) -> Result<(), ExtractError> {
            self.closed.set(true);
            Ok(())
        }
    }

    struct Provider<'a> {
        closed: &'a Cell<bool>,
    }

    impl<'a> SessionProvider for Provider<'a> {
        type Session = Fake<'a>;
        fn authenticate(&self) -> Result<Fake<'a>, ExtractError> {
            Ok(Fake {
                closed: self.closed,
            })
        }
    }

    #[test]
    fn session_closed_even_when_body_fails() {
        let closed = Cell::new(false);
        let provider = Provider { closed: &closed };
        let result: Result<(), _> = within_session(&provider, |s| {
            s.navigate("https://x/orders")?;
            Ok(())
        });
        assert!(matches!(result, Err(ExtractError::Timeout { .. })));
        assert!(closed.get());
    }
}
