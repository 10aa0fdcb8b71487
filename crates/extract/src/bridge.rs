//! Session provider backed by a headless-browser bridge.
//!
//! The bridge is a small HTTP sidecar that owns a real browser:
//!
//! | Method | Path                        | Body                                     | Returns          |
//! |--------|-----------------------------|------------------------------------------|------------------|
//! | POST   | `/sessions`                 | `login_url`, `username`, `password`, `timeout_ms` | `{"session_id"}` |
//! | POST   | `/sessions/{id}/navigate`   | `url`, `page` (`main`/`aux`), `timeout_ms` | page snapshot    |
//! | DELETE | `/sessions/{id}`            |                                          | empty            |
//!
//! Requests retry with exponential backoff on 429, 5xx and transport
//! errors. 401/403 mean the console rejected the credentials or revoked the
//! session and are never retried.

use std::fmt;
use std::thread;
use std::time::Duration;

use ordertrace_config::BridgeSettings;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::page::PageSnapshot;
use crate::session::{ConsoleSession, SessionProvider};

const USER_AGENT: &str = concat!("ordertrace/", env!("CARGO_PKG_VERSION"));

/// Extra client-side slack on top of the bridge's own page-wait timeout.
const TIMEOUT_SLACK: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    max_retries: u32,
    initial_backoff: Duration,
    page_timeout: Duration,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl BridgeClient {
    pub fn new(settings: &BridgeSettings) -> Result<Self, ExtractError> {
        let page_timeout = Duration::from_secs(settings.timeout_secs);
        let http = reqwest::blocking::Client::builder()
            .timeout(page_timeout + TIMEOUT_SLACK)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Unreachable {
                endpoint: settings.endpoint.clone(),
                detail: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_secs(1),
            page_timeout,
        })
    }

    /// Override the first retry delay (doubles on every retry).
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn timeout_ms(&self) -> u64 {
        self.page_timeout.as_millis() as u64
    }

    /// Send a request with retry + exponential backoff and return the body.
    ///
    /// `target` names what the request is about (a page URL, "login") for
    /// error messages. `build_request` is called once per attempt.
    fn request_with_retry(
        &self,
        target: &str,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<String, ExtractError> {
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            match build_request(&self.http).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 401 || status == 403 {
                        let msg = error_message(resp.text().unwrap_or_default());
                        return Err(ExtractError::Auth(format!("HTTP {}: {}", status, msg)));
                    }

                    if status == 408 || status == 504 {
                        return Err(ExtractError::Timeout {
                            url: target.to_string(),
                        });
                    }

                    if (400..500).contains(&status) && status != 429 {
                        let msg = error_message(resp.text().unwrap_or_default());
                        return Err(ExtractError::Navigation {
                            url: target.to_string(),
                            detail: format!("HTTP {}: {}", status, msg),
                        });
                    }

                    if status == 429 || status >= 500 {
                        if attempt == self.max_retries {
                            return Err(ExtractError::Navigation {
                                url: target.to_string(),
                                detail: format!(
                                    "{} after {} attempts (HTTP {})",
                                    if status == 429 { "rate limited" } else { "bridge error" },
                                    attempt + 1,
                                    status,
                                ),
                            });
                        }

                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.trim().parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };

                        warn!(
                            attempt = attempt + 1,
                            max = self.max_retries,
                            wait_ms = wait.as_millis() as u64,
                            status,
                            target,
                            "bridge retry"
                        );
                        thread::sleep(wait);
                        backoff *= 2;
                        continue;
                    }

                    let text = resp.text().map_err(|e| ExtractError::Protocol(format!(
                        "failed to read bridge response for {}: {}",
                        target, e
                    )))?;
                    return Ok(text.trim_start_matches('\u{feff}').to_string());
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(ExtractError::Timeout {
                            url: target.to_string(),
                        });
                    }
                    if attempt == self.max_retries {
                        return Err(ExtractError::Unreachable {
                            endpoint: self.endpoint.clone(),
                            detail: format!("{} (after {} attempts)", e, attempt + 1),
                        });
                    }
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        wait_ms = backoff.as_millis() as u64,
                        error = %e,
                        "bridge retry"
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }

        Err(ExtractError::Unreachable {
            endpoint: self.endpoint.clone(),
            detail: "retries exhausted".into(),
        })
    }
}

/// Pull a readable message out of a bridge error body.
fn error_message(body: String) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(&body) {
        for key in ["error", "message"] {
            if let Some(s) = v.get(key).and_then(|m| m.as_str()) {
                return s.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "(no body)".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

// ── Provider ───────────────────────────────────────────────────────

pub struct BridgeProvider {
    client: BridgeClient,
    login_url: String,
    username: String,
    password: String,
}

impl fmt::Debug for BridgeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeProvider")
            .field("client", &self.client)
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BridgeProvider {
    pub fn new(client: BridgeClient, login_url: &str, username: &str, password: &str) -> Self {
        Self {
            client,
            login_url: login_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct SessionCreated {
    session_id: String,
}

impl SessionProvider for BridgeProvider {
    type Session = BridgeSession;

    fn authenticate(&self) -> Result<BridgeSession, ExtractError> {
        let url = format!("{}/sessions", self.client.endpoint);
        let body = json!({
            "login_url": self.login_url,
            "username": self.username,
            "password": self.password,
            "timeout_ms": self.client.timeout_ms(),
        });
        let text = self
            .client
            .request_with_retry("login", |http| http.post(&url).json(&body))?;
        let created: SessionCreated = serde_json::from_str(&text)
            .map_err(|e| ExtractError::Protocol(format!("bad session response: {}", e)))?;
        debug!(session = %created.session_id, "bridge session opened");
        Ok(BridgeSession {
            client: self.client.clone(),
            id: created.session_id,
            current_url: None,
            closed: false,
        })
    }
}

// ── Session ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct BridgeSession {
    client: BridgeClient,
    id: String,
    current_url: Option<String>,
    closed: bool,
}

impl BridgeSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, url: &str, page: &str) -> Result<PageSnapshot, ExtractError> {
        let endpoint = format!("{}/sessions/{}/navigate", self.client.endpoint, self.id);
        let body = json!({
            "url": url,
            "page": page,
            "timeout_ms": self.client.timeout_ms(),
        });
        let text = self
            .client
            .request_with_retry(url, |http| http.post(&endpoint).json(&body))?;
        let mut snapshot: PageSnapshot = serde_json::from_str(&text).map_err(|e| {
            ExtractError::Protocol(format!("bad page snapshot for {}: {}", url, e))
        })?;
        if snapshot.url.is_empty() {
            snapshot.url = url.to_string();
        }
        Ok(snapshot)
    }

    fn resolve(&self, reference: &str) -> String {
        let base = self
            .current_url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok());
        match base.and_then(|b| b.join(reference).ok()) {
            Some(u) => u.to_string(),
            None => reference.to_string(),
        }
    }
}

impl ConsoleSession for BridgeSession {
    fn navigate(&mut self, url: &str) -> Result<PageSnapshot, ExtractError> {
        let snapshot = self.load(url, "main")?;
        self.current_url = Some(snapshot.url.clone());
        Ok(snapshot)
    }

    fn open_detail(&mut self, detail_ref: &str) -> Result<PageSnapshot, ExtractError> {
        let url = self.resolve(detail_ref);
        self.load(&url, "aux")
    }

    fn close(&mut self) -> Result<(), ExtractError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let endpoint = format!("{}/sessions/{}", self.client.endpoint, self.id);
        self.client
            .request_with_retry("logout", |http| http.delete(&endpoint))?;
        debug!(session = %self.id, "bridge session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> BridgeClient {
        BridgeClient::new(&BridgeSettings {
            endpoint: server.base_url(),
            timeout_secs: 5,
            max_retries: 3,
        })
        .unwrap()
        .with_backoff(Duration::ZERO)
    }

    fn provider(server: &MockServer) -> BridgeProvider {
        BridgeProvider::new(client(server), "https://pos.example.com/login", "ops", "hunter2")
    }

    fn snapshot_json(url: &str) -> serde_json::Value {
        serde_json::json!({
            "url": url,
            "text": "Order O-1",
            "root": {"tag": "body", "children": [{"tag": "h1", "text": "Order O-1"}]}
        })
    }

    #[test]
    fn session_lifecycle() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/sessions")
                .body_includes("\"username\":\"ops\"");
            then.status(200).json_body(serde_json::json!({"session_id": "s1"}));
        });
        let list = server.mock(|when, then| {
            when.method(POST)
                .path("/sessions/s1/navigate")
                .body_includes("\"page\":\"main\"");
            then.status(200)
                .json_body(snapshot_json("https://pos.example.com/orders?page=1"));
        });
        let detail = server.mock(|when, then| {
            when.method(POST)
                .path("/sessions/s1/navigate")
                .body_includes("\"page\":\"aux\"")
                .body_includes("https://pos.example.com/orders/42");
            then.status(200).json_body(snapshot_json(""));
        });
        let logout = server.mock(|when, then| {
            when.method(DELETE).path("/sessions/s1");
            then.status(204);
        });

        let mut session = provider(&server).authenticate().unwrap();
        assert_eq!(session.id(), "s1");
        let page = session.navigate("https://pos.example.com/orders?page=1").unwrap();
        assert_eq!(page.len(), 2);
        let detail_page = session.open_detail("/orders/42").unwrap();
        assert_eq!(detail_page.url, "https://pos.example.com/orders/42");
        session.close().unwrap();
        session.close().unwrap();

        login.assert();
        list.assert();
        detail.assert();
        logout.assert_calls(1);
    }

    #[test]
    fn rejected_login_is_fatal_and_not_retried() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST).path("/sessions");
            then.status(401)
                .json_body(serde_json::json!({"error": "invalid credentials"}));
        });

        let err = provider(&server).authenticate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invalid credentials"), "{}", err);
        login.assert_calls(1);
    }

    #[test]
    fn rate_limit_retries_then_gives_up() {
        let server = MockServer::start();
        let nav = server.mock(|when, then| {
            when.method(POST).path("/sessions/s9/navigate");
            then.status(429).header("retry-after", "0");
        });

        let mut session = BridgeSession {
            client: client(&server),
            id: "s9".into(),
            current_url: None,
            closed: true,
        };
        let err = session.navigate("https://pos.example.com/orders").unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("rate limited"), "{}", err);
        // 1 initial + 3 retries
        nav.assert_calls(4);
    }

    #[test]
    fn gateway_timeout_is_a_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/sessions/s2/navigate");
            then.status(504);
        });
        let mut session = BridgeSession {
            client: client(&server),
            id: "s2".into(),
            current_url: None,
            closed: true,
        };
        let err = session.navigate("https://pos.example.com/orders/1").unwrap_err();
        assert!(matches!(err, ExtractError::Timeout { .. }));
    }

    #[test]
    fn malformed_snapshot_is_protocol_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/sessions/s3/navigate");
            then.status(200).body("<html>not json</html>");
        });
        let mut session = BridgeSession {
            client: client(&server),
            id: "s3".into(),
            current_url: None,
            closed: true,
        };
        let err = session.navigate("https://pos.example.com/orders").unwrap_err();
        assert!(matches!(err, ExtractError::Protocol(_)));
    }

    #[test]
    fn debug_output_redacts_password() {
        let server = MockServer::start();
        let rendered = format!("{:?}", provider(&server));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
