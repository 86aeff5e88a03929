// panedash-widgets/src/webcheck.rs
use panedash_core::{PaneWidget, RedrawBus, TextPane, WidgetConfig, WidgetError};
use ratatui::text::{Line, Text};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::common::Status;

const DEFAULT_TITLE: &str = "WebCheck";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebcheckSettings {
    pub urls: Vec<String>,
    /// Statuses reported as `warn` instead of `fail`/`success`
    pub warn_codes: Vec<u16>,
    /// Seconds
    pub tls_handshake_timeout: u64,
    /// Seconds
    pub response_header_timeout: u64,
    /// Seconds
    pub full_response_timeout: u64,
    pub follow_redirects: bool,
    pub ignore_bad_ssl: bool,
    pub use_emoji: bool,
}

impl Default for WebcheckSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            warn_codes: Vec::new(),
            tls_handshake_timeout: 2,
            response_header_timeout: 3,
            full_response_timeout: 6,
            follow_redirects: true,
            ignore_bad_ssl: false,
            use_emoji: true,
        }
    }
}

impl WebcheckSettings {
    fn build_client(&self) -> reqwest::Result<Client> {
        let redirect = if self.follow_redirects {
            Policy::default()
        } else {
            Policy::none()
        };

        Client::builder()
            .connect_timeout(Duration::from_secs(self.tls_handshake_timeout))
            .timeout(Duration::from_secs(self.full_response_timeout))
            .pool_max_idle_per_host(0)
            .redirect(redirect)
            .danger_accept_invalid_certs(self.ignore_bad_ssl)
            .build()
    }

    /// Budget for receiving the status line. The body is never read.
    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            (self.tls_handshake_timeout + self.response_header_timeout)
                .min(self.full_response_timeout),
        )
    }
}

/// Map a response status onto a check outcome
pub fn classify(status: u16, warn_codes: &[u16]) -> Status {
    if warn_codes.contains(&status) {
        Status::Warn
    } else if status >= 400 {
        Status::Fail
    } else {
        Status::Success
    }
}

/// HTTP reachability checker.
///
/// Every refresh issues one GET per configured URL, all in parallel, and
/// lists the URLs marked by outcome.
pub struct WebcheckWidget {
    pane: TextPane,
    settings: WebcheckSettings,
    client: Mutex<Option<Client>>,
}

impl WebcheckWidget {
    pub fn new(config: &WidgetConfig, redraw: RedrawBus) -> Result<Self, WidgetError> {
        let common = config.common(DEFAULT_TITLE, true, DEFAULT_INTERVAL)?;
        let settings: WebcheckSettings = config.settings()?;

        if settings.urls.is_empty() {
            tracing::warn!(widget = %config.name, "webcheck has no urls configured");
        }

        Ok(Self {
            pane: TextPane::new(common, redraw),
            settings,
            client: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &WebcheckSettings {
        &self.settings
    }

    fn client(&self) -> Result<Client, WidgetError> {
        let mut cached = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }

        let client = self
            .settings
            .build_client()
            .map_err(|e| WidgetError::Fetch(format!("failed to build HTTP client: {e}")))?;
        *cached = Some(client.clone());
        Ok(client)
    }

    fn check(&self, client: &Client, url: &str) -> Status {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(widget = %self.pane.name(), url, error = %err, "invalid url");
                return Status::Fail;
            }
        };

        match client
            .get(parsed)
            .timeout(self.settings.request_timeout())
            .send()
        {
            Ok(response) => {
                let code = response.status().as_u16();
                let status = classify(code, &self.settings.warn_codes);
                if status != Status::Success {
                    tracing::debug!(
                        widget = %self.pane.name(),
                        url,
                        code,
                        status = status.as_str(),
                        "unhealthy response"
                    );
                }
                status
            }
            Err(err) => {
                tracing::debug!(widget = %self.pane.name(), url, error = %err, "request failed");
                Status::Fail
            }
        }
    }
}

impl PaneWidget for WebcheckWidget {
    fn pane(&self) -> &TextPane {
        &self.pane
    }

    fn fetch(&self) -> Result<Text<'static>, WidgetError> {
        let client = self.client()?;

        let mut results: Vec<(Status, &String)> = thread::scope(|scope| {
            let checks: Vec<_> = self
                .settings
                .urls
                .iter()
                .map(|url| {
                    let client = &client;
                    scope.spawn(move || (self.check(client, url), url))
                })
                .collect();

            checks
                .into_iter()
                .zip(&self.settings.urls)
                .map(|(check, url)| check.join().unwrap_or((Status::Fail, url)))
                .collect()
        });
        results.sort();

        let lines: Vec<Line<'static>> = results
            .into_iter()
            .map(|(status, url)| status.line(url.clone(), self.settings.use_emoji))
            .collect();
        Ok(Text::from(lines))
    }

    fn acquire(&self) -> Result<(), WidgetError> {
        self.client().map(drop)
    }

    fn release(&self) {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panedash_core::{ConfigFile, Widget};
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answers `GET /<code>` with that status until the test ends
    fn status_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut buf = [0u8; 2048];
                let n = stream.read(&mut buf).unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let code = request
                    .split_whitespace()
                    .nth(1)
                    .and_then(|path| path.trim_start_matches('/').parse::<u16>().ok())
                    .unwrap_or(200);
                let response = format!(
                    "HTTP/1.1 {code} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://{addr}")
    }

    fn widget(extra: &str) -> WebcheckWidget {
        let config = ConfigFile::parse(&format!(
            "[[widget]]\nname = \"web\"\ntype = \"webcheck\"\n{extra}\n"
        ))
        .unwrap();
        WebcheckWidget::new(&config.widgets[0], RedrawBus::new()).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(200, &[]), Status::Success);
        assert_eq!(classify(301, &[]), Status::Success);
        assert_eq!(classify(404, &[]), Status::Fail);
        assert_eq!(classify(503, &[503]), Status::Warn);
        assert_eq!(classify(200, &[200]), Status::Warn);
    }

    #[test]
    fn test_settings_defaults() {
        let web = widget("");
        let settings = web.settings();
        assert_eq!(settings.tls_handshake_timeout, 2);
        assert_eq!(settings.full_response_timeout, 6);
        assert!(settings.follow_redirects);
        assert!(settings.use_emoji);
        assert_eq!(web.refresh_interval(), DEFAULT_INTERVAL);
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_bad_settings_rejected() {
        let config =
            ConfigFile::parse("[[widget]]\nname = \"web\"\ntype = \"webcheck\"\nurls = 5\n")
                .unwrap();
        assert!(WebcheckWidget::new(&config.widgets[0], RedrawBus::new()).is_err());
    }

    #[test]
    fn test_fetch_reports_each_url_sorted() {
        let base = status_server();
        let web = widget(&format!(
            "use_emoji = true\nwarn_codes = [418]\nurls = [\"{base}/500\", \"{base}/200\", \"{base}/418\", \"not a url\"]"
        ));

        web.refresh();

        let body = web.pane().body();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("🟢 {base}/200"));
        assert_eq!(lines[1], format!("🟠 {base}/418"));
        assert!(lines[2..].contains(&format!("🔴 {base}/500").as_str()));
        assert!(lines[2..].contains(&"🔴 not a url"));
    }

    #[test]
    fn test_prepare_builds_client_up_front() {
        let web = widget("urls = []");
        assert!(web.client.lock().unwrap().is_none());

        web.prepare().unwrap();
        assert!(web.client.lock().unwrap().is_some());
    }

    #[test]
    fn test_release_drops_cached_client() {
        let web = widget("urls = []");
        web.refresh();
        assert!(web.client.lock().unwrap().is_some());

        web.stop();
        assert!(web.client.lock().unwrap().is_none());
    }
}
