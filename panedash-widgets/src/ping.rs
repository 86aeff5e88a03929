// panedash-widgets/src/ping.rs
use panedash_core::{PaneWidget, RedrawBus, TextPane, WidgetConfig, WidgetError};
use ratatui::text::{Line, Text};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::{Status, format_latency};

const DEFAULT_TITLE: &str = "Ping";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PingSettings {
    pub targets: Vec<String>,
    /// Milliseconds allowed per connection attempt
    pub ping_timeout: u64,
    /// Port probed when a target does not name one
    pub port: u16,
    pub show_ip: bool,
    pub use_emoji: bool,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            ping_timeout: 200,
            port: 80,
            show_ip: true,
            use_emoji: true,
        }
    }
}

/// A configured host to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// What the user sees; IP literals are shown canonically
    pub label: String,
    pub host: String,
    pub port: u16,
    /// Set when the target was given as an address rather than a name
    pub ip: Option<IpAddr>,
}

impl Target {
    /// Accepts `1.2.3.4`, `::1`, `[::1]:22`, `1.2.3.4:53`, `host` and `host:port`
    pub fn parse(raw: &str, default_port: u16) -> Self {
        let raw = raw.trim();

        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Self::from_ip(ip, default_port, false);
        }
        if let Ok(addr) = raw.parse::<SocketAddr>() {
            return Self::from_ip(addr.ip(), addr.port(), true);
        }

        if let Some((host, port)) = raw.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                return Self {
                    label: raw.to_string(),
                    host: host.to_string(),
                    port,
                    ip: None,
                };
            }
        }

        Self {
            label: raw.to_string(),
            host: raw.to_string(),
            port: default_port,
            ip: None,
        }
    }

    fn from_ip(ip: IpAddr, port: u16, explicit_port: bool) -> Self {
        let label = match (ip, explicit_port) {
            (_, false) => ip.to_string(),
            (IpAddr::V4(_), true) => format!("{ip}:{port}"),
            (IpAddr::V6(_), true) => format!("[{ip}]:{port}"),
        };
        Self {
            label,
            host: ip.to_string(),
            port,
            ip: Some(ip),
        }
    }

    fn addresses(&self) -> std::io::Result<Vec<SocketAddr>> {
        match self.ip {
            Some(ip) => Ok(vec![SocketAddr::new(ip, self.port)]),
            None => Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub status: Status,
    /// Address that answered, or the first one tried
    pub addr: Option<SocketAddr>,
    pub latency: Option<Duration>,
}

/// Try each resolved address in turn until one accepts a connection
pub fn probe(target: &Target, timeout: Duration) -> Probe {
    let addrs = match target.addresses() {
        Ok(addrs) if !addrs.is_empty() => addrs,
        Ok(_) | Err(_) => {
            tracing::debug!(host = %target.label, "lookup failed");
            return Probe {
                status: Status::Fail,
                addr: None,
                latency: None,
            };
        }
    };

    for addr in &addrs {
        let started = Instant::now();
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(_) => {
                return Probe {
                    status: Status::Success,
                    addr: Some(*addr),
                    latency: Some(started.elapsed()),
                };
            }
            Err(err) => {
                tracing::trace!(host = %target.label, %addr, error = %err, "connect failed");
            }
        }
    }

    Probe {
        status: Status::Fail,
        addr: addrs.first().copied(),
        latency: None,
    }
}

/// Reachability probe over TCP connect, one line per target in config order
pub struct PingWidget {
    pane: TextPane,
    settings: PingSettings,
    targets: Vec<Target>,
}

impl PingWidget {
    pub fn new(config: &WidgetConfig, redraw: RedrawBus) -> Result<Self, WidgetError> {
        let common = config.common(DEFAULT_TITLE, true, DEFAULT_INTERVAL)?;
        let settings: PingSettings = config.settings()?;

        if settings.ping_timeout == 0 {
            return Err(WidgetError::InvalidSettings {
                widget: config.name.clone(),
                reason: "ping_timeout must be greater than 0".to_string(),
            });
        }

        let targets = settings
            .targets
            .iter()
            .map(|raw| Target::parse(raw, settings.port))
            .collect();

        Ok(Self {
            pane: TextPane::new(common, redraw),
            settings,
            targets,
        })
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    fn format_line(&self, target: &Target, probe: &Probe) -> Line<'static> {
        let mut text = target.label.clone();

        if self.settings.show_ip && target.ip.is_none() {
            if let Some(addr) = probe.addr {
                text.push_str(&format!(" ({})", addr.ip()));
            }
        }
        if let Some(latency) = probe.latency {
            text.push_str(&format!(" {}", format_latency(latency)));
        }

        probe.status.line(text, self.settings.use_emoji)
    }
}

impl PaneWidget for PingWidget {
    fn pane(&self) -> &TextPane {
        &self.pane
    }

    fn fetch(&self) -> Result<Text<'static>, WidgetError> {
        let timeout = Duration::from_millis(self.settings.ping_timeout);

        let probes: Vec<Probe> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .targets
                .iter()
                .map(|target| scope.spawn(move || probe(target, timeout)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or(Probe {
                        status: Status::Fail,
                        addr: None,
                        latency: None,
                    })
                })
                .collect()
        });

        let lines: Vec<Line<'static>> = self
            .targets
            .iter()
            .zip(&probes)
            .map(|(target, probe)| self.format_line(target, probe))
            .collect();
        Ok(Text::from(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panedash_core::{ConfigFile, Widget};
    use std::net::TcpListener;

    fn widget(extra: &str) -> Result<PingWidget, WidgetError> {
        let config =
            ConfigFile::parse(&format!("[[widget]]\nname = \"ping\"\ntype = \"ping\"\n{extra}\n"))
                .unwrap();
        PingWidget::new(&config.widgets[0], RedrawBus::new())
    }

    /// A port nothing listens on
    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_parse_targets() {
        let t = Target::parse("10.0.0.1", 80);
        assert_eq!((t.label.as_str(), t.port), ("10.0.0.1", 80));
        assert!(t.ip.is_some());

        let t = Target::parse("1.1.1.1:53", 80);
        assert_eq!((t.label.as_str(), t.host.as_str(), t.port), ("1.1.1.1:53", "1.1.1.1", 53));

        let t = Target::parse("example.com:8080", 80);
        assert_eq!((t.host.as_str(), t.port), ("example.com", 8080));
        assert!(t.ip.is_none());

        let t = Target::parse("example.com", 443);
        assert_eq!((t.label.as_str(), t.port), ("example.com", 443));
    }

    #[test]
    fn test_ipv6_literal_shown_canonically() {
        let t = Target::parse("2001:0db8:0000:0000:0000:0000:0000:0001", 80);
        assert_eq!(t.label, "2001:db8::1");
        assert_eq!(t.port, 80);

        let t = Target::parse("[0:0:0:0:0:0:0:1]:22", 80);
        assert_eq!(t.label, "[::1]:22");
        assert_eq!(t.port, 22);
    }

    #[test]
    fn test_probe_open_and_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = Target::parse(&listener.local_addr().unwrap().to_string(), 80);
        let result = probe(&open, Duration::from_millis(500));
        assert_eq!(result.status, Status::Success);
        assert!(result.latency.is_some());

        let closed = Target::parse(&format!("127.0.0.1:{}", closed_port()), 80);
        let result = probe(&closed, Duration::from_millis(500));
        assert_eq!(result.status, Status::Fail);
        assert!(result.latency.is_none());
    }

    #[test]
    fn test_fetch_lists_targets_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port();

        let ping = widget(&format!(
            "use_emoji = false\nping_timeout = 500\ntargets = [\"127.0.0.1:{closed}\", \"localhost:{open}\"]"
        ))
        .unwrap();
        ping.refresh();

        let body = ping.pane().body();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("127.0.0.1:{closed}"));
        assert!(lines[1].starts_with(&format!("localhost:{open} (")));
        assert!(lines[1].ends_with("ms"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            widget("ping_timeout = 0"),
            Err(WidgetError::InvalidSettings { .. })
        ));
    }
}
