// panedash-core/src/config.rs
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::widget::CommonSettings;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_NAME: &str = "panedash.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config directory not found")]
    NoConfigDir,
    #[error("no widgets defined, add at least one [[widget]] table")]
    NoWidgets,
    #[error("widget name '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("widget '{widget}': focus_char must be a single character, got {value:?}")]
    InvalidFocusChar { widget: String, value: String },
    #[error("widgets '{first}' and '{second}' share focus_char '{key}'")]
    DuplicateFocusChar {
        key: char,
        first: String,
        second: String,
    },
    #[error("{field}: invalid duration {value:?} (use seconds or e.g. \"500ms\", \"30s\", \"5m\")")]
    InvalidDuration { field: String, value: String },
    #[error("dashboard.columns must be at least 1")]
    InvalidColumns,
    #[error("widget '{widget}': {reason}")]
    InvalidSettings { widget: String, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default, rename = "widget")]
    pub widgets: Vec<WidgetConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub columns: u16,
    /// How long retiring a generation waits for refresh loops
    pub stop_grace: DurationSetting,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "panedash".to_string(),
            columns: 2,
            stop_grace: DurationSetting::Text("2s".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Allow jumping to a widget with its focus_char
    pub shortcuts: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { shortcuts: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WidgetConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub refresh_interval: Option<DurationSetting>,
    #[serde(default)]
    pub focus_char: Option<String>,
    #[serde(default)]
    pub focusable: Option<bool>,
    #[serde(default)]
    pub wrap_text: bool,
    /// Widget-specific keys
    #[serde(flatten)]
    pub settings: toml::Table,
}

fn default_true() -> bool {
    true
}

/// Whole seconds, or a string such as `"500ms"`, `"30s"`, `"5m"`, `"1h"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(u64),
    Text(String),
}

impl DurationSetting {
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            DurationSetting::Seconds(secs) => Some(Duration::from_secs(*secs)),
            DurationSetting::Text(text) => parse_duration(text),
        }
    }

    fn resolve(&self, field: impl Into<String>) -> Result<Duration, ConfigError> {
        self.to_duration().ok_or_else(|| ConfigError::InvalidDuration {
            field: field.into(),
            value: match self {
                DurationSetting::Seconds(secs) => secs.to_string(),
                DurationSetting::Text(text) => text.clone(),
            },
        })
    }
}

/// Parse `<digits><unit>` where unit is one of `ms`, `s`, `m`, `h` (default `s`)
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let value: u64 = digits.parse().ok()?;

    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(value.checked_mul(3600)?)),
        _ => None,
    }
}

impl WidgetConfig {
    pub fn focus_key(&self) -> Result<Option<char>, ConfigError> {
        let Some(value) = &self.focus_char else {
            return Ok(None);
        };

        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => Ok(Some(key)),
            _ => Err(ConfigError::InvalidFocusChar {
                widget: self.name.clone(),
                value: value.clone(),
            }),
        }
    }

    /// Resolve common settings, filling gaps with the widget type's defaults
    pub fn common(
        &self,
        default_title: &str,
        default_focusable: bool,
        default_interval: Duration,
    ) -> Result<CommonSettings, ConfigError> {
        let refresh_interval = match &self.refresh_interval {
            Some(setting) => setting.resolve(format!("widget '{}' refresh_interval", self.name))?,
            None => default_interval,
        };

        Ok(CommonSettings {
            name: self.name.clone(),
            title: self
                .title
                .clone()
                .unwrap_or_else(|| default_title.to_string()),
            refresh_interval,
            focus_char: self.focus_key()?,
            focusable: self.focusable.unwrap_or(default_focusable),
            enabled: self.enabled,
            wrap_text: self.wrap_text,
        })
    }

    /// Deserialize the widget-specific keys into a typed settings struct
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.settings.clone())
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidSettings {
                widget: self.name.clone(),
                reason: e.message().to_string(),
            })
    }
}

impl ConfigFile {
    /// Resolve which file to use.
    ///
    /// Priority: explicit path -> ./panedash.toml -> ~/.config/panedash/config.toml
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path);
        }

        let local = std::env::current_dir()?.join(LOCAL_CONFIG_NAME);
        if local.exists() {
            return Ok(local);
        }

        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("panedash/config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Write the starter config if nothing exists at `path` yet
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, STARTER_CONFIG)?;
        Ok(true)
    }

    pub fn stop_grace(&self) -> Result<Duration, ConfigError> {
        self.dashboard.stop_grace.resolve("dashboard.stop_grace")
    }

    /// Check everything that does not need a widget factory
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.widgets.is_empty() {
            return Err(ConfigError::NoWidgets);
        }
        if self.dashboard.columns == 0 {
            return Err(ConfigError::InvalidColumns);
        }
        self.stop_grace()?;

        let mut names = HashSet::new();
        let mut keys: HashMap<char, &str> = HashMap::new();

        for widget in &self.widgets {
            if !names.insert(widget.name.as_str()) {
                return Err(ConfigError::DuplicateName(widget.name.clone()));
            }

            if let Some(setting) = &widget.refresh_interval {
                setting.resolve(format!("widget '{}' refresh_interval", widget.name))?;
            }

            let Some(key) = widget.focus_key()? else {
                continue;
            };
            if !widget.focusable.unwrap_or(true) {
                tracing::warn!(widget = %widget.name, "focus_char set on a widget that is not focusable");
                continue;
            }
            if let Some(first) = keys.insert(key, &widget.name) {
                return Err(ConfigError::DuplicateFocusChar {
                    key,
                    first: first.to_string(),
                    second: widget.name.clone(),
                });
            }
        }

        Ok(())
    }
}

pub const STARTER_CONFIG: &str = r#"# panedash configuration
#
# Every [[widget]] needs a unique name and a type (webcheck, ping, system).
# Common keys: enabled, title, refresh_interval ("30s", "500ms" or seconds),
# focus_char (single key that jumps focus to the widget), focusable, wrap_text.
# The file is watched; saving it rebuilds the dashboard.

[dashboard]
title = "panedash"
columns = 2
stop_grace = "2s"

[navigation]
shortcuts = true

[[widget]]
name = "system"
type = "system"
refresh_interval = "2s"
focus_char = "1"

[[widget]]
name = "web"
type = "webcheck"
refresh_interval = "30s"
focus_char = "2"
urls = ["https://www.rust-lang.org"]

[[widget]]
name = "ping"
type = "ping"
refresh_interval = "10s"
focus_char = "3"
targets = ["1.1.1.1:53", "localhost:22"]
"#;
