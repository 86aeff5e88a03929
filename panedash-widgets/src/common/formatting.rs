// panedash-widgets/src/common/formatting.rs
use std::time::Duration;

/// Unit options for byte formatting
///
/// Auto picks the largest unit that keeps the value at or above 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Auto,
    Bytes,
    KB,
    MB,
    GB,
    TB,
}

impl Unit {
    /// Cycle to the next display unit
    pub fn next(self) -> Self {
        match self {
            Self::Auto => Self::Bytes,
            Self::Bytes => Self::KB,
            Self::KB => Self::MB,
            Self::MB => Self::GB,
            Self::GB => Self::TB,
            Self::TB => Self::Auto,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Bytes => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
            Self::TB => "TB",
        }
    }
}

/// Format bytes with automatic unit selection, e.g. "1.5 GB"
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_unit(bytes, Unit::Auto)
}

/// Format bytes with a fixed unit
///
/// # Example
/// ```rust
/// use panedash_widgets::common::{format_bytes_unit, Unit};
/// assert_eq!(format_bytes_unit(1024, Unit::KB), "1.0 KB");
/// assert_eq!(format_bytes_unit(1024, Unit::MB), "0.0 MB");
/// ```
pub fn format_bytes_unit(bytes: u64, unit: Unit) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    match unit {
        Unit::Auto => {
            if bytes >= TB {
                format!("{:.1} TB", bytes as f64 / TB as f64)
            } else if bytes >= GB {
                format!("{:.1} GB", bytes as f64 / GB as f64)
            } else if bytes >= MB {
                format!("{:.1} MB", bytes as f64 / MB as f64)
            } else if bytes >= KB {
                format!("{:.1} KB", bytes as f64 / KB as f64)
            } else {
                format!("{} B", bytes)
            }
        }
        Unit::Bytes => format!("{} B", bytes),
        Unit::KB => format!("{:.1} KB", bytes as f64 / KB as f64),
        Unit::MB => format!("{:.1} MB", bytes as f64 / MB as f64),
        Unit::GB => format!("{:.1} GB", bytes as f64 / GB as f64),
        Unit::TB => format!("{:.1} TB", bytes as f64 / TB as f64),
    }
}

pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Share of `total` taken by `used`, 0 when `total` is 0
pub fn percent_of(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Round-trip style latency: sub-millisecond values keep one decimal
pub fn format_latency(latency: Duration) -> String {
    let millis = latency.as_secs_f64() * 1000.0;
    if millis < 1.0 {
        format!("{:.1}ms", millis)
    } else {
        format!("{:.0}ms", millis)
    }
}

/// Compact uptime such as "3d 4h 12m"
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
        assert_eq!(format_bytes(1024_u64.pow(4)), "1.0 TB");
    }

    #[test]
    fn test_format_bytes_unit() {
        assert_eq!(format_bytes_unit(1024, Unit::KB), "1.0 KB");
        assert_eq!(format_bytes_unit(1024, Unit::MB), "0.0 MB");
        assert_eq!(format_bytes_unit(1024, Unit::Bytes), "1024 B");
    }

    #[test]
    fn test_unit_cycle_returns_to_auto() {
        let mut unit = Unit::Auto;
        for _ in 0..6 {
            unit = unit.next();
        }
        assert_eq!(unit, Unit::Auto);
        assert_eq!(Unit::GB.next(), Unit::TB);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 0), 0.0);
        assert_eq!(percent_of(25, 100), 25.0);
        assert_eq!(format_percentage(percent_of(1, 3)), "33.3%");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(Duration::from_micros(250)), "0.2ms");
        assert_eq!(format_latency(Duration::from_millis(12)), "12ms");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(2 * 86_400 + 5 * 3_600 + 120), "2d 5h 2m");
    }
}
