// panedash-widgets/src/common/colors.rs
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

/// Threshold constants for usage-based coloring
pub const LOW_THRESHOLD: f64 = 60.0;
pub const HIGH_THRESHOLD: f64 = 80.0;

/// Green below 60%, yellow below 80%, red from there on
pub fn usage_color(percentage: f64) -> Color {
    if percentage < LOW_THRESHOLD {
        Color::Green
    } else if percentage < HIGH_THRESHOLD {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Outcome of a single reachability check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Success,
    Warn,
    Fail,
}

impl Status {
    pub fn color(self) -> Color {
        match self {
            Status::Success => Color::Green,
            Status::Warn => Color::Yellow,
            Status::Fail => Color::Red,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Status::Success => "🟢",
            Status::Warn => "🟠",
            Status::Fail => "🔴",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Warn => "warn",
            Status::Fail => "fail",
        }
    }

    /// One output line: an emoji marker, or the whole line colored by status
    pub fn line(self, text: String, use_emoji: bool) -> Line<'static> {
        if use_emoji {
            Line::from(format!("{} {}", self.emoji(), text))
        } else {
            Line::from(Span::styled(text, Style::default().fg(self.color())))
        }
    }
}
