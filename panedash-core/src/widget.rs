// panedash-core/src/widget.rs
use crossterm::event::KeyEvent;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    prelude::Widget as RatatuiWidget,
    style::{Color, Style},
    text::Text,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::config::ConfigError;
use crate::redraw::RedrawBus;

/// Contract every dashboard pane fulfils.
///
/// Widgets are shared between their refresh loop and the render loop, so every
/// operation takes `&self` and implementors keep mutable state behind interior
/// mutability.
pub trait Widget: Send + Sync {
    /// Unique name within the generation
    fn name(&self) -> &str;

    /// Perform one fetch-and-render cycle. Faults are rendered, never raised.
    fn refresh(&self);

    /// Acquire what refreshing needs before the generation goes live.
    /// An error rejects the whole generation.
    fn prepare(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    /// Whether the scheduler should skip this cycle
    fn disabled(&self) -> bool {
        false
    }

    /// Release held resources. Must be idempotent.
    fn stop(&self) {}

    /// Time between automatic refreshes. Zero means refresh once, then only on demand.
    fn refresh_interval(&self) -> Duration;

    /// Key that jumps focus straight to this widget
    fn focus_char(&self) -> Option<char> {
        None
    }

    fn focusable(&self) -> bool {
        true
    }

    /// Toggle the focus highlight
    fn set_focused(&self, _focused: bool) {}

    /// Called by the scheduler when a refresh panicked
    fn report_fault(&self, _message: &str) {}

    /// Handle input while focused
    fn on_event(&self, _event: Event) -> EventResult {
        EventResult::Ignored
    }

    /// Render the widget to the buffer
    fn render(&self, area: Rect, buf: &mut Buffer);
}

#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Consumed, // Stop propagation
    Ignored,  // Let the host treat it as a global key
}

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("widget '{widget}': {reason}")]
    InvalidSettings { widget: String, reason: String },
    #[error("{0}")]
    Fetch(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings shared by every widget type, resolved once at build time
#[derive(Debug, Clone)]
pub struct CommonSettings {
    pub name: String,
    pub title: String,
    pub refresh_interval: Duration,
    pub focus_char: Option<char>,
    pub focusable: bool,
    pub enabled: bool,
    pub wrap_text: bool,
}

impl CommonSettings {
    pub fn new(name: impl Into<String>, refresh_interval: Duration) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            refresh_interval,
            focus_char: None,
            focusable: true,
            enabled: true,
            wrap_text: false,
        }
    }
}

/// What a pane currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum PaneContent {
    Pending,
    Text(Text<'static>),
    Error(String),
}

/// Border color for focus state
pub fn focus_color(focused: bool) -> Color {
    if focused {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

/// Shared rendering target for text based widgets.
///
/// Holds the widget's content, its enabled/focused/stopped flags, and the
/// generation's redraw bus. Content updates request a repaint; once the pane
/// is stopped they are discarded.
pub struct TextPane {
    settings: CommonSettings,
    enabled: AtomicBool,
    focused: AtomicBool,
    stopped: AtomicBool,
    content: Mutex<PaneContent>,
    redraw: RedrawBus,
}

impl TextPane {
    pub fn new(settings: CommonSettings, redraw: RedrawBus) -> Self {
        Self {
            enabled: AtomicBool::new(settings.enabled),
            focused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            content: Mutex::new(PaneContent::Pending),
            settings,
            redraw,
        }
    }

    pub fn settings(&self) -> &CommonSettings {
        &self.settings
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            self.redraw.request();
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::Acquire)
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually stopped the pane
    pub fn mark_stopped(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    pub fn set_text(&self, text: impl Into<Text<'static>>) {
        self.replace(PaneContent::Text(text.into()));
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.replace(PaneContent::Error(message.into()));
    }

    pub fn content(&self) -> PaneContent {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Plain text of the current content, lines joined with `\n`
    pub fn body(&self) -> String {
        match self.content() {
            PaneContent::Pending => String::new(),
            PaneContent::Text(text) => text
                .lines
                .iter()
                .map(|line| {
                    line.spans
                        .iter()
                        .map(|span| span.content.as_ref())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n"),
            PaneContent::Error(message) => message,
        }
    }

    fn replace(&self, content: PaneContent) {
        if self.is_stopped() {
            return;
        }
        *self.content.lock().unwrap_or_else(PoisonError::into_inner) = content;
        self.redraw.request();
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let focused = self.is_focused();
        let content = self.content();

        let border_color = match (&content, focused) {
            (_, true) => focus_color(true),
            (PaneContent::Error(_), false) => Color::Red,
            _ => focus_color(false),
        };

        let title = match self.settings.focus_char {
            Some(key) => format!(" {} [{}] ", self.settings.title, key),
            None => format!(" {} ", self.settings.title),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border_color));

        let body = if !self.is_enabled() {
            Text::styled("disabled", Style::default().fg(Color::DarkGray))
        } else {
            match content {
                PaneContent::Pending => {
                    Text::styled("loading...", Style::default().fg(Color::DarkGray))
                }
                PaneContent::Text(text) => text,
                PaneContent::Error(message) => {
                    Text::styled(message, Style::default().fg(Color::Red))
                }
            }
        };

        let mut paragraph = Paragraph::new(body).block(block);
        if self.settings.wrap_text {
            paragraph = paragraph.wrap(Wrap { trim: false });
        }

        RatatuiWidget::render(paragraph, area, buf);
    }
}

/// Fetch-only widgets backed by a [`TextPane`].
///
/// The blanket [`Widget`] impl turns `fetch` results into pane content and
/// maps lifecycle calls onto the pane.
pub trait PaneWidget: Send + Sync {
    fn pane(&self) -> &TextPane;

    /// Fetch fresh content. Errors are shown inline in the pane.
    fn fetch(&self) -> Result<Text<'static>, WidgetError>;

    /// Set up clients and connections ahead of the first fetch
    fn acquire(&self) -> Result<(), WidgetError> {
        Ok(())
    }

    /// Drop cached clients and connections
    fn release(&self) {}

    fn on_key(&self, _key: KeyEvent) -> EventResult {
        EventResult::Ignored
    }
}

impl<T: PaneWidget> Widget for T {
    fn name(&self) -> &str {
        self.pane().name()
    }

    fn refresh(&self) {
        let pane = self.pane();
        if pane.is_stopped() {
            return;
        }

        match self.fetch() {
            Ok(text) => pane.set_text(text),
            Err(err) => {
                tracing::debug!(widget = %pane.name(), error = %err, "refresh failed");
                pane.set_error(err.to_string());
            }
        }
    }

    fn prepare(&self) -> Result<(), WidgetError> {
        self.acquire()
    }

    fn disabled(&self) -> bool {
        !self.pane().is_enabled()
    }

    fn stop(&self) {
        if self.pane().mark_stopped() {
            self.release();
        }
    }

    fn refresh_interval(&self) -> Duration {
        self.pane().settings().refresh_interval
    }

    fn focus_char(&self) -> Option<char> {
        self.pane().settings().focus_char
    }

    fn focusable(&self) -> bool {
        self.pane().settings().focusable
    }

    fn set_focused(&self, focused: bool) {
        self.pane().set_focused(focused);
    }

    fn report_fault(&self, message: &str) {
        self.pane().set_error(format!("refresh panicked: {message}"));
    }

    fn on_event(&self, event: Event) -> EventResult {
        match event {
            Event::Key(key) => self.on_key(key),
        }
    }

    fn render(&self, area: Rect, buf: &mut Buffer) {
        self.pane().render(area, buf);
    }
}
