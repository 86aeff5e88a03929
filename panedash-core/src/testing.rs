// panedash-core/src/testing.rs
use ratatui::text::Text;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::WidgetConfig;
use crate::widget::{CommonSettings, PaneWidget, TextPane, WidgetError};
use crate::{RedrawBus, WidgetRegistry};

pub(crate) fn stub_settings(name: &str, interval: Duration) -> CommonSettings {
    CommonSettings::new(name, interval)
}

/// Widget double that counts fetches and can be told to fail, panic, or stall
pub(crate) struct StubWidget {
    pane: TextPane,
    fetches: AtomicUsize,
    releases: AtomicUsize,
    fail: AtomicBool,
    panic: AtomicBool,
    fail_prepare: AtomicBool,
    delay: Duration,
}

impl StubWidget {
    pub fn with_settings(settings: CommonSettings, redraw: RedrawBus) -> Self {
        Self::with_delay(settings, redraw, Duration::ZERO)
    }

    pub fn with_delay(settings: CommonSettings, redraw: RedrawBus, delay: Duration) -> Self {
        Self {
            pane: TextPane::new(settings, redraw),
            fetches: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
            fail_prepare: AtomicBool::new(false),
            delay,
        }
    }

    /// Config driven constructor used by the `stub` registry entry.
    /// Reads `fetch_delay_ms` and `build_delay_ms`. `fail_build = true` rejects the
    /// widget and `fail_prepare = true` makes it refuse to go live.
    pub fn new(config: &WidgetConfig, redraw: RedrawBus) -> Result<Self, WidgetError> {
        let int = |key: &str| {
            config
                .settings
                .get(key)
                .and_then(|v| v.as_integer())
                .unwrap_or(0)
                .max(0) as u64
        };

        if config
            .settings
            .get("fail_build")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return Err(WidgetError::InvalidSettings {
                widget: config.name.clone(),
                reason: "stub asked to fail".to_string(),
            });
        }

        std::thread::sleep(Duration::from_millis(int("build_delay_ms")));

        let settings = config.common(&config.name, true, Duration::from_secs(1))?;
        let widget = Self::with_delay(
            settings,
            redraw,
            Duration::from_millis(int("fetch_delay_ms")),
        );
        let fail_prepare = config
            .settings
            .get("fail_prepare")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        widget.fail_prepare.store(fail_prepare, Ordering::SeqCst);
        Ok(widget)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn panic_next(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }
}

impl PaneWidget for StubWidget {
    fn pane(&self) -> &TextPane {
        &self.pane
    }

    fn fetch(&self) -> Result<Text<'static>, WidgetError> {
        let count = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("stub exploded");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(WidgetError::Fetch("stub failure".to_string()));
        }
        Ok(Text::raw(format!("fetch {count}")))
    }

    fn acquire(&self) -> Result<(), WidgetError> {
        if self.fail_prepare.load(Ordering::SeqCst) {
            return Err(WidgetError::Fetch("stub refused to start".to_string()));
        }
        Ok(())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn stub_registry() -> Arc<WidgetRegistry> {
    let mut registry = WidgetRegistry::new();
    crate::register_widget!(registry, "stub", StubWidget);
    Arc::new(registry)
}
