// panedash-widgets/src/system.rs
use crossterm::event::{KeyCode, KeyEvent};
use panedash_core::{EventResult, PaneWidget, RedrawBus, TextPane, WidgetConfig, WidgetError};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span, Text},
};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use sysinfo::System;

use crate::common::{Unit, format_bytes_unit, format_percentage, format_uptime, percent_of, usage_color};

const DEFAULT_TITLE: &str = "System";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// One reading of host memory and load
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemMetrics {
    pub used_memory: u64,
    pub total_memory: u64,
    pub swap_used: u64,
    pub swap_total: u64,
    pub load: [f64; 3],
    pub uptime: u64,
}

impl SystemMetrics {
    pub fn usage_percent(&self) -> f64 {
        percent_of(self.used_memory, self.total_memory)
    }

    pub fn swap_percent(&self) -> f64 {
        percent_of(self.swap_used, self.swap_total)
    }

    pub fn has_swap(&self) -> bool {
        self.swap_total > 0
    }

    pub fn render(&self, unit: Unit) -> Text<'static> {
        let mut lines = vec![usage_line(
            "RAM ",
            self.used_memory,
            self.total_memory,
            self.usage_percent(),
            unit,
        )];

        if self.has_swap() {
            lines.push(usage_line(
                "SWAP",
                self.swap_used,
                self.swap_total,
                self.swap_percent(),
                unit,
            ));
        }

        let [one, five, fifteen] = self.load;
        lines.push(Line::from(format!(
            "LOAD {:.2} {:.2} {:.2}",
            one, five, fifteen
        )));
        lines.push(Line::from(format!("UP   {}", format_uptime(self.uptime))));

        if unit != Unit::Auto {
            lines.push(Line::from(Span::styled(
                format!("unit: {}", unit.label()),
                Style::default().fg(Color::DarkGray),
            )));
        }

        Text::from(lines)
    }
}

fn usage_line(label: &str, used: u64, total: u64, percent: f64, unit: Unit) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!(
            "{} {} / {} ",
            label,
            format_bytes_unit(used, unit),
            format_bytes_unit(total, unit)
        )),
        Span::styled(
            format_percentage(percent),
            Style::default().fg(usage_color(percent)),
        ),
    ])
}

/// Memory, swap, load average and uptime of the local host
///
/// # Keyboard Shortcuts
/// - `u` - Cycle through display units (Auto → Bytes → KB → MB → GB → TB)
pub struct SystemWidget {
    pane: TextPane,
    system: Mutex<System>,
    unit: Mutex<Unit>,
    last: Mutex<Option<SystemMetrics>>,
}

impl SystemWidget {
    pub fn new(config: &WidgetConfig, redraw: RedrawBus) -> Result<Self, WidgetError> {
        let common = config.common(DEFAULT_TITLE, true, DEFAULT_INTERVAL)?;

        Ok(Self {
            pane: TextPane::new(common, redraw),
            system: Mutex::new(System::new()),
            unit: Mutex::new(Unit::Auto),
            last: Mutex::new(None),
        })
    }

    pub fn unit(&self) -> Unit {
        *self.unit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn poll(&self) -> SystemMetrics {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        let load = System::load_average();
        SystemMetrics {
            used_memory: system.used_memory(),
            total_memory: system.total_memory(),
            swap_used: system.used_swap(),
            swap_total: system.total_swap(),
            load: [load.one, load.five, load.fifteen],
            uptime: System::uptime(),
        }
    }
}

impl PaneWidget for SystemWidget {
    fn pane(&self) -> &TextPane {
        &self.pane
    }

    fn fetch(&self) -> Result<Text<'static>, WidgetError> {
        let metrics = self.poll();
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(metrics);

        if metrics.usage_percent() >= 90.0 {
            tracing::debug!(
                widget = %self.pane.name(),
                usage = metrics.usage_percent(),
                "memory pressure"
            );
        }
        Ok(metrics.render(self.unit()))
    }

    fn on_key(&self, key: KeyEvent) -> EventResult {
        match key.code {
            KeyCode::Char('u') => {
                let unit = {
                    let mut unit = self.unit.lock().unwrap_or_else(PoisonError::into_inner);
                    *unit = unit.next();
                    *unit
                };

                // Re-render the last reading right away instead of waiting a tick
                let last = *self.last.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(metrics) = last {
                    self.pane.set_text(metrics.render(unit));
                }
                EventResult::Consumed
            }
            _ => EventResult::Ignored,
        }
    }
}
