// panedash-core/src/generation.rs

//! One coherent instance of the running dashboard.
//!
//! A generation owns its widgets, focus tracker, scheduler and redraw bus.
//! It is built completely before anything starts, goes live exactly once,
//! and is retired exactly once:
//!
//! ```text
//! Building -> Live -> Retiring -> Retired
//!     \________________/
//! ```
//!
//! A generation that never went live (e.g. one that failed to prepare) may
//! be retired straight from `Building`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{ConfigError, ConfigFile};
use crate::layout::Grid;
use crate::scheduler::{LoopSnapshot, Scheduler, SchedulerError, StopReport};
use crate::widget::WidgetError;
use crate::{FocusTracker, RedrawBus, Widget, WidgetRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Building,
    Live,
    Retiring,
    Retired,
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationState::Building => "building",
            GenerationState::Live => "live",
            GenerationState::Retiring => "retiring",
            GenerationState::Retired => "retired",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("widget '{widget}' has unknown type '{kind}'")]
    UnknownWidgetType { widget: String, kind: String },
    #[error("failed to construct widget '{widget}': {source}")]
    Widget {
        widget: String,
        #[source]
        source: WidgetError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("generation {generation}: cannot move from {from} to {to}")]
    InvalidTransition {
        generation: u64,
        from: GenerationState,
        to: GenerationState,
    },
    #[error("widget '{widget}' failed to prepare: {source}")]
    Widget {
        widget: String,
        #[source]
        source: WidgetError,
    },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Constructs generations from parsed configuration
#[derive(Clone)]
pub struct GenerationBuilder {
    registry: Arc<WidgetRegistry>,
}

impl GenerationBuilder {
    pub fn new(registry: Arc<WidgetRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    /// Validate `config` and construct every widget. Nothing is started.
    pub fn build(&self, id: u64, config: &ConfigFile) -> Result<Generation, BuildError> {
        config.validate()?;
        let stop_grace = config.stop_grace()?;

        let redraw = RedrawBus::new();
        let mut widgets: Vec<Arc<dyn Widget>> = Vec::with_capacity(config.widgets.len());

        for widget_config in &config.widgets {
            let created = match self.registry.create(widget_config, redraw.clone()) {
                Some(Ok(widget)) => Ok(widget),
                Some(Err(source)) => Err(BuildError::Widget {
                    widget: widget_config.name.clone(),
                    source,
                }),
                None => Err(BuildError::UnknownWidgetType {
                    widget: widget_config.name.clone(),
                    kind: widget_config.kind.clone(),
                }),
            };

            match created {
                Ok(widget) => widgets.push(widget),
                Err(err) => {
                    // Release whatever the partial build already acquired
                    for widget in &widgets {
                        widget.stop();
                    }
                    redraw.close();
                    return Err(err);
                }
            }
        }

        let focus = FocusTracker::new(widgets.clone(), config.navigation.shortcuts);
        tracing::debug!(generation = id, widgets = widgets.len(), "generation built");

        Ok(Generation {
            id,
            title: config.dashboard.title.clone(),
            grid: Grid::new(config.dashboard.columns),
            stop_grace,
            widgets,
            focus,
            redraw,
            scheduler: Mutex::new(Scheduler::new()),
            state: Mutex::new(GenerationState::Building),
        })
    }
}

pub struct Generation {
    id: u64,
    title: String,
    grid: Grid,
    stop_grace: Duration,
    widgets: Vec<Arc<dyn Widget>>,
    focus: FocusTracker,
    redraw: RedrawBus,
    scheduler: Mutex<Scheduler>,
    state: Mutex<GenerationState>,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn widgets(&self) -> &[Arc<dyn Widget>] {
        &self.widgets
    }

    pub fn widget(&self, name: &str) -> Option<&Arc<dyn Widget>> {
        self.widgets.iter().find(|w| w.name() == name)
    }

    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    pub fn redraw(&self) -> &RedrawBus {
        &self.redraw
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    pub fn state(&self) -> GenerationState {
        *self.lock_state()
    }

    pub fn is_live(&self) -> bool {
        self.state() == GenerationState::Live
    }

    /// Prepare every widget and spawn the refresh loops without running them.
    ///
    /// Everything that can fail on the way to going live happens here, so a
    /// caller can find out before it retires the generation being replaced.
    /// The generation stays `Building`.
    pub fn prepare(&self) -> Result<(), LifecycleError> {
        let state = self.lock_state();
        self.check_transition(*state, GenerationState::Live)?;
        self.prepare_locked()
    }

    fn prepare_locked(&self) -> Result<(), LifecycleError> {
        let mut scheduler = self.lock_scheduler();
        if scheduler.is_spawned() {
            return Ok(());
        }

        for widget in &self.widgets {
            widget.prepare().map_err(|source| LifecycleError::Widget {
                widget: widget.name().to_string(),
                source,
            })?;
        }
        scheduler.spawn(&self.widgets)?;
        Ok(())
    }

    /// Building -> Live: release the refresh loops and request the first paint.
    /// Prepares first if [`Generation::prepare`] was not called.
    pub fn activate(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock_state();
        self.check_transition(*state, GenerationState::Live)?;

        self.prepare_locked()?;
        self.lock_scheduler().release();
        *state = GenerationState::Live;
        self.redraw.request();

        tracing::info!(generation = self.id, widgets = self.widgets.len(), "generation live");
        Ok(())
    }

    /// -> Retiring: stop widgets, signal every loop and close the redraw bus.
    /// Does not wait for the loops; see [`Generation::finish_retire`].
    pub fn begin_retire(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock_state();
        self.check_transition(*state, GenerationState::Retiring)?;
        *state = GenerationState::Retiring;
        drop(state);

        for widget in &self.widgets {
            widget.stop();
        }
        self.lock_scheduler().signal_stop();
        self.redraw.close();

        tracing::debug!(generation = self.id, "generation retiring");
        Ok(())
    }

    /// Retiring -> Retired: join the loops, bounded by the grace period
    pub fn finish_retire(&self) -> Result<StopReport, LifecycleError> {
        self.check_transition(self.state(), GenerationState::Retired)?;

        let report = self.lock_scheduler().join(self.stop_grace);
        if !report.is_clean() {
            tracing::warn!(
                generation = self.id,
                lingering = ?report.lingering,
                "retired with refresh loops still finishing"
            );
        }

        *self.lock_state() = GenerationState::Retired;
        tracing::info!(generation = self.id, stopped = report.stopped, "generation retired");
        Ok(report)
    }

    pub fn retire(&self) -> Result<StopReport, LifecycleError> {
        self.begin_retire()?;
        self.finish_retire()
    }

    /// Out-of-band refresh of every widget
    pub fn refresh_all(&self) {
        if self.is_live() {
            self.lock_scheduler().refresh_all();
        }
    }

    pub fn loop_stats(&self) -> Vec<LoopSnapshot> {
        self.lock_scheduler().stats()
    }

    fn check_transition(
        &self,
        from: GenerationState,
        to: GenerationState,
    ) -> Result<(), LifecycleError> {
        use GenerationState::*;

        let allowed = matches!(
            (from, to),
            (Building, Live) | (Building, Retiring) | (Live, Retiring) | (Retiring, Retired)
        );
        if allowed {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition {
                generation: self.id,
                from,
                to,
            })
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GenerationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        if matches!(
            self.state(),
            GenerationState::Building | GenerationState::Live
        ) {
            let _ = self.begin_retire();
        }
    }
}
