pub mod config;
pub mod focus;
pub mod generation;
pub mod layout;
pub mod redraw;
pub mod registry;
pub mod scheduler;
pub mod supervisor;
pub mod watcher;
pub mod widget;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, ConfigFile, DurationSetting, WidgetConfig};
pub use focus::{FocusState, FocusTracker};
pub use generation::{BuildError, Generation, GenerationBuilder, GenerationState, LifecycleError};
pub use layout::Grid;
pub use redraw::RedrawBus;
pub use registry::{WidgetFactory, WidgetRegistry};
pub use scheduler::{LoopSnapshot, Scheduler, SchedulerError, StopReport};
pub use supervisor::{Supervisor, SupervisorError};
pub use watcher::{ConfigWatcher, WatchError};
pub use widget::{
    CommonSettings, Event, EventResult, PaneContent, PaneWidget, TextPane, Widget, WidgetError,
};
