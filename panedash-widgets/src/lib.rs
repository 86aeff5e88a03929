pub mod common;
pub mod ping;
pub mod system;
pub mod webcheck;

use panedash_core::{WidgetRegistry, register_widget};

pub use common::*;
pub use ping::{PingSettings, PingWidget, Target};
pub use system::{SystemMetrics, SystemWidget};
pub use webcheck::{WebcheckSettings, WebcheckWidget};

/// Register every widget type this crate ships
pub fn register_builtin(registry: &mut WidgetRegistry) {
    register_widget!(registry, "webcheck", WebcheckWidget);
    register_widget!(registry, "ping", PingWidget);
    register_widget!(registry, "system", SystemWidget);
}

#[cfg(test)]
mod tests {
    use super::*;
    use panedash_core::{ConfigFile, RedrawBus};

    #[test]
    fn test_builtin_types_registered() {
        let mut registry = WidgetRegistry::new();
        register_builtin(&mut registry);
        assert_eq!(registry.list_widgets(), vec!["ping", "system", "webcheck"]);
    }

    #[test]
    fn test_starter_config_builds() {
        let mut registry = WidgetRegistry::new();
        register_builtin(&mut registry);

        let config = ConfigFile::parse(panedash_core::config::STARTER_CONFIG).unwrap();
        config.validate().unwrap();
        for widget in &config.widgets {
            let built = registry.create(widget, RedrawBus::new()).unwrap().unwrap();
            assert_eq!(built.name(), widget.name);
        }
    }
}
