// panedash-core/src/registry.rs
use crate::config::WidgetConfig;
use crate::widget::WidgetError;
use crate::{RedrawBus, Widget};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds one widget from its config entry. The widget receives its own
/// settings by value and a clone of its generation's redraw bus.
pub type WidgetFactory =
    Box<dyn Fn(&WidgetConfig, RedrawBus) -> Result<Arc<dyn Widget>, WidgetError> + Send + Sync>;

pub struct WidgetRegistry {
    factories: HashMap<String, WidgetFactory>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, factory: WidgetFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// `None` when no factory is registered for the config's type
    pub fn create(
        &self,
        config: &WidgetConfig,
        redraw: RedrawBus,
    ) -> Option<Result<Arc<dyn Widget>, WidgetError>> {
        self.factories
            .get(&config.kind)
            .map(|factory| factory(config, redraw))
    }

    pub fn list_widgets(&self) -> Vec<&String> {
        let mut kinds: Vec<_> = self.factories.keys().collect();
        kinds.sort();
        kinds
    }
}

/// Register a widget type whose `new(&WidgetConfig, RedrawBus) -> Result<Self, WidgetError>`
/// constructor builds it
#[macro_export]
macro_rules! register_widget {
    ($registry:expr, $kind:expr, $widget_type:ty) => {
        $registry.register(
            $kind,
            Box::new(
                |config: &$crate::WidgetConfig,
                 redraw: $crate::RedrawBus|
                 -> ::std::result::Result<::std::sync::Arc<dyn $crate::Widget>, $crate::WidgetError> {
                    let widget = <$widget_type>::new(config, redraw)?;
                    Ok(::std::sync::Arc::new(widget) as ::std::sync::Arc<dyn $crate::Widget>)
                },
            ),
        );
    };
}
