use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::templates::{Dialect, SqlTemplates};

/// Rendering configuration shared by queries and clauses
#[derive(Clone)]
pub struct Configuration {
    templates: Arc<dyn SqlTemplates>,
    use_literals: bool,
}

impl Configuration {
    pub fn new(templates: impl SqlTemplates + 'static) -> Self {
        Self::from_templates(Arc::new(templates))
    }

    pub fn from_templates(templates: Arc<dyn SqlTemplates>) -> Self {
        Self {
            templates,
            use_literals: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            templates: settings.dialect.templates(),
            use_literals: settings.use_literals,
        }
    }

    /// Render constants inline instead of binding them
    pub fn with_use_literals(mut self, use_literals: bool) -> Self {
        self.use_literals = use_literals;
        self
    }

    pub fn templates(&self) -> &dyn SqlTemplates {
        self.templates.as_ref()
    }

    pub fn use_literals(&self) -> bool {
        self.use_literals
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("templates", &self.templates.name())
            .field("use_literals", &self.use_literals)
            .finish()
    }
}

/// Serializable form of [`Configuration`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub dialect: Dialect,
    #[serde(default)]
    pub use_literals: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_build_configuration() {
        let settings: Settings = serde_json::from_str(r#"{ "dialect": "postgres" }"#).unwrap();
        let configuration = Configuration::from_settings(&settings);
        assert_eq!(configuration.templates().name(), "postgresql");
        assert!(!configuration.use_literals());
    }
}
