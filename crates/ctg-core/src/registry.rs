use std::collections::HashMap;

use crate::error::CoreError;
use crate::plugin::LanguagePlugin;

/// Lookup table of language plugins keyed by plugin id ("python", "java", "go").
///
/// Adding a language means registering a new `LanguagePlugin` implementation;
/// the orchestrator never special-cases a language by name.
pub struct PluginRegistry {
    plugins: HashMap<String, Box<dyn LanguagePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn LanguagePlugin>) -> &mut Self {
        self.plugins.insert(plugin.id().to_string(), plugin);
        self
    }

    pub fn get(&self, language_id: &str) -> Result<&dyn LanguagePlugin, CoreError> {
        self.plugins
            .get(language_id)
            .map(|p| p.as_ref())
            .ok_or_else(|| CoreError::UnknownLanguage(language_id.to_string()))
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// A registry pre-populated with the built-in plugins (python, java, go).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(Box::new(crate::plugins::python::PythonPlugin::default()))
            .register(Box::new(crate::plugins::java::JavaPlugin::default()))
            .register(Box::new(crate::plugins::go::GoPlugin::default()));
        registry
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
