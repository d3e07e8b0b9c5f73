pub mod error;
pub mod normalize;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod signatures;

pub use error::CoreError;
pub use plugin::{CompileCheckResult, LanguagePlugin, ScriptRunResult, TestRunResult};
pub use registry::PluginRegistry;
pub use signatures::DependencySignatureResolver;
