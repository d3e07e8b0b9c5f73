pub mod config;
pub mod error;
pub mod golden;
pub mod guidance;
pub mod metrics;
pub mod orchestrator;
pub mod review;
pub mod test_emit;
pub mod test_run;
pub mod types;

pub use config::CtgConfig;
pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use types::{
    DepGraph, DepGraphEdge, DepGraphNode, EmittedTest, GoldenRecord, Guidance, MappingState,
    ModuleMapping, ModuleRecord, Review, RiskSeverity, RiskWarning, RunReport, RunSummary,
    TestItem, TestResult, TestStatus,
};
