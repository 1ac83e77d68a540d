// ABOUTME: Lifecycle orchestration for runbox sandboxes
// ABOUTME: Turns queued up/down intents into fleet provisioning, registry updates and completion events

pub mod error;
pub mod fleet;
pub mod orchestrator;

pub use error::{OrchestratorError, Result};
pub use fleet::{
    FleetError, FleetProvider, StaticFleetProvider, UnconfiguredFleetProvider,
};
pub use orchestrator::{
    DecommissionReport, IntentOutcome, LifecycleOrchestrator, OrchestratorConfig,
};
