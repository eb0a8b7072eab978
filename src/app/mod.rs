mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::CamwatchOrchestrator;
pub use types::{Component, ComponentState, ShutdownReason};
