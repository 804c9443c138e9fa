//! The unified resume processing pipeline: parsing → atsCheck → optimization.

pub mod controller;
pub mod executor;
pub mod progress;
pub mod snapshot;
pub mod stages;

pub use controller::{PipelineSettings, ResumeProcessor, ResumeProcessorBuilder};
pub use snapshot::{RunPhase, RunSnapshot, StageStatus, StageStatusMap};
pub use stages::{StageDefinition, StageId, STAGES};
