pub mod backend;
pub mod config;
pub mod errors;
pub mod listener;
pub mod models;
pub mod pipeline;
pub mod quota;

pub use backend::{Endpoints, HttpBackend, ProcessingBackend};
pub use errors::PipelineError;
pub use listener::{ChannelListener, ProcessorEvent, ProcessorListener};
pub use models::{AccumulatedResult, EntryPoint, ResumeUpload};
pub use pipeline::{PipelineSettings, ResumeProcessor, RunPhase, RunSnapshot, StageId, StageStatus};
pub use quota::{PlanTier, UploadQuota};
