//! The three services a run talks to, one per stage.
//!
//! The pipeline only sees the `ProcessingBackend` trait. `HttpBackend` is the
//! production implementation; tests swap in a scripted one.

pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PipelineError;
use crate::models::{EntryPoint, OptimizeRequest, ResumeUpload};

pub use http::{Endpoints, HttpBackend};

/// One method per stage. Each call is a single request that resolves to the
/// collaborator's JSON document or a stage error.
///
/// Carried by the processor as `Arc<dyn ProcessingBackend>`.
#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    async fn parse_resume(
        &self,
        upload: &ResumeUpload,
        entry: &EntryPoint,
    ) -> Result<Value, PipelineError>;

    async fn check_ats(
        &self,
        upload: &ResumeUpload,
        entry: &EntryPoint,
    ) -> Result<Value, PipelineError>;

    async fn optimize(&self, request: &OptimizeRequest<'_>) -> Result<Value, PipelineError>;
}
