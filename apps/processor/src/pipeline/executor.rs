//! Performs the single external action of one stage.

use tracing::debug;

use crate::backend::ProcessingBackend;
use crate::errors::PipelineError;
use crate::models::{AccumulatedResult, EntryPoint, OptimizeRequest, ResumeUpload};
use crate::pipeline::stages::StageId;

/// Binds a backend to the upload of one run.
pub struct StageExecutor<'a> {
    backend: &'a dyn ProcessingBackend,
    upload: &'a ResumeUpload,
    entry: &'a EntryPoint,
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        backend: &'a dyn ProcessingBackend,
        upload: &'a ResumeUpload,
        entry: &'a EntryPoint,
    ) -> Self {
        Self {
            backend,
            upload,
            entry,
        }
    }

    /// Runs `stage` against what the earlier stages produced and returns the
    /// accumulator with this stage's key filled in.
    ///
    /// Optimization refuses to issue a request unless both the parsed resume
    /// and the ATS analysis are present.
    pub async fn run(
        &self,
        stage: StageId,
        accumulated: &AccumulatedResult,
    ) -> Result<AccumulatedResult, PipelineError> {
        let document = match stage {
            StageId::Parsing => self.backend.parse_resume(self.upload, self.entry).await?,
            StageId::AtsCheck => self.backend.check_ats(self.upload, self.entry).await?,
            StageId::Optimization => {
                let parsed = accumulated
                    .parsed_data
                    .as_ref()
                    .ok_or(PipelineError::MissingParsedData)?;
                let ats = accumulated
                    .ats_data
                    .as_ref()
                    .ok_or(PipelineError::MissingAtsData)?;
                let request = OptimizeRequest {
                    original_resume_data: parsed,
                    ats_analysis_result: ats,
                };
                self.backend.optimize(&request).await?
            }
        };
        debug!("{stage} produced a document for {}", self.upload.file_name);
        Ok(accumulated.with_stage(stage, document))
    }
}
