use thiserror::Error;

use crate::pipeline::stages::StageId;

/// Every way a pipeline run can fail.
///
/// Stage failures carry the HTTP status text and the raw response body so the
/// host can show the collaborator's own explanation next to the failed stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Upload limit reached")]
    QuotaExceeded,

    #[error("Parsing failed: {status_text} - {body}")]
    Parsing {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("ATS check failed: {status_text} - {body}")]
    AtsCheck {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Optimization failed: {status_text} - {body}")]
    Optimization {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Parsed resume data is missing. Please retry the process.")]
    MissingParsedData,

    #[error("ATS analysis data is missing. Please retry the process.")]
    MissingAtsData,

    #[error("{stage} request failed: {source}")]
    Http {
        stage: StageId,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage} returned an invalid JSON document: {source}")]
    Decode {
        stage: StageId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not read resume file: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Builds the non-2xx failure for `stage`.
    pub fn rejected(stage: StageId, status: u16, status_text: &str, body: String) -> Self {
        let status_text = status_text.to_string();
        match stage {
            StageId::Parsing => PipelineError::Parsing {
                status,
                status_text,
                body,
            },
            StageId::AtsCheck => PipelineError::AtsCheck {
                status,
                status_text,
                body,
            },
            StageId::Optimization => PipelineError::Optimization {
                status,
                status_text,
                body,
            },
        }
    }

    /// The stage this error belongs to. `None` for errors raised outside a stage.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            PipelineError::Parsing { .. } => Some(StageId::Parsing),
            PipelineError::AtsCheck { .. } => Some(StageId::AtsCheck),
            PipelineError::Optimization { .. }
            | PipelineError::MissingParsedData
            | PipelineError::MissingAtsData => Some(StageId::Optimization),
            PipelineError::Http { stage, .. } | PipelineError::Decode { stage, .. } => Some(*stage),
            PipelineError::QuotaExceeded | PipelineError::Io(_) => None,
        }
    }

    /// HTTP status reported by the collaborator, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PipelineError::Parsing { status, .. }
            | PipelineError::AtsCheck { status, .. }
            | PipelineError::Optimization { status, .. } => Some(*status),
            _ => None,
        }
    }
}
