//! The fixed, ordered list of pipeline stages and their display copy.
//!
//! Order is parsing → atsCheck → optimization and never changes at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Published when a run begins, before the first stage starts.
pub const START_MESSAGE: &str = "Starting your resume transformation...";

/// Published after the last stage, right before the completion callback.
pub const READY_MESSAGE: &str = "Your world-class resume is ready!";

/// Identity of a pipeline stage. Serializes to the camelCase ids the host expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageId {
    Parsing,
    AtsCheck,
    Optimization,
}

impl StageId {
    pub const ALL: [StageId; 3] = [StageId::Parsing, StageId::AtsCheck, StageId::Optimization];

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Parsing => "parsing",
            StageId::AtsCheck => "atsCheck",
            StageId::Optimization => "optimization",
        }
    }

    /// Position of the stage in the pipeline.
    pub fn index(self) -> usize {
        match self {
            StageId::Parsing => 0,
            StageId::AtsCheck => 1,
            StageId::Optimization => 2,
        }
    }

    /// The stage that must be `completed` before this one may start.
    pub fn predecessor(self) -> Option<StageId> {
        match self {
            StageId::Parsing => None,
            StageId::AtsCheck => Some(StageId::Parsing),
            StageId::Optimization => Some(StageId::AtsCheck),
        }
    }

    pub fn definition(self) -> &'static StageDefinition {
        &STAGES[self.index()]
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display metadata for one stage.
#[derive(Debug)]
pub struct StageDefinition {
    pub id: StageId,
    pub title: &'static str,
    pub description: &'static str,
    /// Progress copy; the last entry is shown once the stage completes.
    pub messages: &'static [&'static str],
    /// Rotated while the stage's request is in flight.
    pub anticipation_messages: &'static [&'static str],
    pub time_estimate_secs: u64,
}

impl StageDefinition {
    pub fn completion_message(&self) -> &'static str {
        self.messages.last().copied().unwrap_or(self.title)
    }
}

pub static STAGES: [StageDefinition; 3] = [
    StageDefinition {
        id: StageId::Parsing,
        title: "AI Resume Parsing",
        description: "Extracting and structuring your resume data",
        messages: &[
            "AI is reading your resume content...",
            "Identifying key sections and skills...",
            "Structuring data for optimal processing...",
            "Parsing complete! Your resume is now AI-ready!",
        ],
        anticipation_messages: &[
            "Our AI is analyzing every word...",
            "Detecting your unique skills and experience...",
            "Preparing for the next level of optimization...",
        ],
        time_estimate_secs: 8,
    },
    StageDefinition {
        id: StageId::AtsCheck,
        title: "ATS Compatibility Analysis",
        description: "Analyzing ATS optimization and scoring",
        messages: &[
            "Scanning for ATS compatibility...",
            "Checking keyword optimization...",
            "Analyzing formatting and structure...",
            "ATS analysis complete! Your resume scored well!",
        ],
        anticipation_messages: &[
            "ATS systems are being analyzed...",
            "Your resume is being scored by industry standards...",
            "Preparing optimization recommendations...",
        ],
        time_estimate_secs: 10,
    },
    StageDefinition {
        id: StageId::Optimization,
        title: "AI Resume Enhancement",
        description: "Optimizing content for better results",
        messages: &[
            "Enhancing content with AI insights...",
            "Optimizing keywords and phrases...",
            "Improving structure and flow...",
            "Optimization complete! Your resume is now world-class!",
        ],
        anticipation_messages: &[
            "AI is crafting the perfect resume...",
            "Your resume is being transformed...",
            "Something amazing is about to happen...",
        ],
        time_estimate_secs: 12,
    },
];

pub const INSIGHT_PARSING: &str = "AI is identifying your top skills and experiences";
pub const INSIGHT_ATS: &str =
    "Optimizing for Applicant Tracking Systems used by Fortune 500 companies";
pub const INSIGHT_OPTIMIZATION: &str = "Enhancing your resume with industry-specific keywords";
/// Filler shown when fewer than three stage insights apply.
pub const INSIGHT_GENERAL_TIP: &str = "Resumes with optimized formatting get 40% more views";

/// Sum of every stage's time estimate.
pub fn estimated_total_secs() -> u64 {
    STAGES.iter().map(|s| s.time_estimate_secs).sum()
}
