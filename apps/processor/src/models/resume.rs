use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::stages::StageId;

/// The growing record each stage writes its output into.
///
/// Serializes as `{ parsedData, atsData, optimizedData }`; this is the payload
/// handed to the host on completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatedResult {
    pub parsed_data: Option<Value>,
    pub ats_data: Option<Value>,
    pub optimized_data: Option<Value>,
}

impl AccumulatedResult {
    /// The document written by `stage`, if it has run.
    pub fn get(&self, stage: StageId) -> Option<&Value> {
        match stage {
            StageId::Parsing => self.parsed_data.as_ref(),
            StageId::AtsCheck => self.ats_data.as_ref(),
            StageId::Optimization => self.optimized_data.as_ref(),
        }
    }

    /// Returns a copy with `document` stored under `stage`'s key. Other keys are untouched.
    pub fn with_stage(&self, stage: StageId, document: Value) -> Self {
        let mut next = self.clone();
        match stage {
            StageId::Parsing => next.parsed_data = Some(document),
            StageId::AtsCheck => next.ats_data = Some(document),
            StageId::Optimization => next.optimized_data = Some(document),
        }
        next
    }

    pub fn is_complete(&self) -> bool {
        StageId::ALL.iter().all(|stage| self.get(*stage).is_some())
    }

    /// ATS score from the scoring document. Scorers disagree on the field name,
    /// so `overallScore`, `score` and `atsScore` are tried in that order.
    pub fn ats_score(&self) -> Option<f64> {
        let ats = self.ats_data.as_ref()?;
        ["overallScore", "score", "atsScore"]
            .iter()
            .find_map(|field| ats.get(field).and_then(Value::as_f64))
    }
}

/// JSON body of the optimization request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest<'a> {
    pub original_resume_data: &'a Value,
    pub ats_analysis_result: &'a Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_stage_writes_only_its_own_key() {
        let base = AccumulatedResult::default().with_stage(StageId::Parsing, json!({"skills": ["rust"]}));
        let next = base.with_stage(StageId::AtsCheck, json!({"score": 72}));

        assert_eq!(next.parsed_data, base.parsed_data);
        assert_eq!(next.ats_data, Some(json!({"score": 72})));
        assert!(next.optimized_data.is_none());
        assert!(!next.is_complete());
    }

    #[test]
    fn test_serializes_with_host_keys() {
        let result = AccumulatedResult {
            parsed_data: Some(json!({"name": "Ada"})),
            ats_data: Some(json!({"score": 72})),
            optimized_data: Some(json!({"optimizedSummary": "..."})),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["parsedData"]["name"], "Ada");
        assert_eq!(value["atsData"]["score"], 72);
        assert_eq!(value["optimizedData"]["optimizedSummary"], "...");
        assert!(result.is_complete());
    }

    #[test]
    fn test_ats_score_field_fallbacks() {
        let overall = AccumulatedResult::default()
            .with_stage(StageId::AtsCheck, json!({"overallScore": 81, "score": 10}));
        assert_eq!(overall.ats_score(), Some(81.0));

        let legacy = AccumulatedResult::default().with_stage(StageId::AtsCheck, json!({"atsScore": 64.5}));
        assert_eq!(legacy.ats_score(), Some(64.5));

        assert_eq!(AccumulatedResult::default().ats_score(), None);
    }

    #[test]
    fn test_optimize_request_body_shape() {
        let parsed = json!({"skills": ["go"]});
        let ats = json!({"score": 55});
        let body = serde_json::to_value(OptimizeRequest {
            original_resume_data: &parsed,
            ats_analysis_result: &ats,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"originalResumeData": {"skills": ["go"]}, "atsAnalysisResult": {"score": 55}})
        );
    }
}
