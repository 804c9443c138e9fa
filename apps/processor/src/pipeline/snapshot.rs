use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::AccumulatedResult;
use crate::pipeline::progress::percentage;
use crate::pipeline::stages::{
    StageId, INSIGHT_ATS, INSIGHT_GENERAL_TIP, INSIGHT_OPTIMIZATION, INSIGHT_PARSING,
    START_MESSAGE, STAGES,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

/// Controller state as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Error,
    Completed,
}

/// Status of every stage, keyed by stage id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatusMap {
    pub parsing: StageStatus,
    pub ats_check: StageStatus,
    pub optimization: StageStatus,
}

impl StageStatusMap {
    pub fn get(&self, stage: StageId) -> StageStatus {
        match stage {
            StageId::Parsing => self.parsing,
            StageId::AtsCheck => self.ats_check,
            StageId::Optimization => self.optimization,
        }
    }

    fn set(&mut self, stage: StageId, status: StageStatus) {
        match stage {
            StageId::Parsing => self.parsing = status,
            StageId::AtsCheck => self.ats_check = status,
            StageId::Optimization => self.optimization = status,
        }
    }

    pub fn all_pending(&self) -> bool {
        StageId::ALL
            .iter()
            .all(|s| self.get(*s) == StageStatus::Pending)
    }

    /// Side notes for the host to show next to the stage list.
    pub fn insights(&self) -> Vec<&'static str> {
        let active = |status: StageStatus| {
            matches!(status, StageStatus::Processing | StageStatus::Completed)
        };

        let mut insights = Vec::with_capacity(3);
        if self.parsing == StageStatus::Processing {
            insights.push(INSIGHT_PARSING);
        }
        if active(self.ats_check) {
            insights.push(INSIGHT_ATS);
        }
        if active(self.optimization) {
            insights.push(INSIGHT_OPTIMIZATION);
        }
        if insights.len() < 3 {
            insights.push(INSIGHT_GENERAL_TIP);
        }
        insights
    }
}

/// Everything the host can observe about the current run.
///
/// Published through a `watch` channel; every update replaces the snapshot
/// atomically, so readers never see a half-applied transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// Bumped on every start, retry and teardown. Updates from an older
    /// generation are dropped.
    #[serde(skip)]
    pub(crate) generation: u64,
    pub run_id: Option<Uuid>,
    pub attempt: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub phase: RunPhase,
    pub stage_status: StageStatusMap,
    pub accumulated: AccumulatedResult,
    pub current_stage_index: usize,
    pub elapsed_seconds: u64,
    pub progress_percentage: f64,
    pub current_message: String,
    pub error_message: Option<String>,
}

impl RunSnapshot {
    /// The torn-down state: nothing running, nothing accumulated.
    pub(crate) fn idle(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub(crate) fn started(generation: u64) -> Self {
        Self {
            generation,
            run_id: Some(Uuid::new_v4()),
            attempt: 1,
            started_at: Some(Utc::now()),
            phase: RunPhase::Running,
            current_message: START_MESSAGE.to_string(),
            ..Self::default()
        }
    }

    /// Fresh attempt of the same run. Stage state and results are discarded;
    /// the run identity and the elapsed clock carry over.
    pub(crate) fn restarted(&self, generation: u64) -> Self {
        Self {
            generation,
            run_id: self.run_id.or_else(|| Some(Uuid::new_v4())),
            attempt: self.attempt + 1,
            started_at: self.started_at.or_else(|| Some(Utc::now())),
            phase: RunPhase::Running,
            elapsed_seconds: self.elapsed_seconds,
            ..Self::default()
        }
    }

    pub(crate) fn begin_stage(&mut self, stage: StageId) {
        debug_assert!(
            stage
                .predecessor()
                .map_or(true, |p| self.status(p) == StageStatus::Completed),
            "{stage} started before its predecessor completed"
        );
        self.phase = RunPhase::Running;
        self.current_stage_index = stage.index();
        self.stage_status.set(stage, StageStatus::Processing);
        self.error_message = None;
        self.progress_percentage = percentage(stage.index(), STAGES.len());
    }

    pub(crate) fn complete_stage(&mut self, stage: StageId, accumulated: &AccumulatedResult) {
        self.stage_status.set(stage, StageStatus::Completed);
        self.accumulated = accumulated.clone();
        self.current_message = stage.definition().completion_message().to_string();
        self.progress_percentage = percentage(stage.index() + 1, STAGES.len());
    }

    pub(crate) fn fail_stage(&mut self, stage: StageId, message: String) {
        self.stage_status.set(stage, StageStatus::Error);
        self.error_message = Some(message);
        self.phase = RunPhase::Error;
    }

    pub(crate) fn finish(&mut self) {
        self.phase = RunPhase::Completed;
        self.progress_percentage = 100.0;
    }

    pub fn status(&self, stage: StageId) -> StageStatus {
        self.stage_status.get(stage)
    }

    pub fn current_stage(&self) -> StageId {
        StageId::ALL[self.current_stage_index.min(StageId::ALL.len() - 1)]
    }

    /// True from run start until completion or teardown, including while
    /// parked on a failed stage.
    pub fn is_processing(&self) -> bool {
        matches!(self.phase, RunPhase::Running | RunPhase::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_transitions_and_progress() {
        let mut snapshot = RunSnapshot::started(1);
        assert_eq!(snapshot.current_message, START_MESSAGE);

        snapshot.begin_stage(StageId::Parsing);
        assert_eq!(snapshot.status(StageId::Parsing), StageStatus::Processing);
        assert_eq!(snapshot.progress_percentage, 0.0);

        let acc = AccumulatedResult::default().with_stage(StageId::Parsing, json!({}));
        snapshot.complete_stage(StageId::Parsing, &acc);
        assert_eq!(snapshot.status(StageId::Parsing), StageStatus::Completed);
        assert!((snapshot.progress_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.accumulated, acc);

        snapshot.begin_stage(StageId::AtsCheck);
        assert_eq!(snapshot.current_stage(), StageId::AtsCheck);
        assert_eq!(snapshot.current_stage_index, 1);
    }

    #[test]
    fn test_fail_stage_parks_in_error() {
        let mut snapshot = RunSnapshot::started(1);
        snapshot.begin_stage(StageId::Parsing);
        snapshot.fail_stage(StageId::Parsing, "Parsing failed: Bad Request - nope".to_string());

        assert_eq!(snapshot.phase, RunPhase::Error);
        assert_eq!(snapshot.status(StageId::Parsing), StageStatus::Error);
        assert_eq!(snapshot.status(StageId::AtsCheck), StageStatus::Pending);
        assert!(snapshot.is_processing());
    }

    #[test]
    fn test_restarted_discards_results_but_keeps_clock() {
        let mut snapshot = RunSnapshot::started(1);
        snapshot.elapsed_seconds = 9;
        snapshot.begin_stage(StageId::Parsing);
        snapshot.complete_stage(
            StageId::Parsing,
            &AccumulatedResult::default().with_stage(StageId::Parsing, json!({"a": 1})),
        );

        let retried = snapshot.restarted(2);
        assert!(retried.stage_status.all_pending());
        assert_eq!(retried.accumulated, AccumulatedResult::default());
        assert_eq!(retried.elapsed_seconds, 9);
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.run_id, snapshot.run_id);
        assert_eq!(retried.current_stage_index, 0);
        assert!(retried.error_message.is_none());
    }

    #[test]
    fn test_insights_follow_stage_status() {
        let mut status = StageStatusMap::default();
        assert_eq!(status.insights(), vec![INSIGHT_GENERAL_TIP]);

        status.set(StageId::Parsing, StageStatus::Processing);
        assert_eq!(status.insights(), vec![INSIGHT_PARSING, INSIGHT_GENERAL_TIP]);

        status.set(StageId::Parsing, StageStatus::Completed);
        status.set(StageId::AtsCheck, StageStatus::Processing);
        assert_eq!(status.insights(), vec![INSIGHT_ATS, INSIGHT_GENERAL_TIP]);

        status.set(StageId::AtsCheck, StageStatus::Completed);
        status.set(StageId::Optimization, StageStatus::Error);
        assert_eq!(status.insights(), vec![INSIGHT_ATS, INSIGHT_GENERAL_TIP]);

        status.set(StageId::Optimization, StageStatus::Completed);
        assert_eq!(
            status.insights(),
            vec![INSIGHT_ATS, INSIGHT_OPTIMIZATION, INSIGHT_GENERAL_TIP]
        );
    }

    #[test]
    fn test_snapshot_serializes_host_shape() {
        let snapshot = RunSnapshot::idle(3);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["phase"], "idle");
        assert_eq!(value["stageStatus"]["atsCheck"], "pending");
        assert!(value.get("generation").is_none());
    }
}
