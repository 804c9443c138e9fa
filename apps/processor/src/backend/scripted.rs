//! In-process backend for pipeline tests. Replies are queued per stage; an
//! empty queue answers `{}`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::backend::ProcessingBackend;
use crate::errors::PipelineError;
use crate::models::{EntryPoint, OptimizeRequest, ResumeUpload};
use crate::pipeline::stages::StageId;

pub(crate) enum Reply {
    Json(Value),
    Status {
        status: u16,
        reason: &'static str,
        body: String,
    },
    /// Waits for the gate before answering with the document.
    Gated(Arc<Notify>, Value),
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    replies: Mutex<HashMap<StageId, VecDeque<Reply>>>,
    calls: Mutex<Vec<StageId>>,
    optimize_bodies: Mutex<Vec<Value>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, stage: StageId, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(reply);
        self
    }

    pub(crate) fn json(self, stage: StageId, document: Value) -> Self {
        self.reply(stage, Reply::Json(document))
    }

    pub(crate) fn status(self, stage: StageId, status: u16, reason: &'static str, body: &str) -> Self {
        self.reply(
            stage,
            Reply::Status {
                status,
                reason,
                body: body.to_string(),
            },
        )
    }

    pub(crate) fn calls(&self) -> Vec<StageId> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn optimize_bodies(&self) -> Vec<Value> {
        self.optimize_bodies.lock().unwrap().clone()
    }

    async fn answer(&self, stage: StageId) -> Result<Value, PipelineError> {
        self.calls.lock().unwrap().push(stage);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        match reply {
            None => Ok(json!({})),
            Some(Reply::Json(document)) => Ok(document),
            Some(Reply::Status {
                status,
                reason,
                body,
            }) => Err(PipelineError::rejected(stage, status, reason, body)),
            Some(Reply::Gated(gate, document)) => {
                gate.notified().await;
                Ok(document)
            }
        }
    }
}

#[async_trait]
impl ProcessingBackend for ScriptedBackend {
    async fn parse_resume(
        &self,
        _upload: &ResumeUpload,
        _entry: &EntryPoint,
    ) -> Result<Value, PipelineError> {
        self.answer(StageId::Parsing).await
    }

    async fn check_ats(
        &self,
        _upload: &ResumeUpload,
        _entry: &EntryPoint,
    ) -> Result<Value, PipelineError> {
        self.answer(StageId::AtsCheck).await
    }

    async fn optimize(&self, request: &OptimizeRequest<'_>) -> Result<Value, PipelineError> {
        self.optimize_bodies
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        self.answer(StageId::Optimization).await
    }
}
