use tokio::sync::mpsc;

use crate::errors::PipelineError;
use crate::models::AccumulatedResult;
use crate::pipeline::stages::StageId;

/// Callbacks through which a run reports back to its host.
///
/// `on_complete` fires exactly once per successful run and is the only way
/// results leave the pipeline. `on_error` fires once per stage failure and on
/// quota rejection.
pub trait ProcessorListener: Send + Sync {
    fn on_complete(&self, result: &AccumulatedResult);

    fn on_error(&self, error: &PipelineError);

    /// The free upload quota is used up. Hosts typically show an upgrade prompt.
    fn on_upgrade_required(&self) {}
}

/// Owned copy of a listener callback, for hosts that prefer a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorEvent {
    Completed(AccumulatedResult),
    Failed {
        stage: Option<StageId>,
        message: String,
    },
    UpgradeRequired,
}

/// Forwards every callback into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ProcessorEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProcessorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ProcessorEvent) {
        // A dropped receiver means the host stopped listening.
        let _ = self.tx.send(event);
    }
}

impl ProcessorListener for ChannelListener {
    fn on_complete(&self, result: &AccumulatedResult) {
        self.forward(ProcessorEvent::Completed(result.clone()));
    }

    fn on_error(&self, error: &PipelineError) {
        self.forward(ProcessorEvent::Failed {
            stage: error.stage(),
            message: error.to_string(),
        });
    }

    fn on_upgrade_required(&self) {
        self.forward(ProcessorEvent::UpgradeRequired);
    }
}
