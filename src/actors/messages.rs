//! Message types for actor communication

use tokio::sync::oneshot;

use crate::monitors::EvaluationSummary;

/// Commands that can be sent to the EvaluatorActor
#[derive(Debug)]
pub enum EvaluatorCommand {
    /// Run an evaluation now, outside the interval timer
    ///
    /// Processed by the same loop as the timer, so it never overlaps a
    /// scheduled evaluation.
    EvaluateNow {
        respond_to: oneshot::Sender<anyhow::Result<EvaluationSummary>>,
    },

    /// Change the evaluation interval; the timer restarts immediately
    UpdateInterval { interval_secs: u64 },

    /// Gracefully shut down the evaluator
    ///
    /// Any in-flight evaluation finishes first.
    Shutdown,
}
