//! EvaluatorActor - Runs breach evaluation on a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ─┐
//!             ├→ BreachEvaluator::evaluate → breaches (+ notifications)
//! EvaluateNow ┘
//!     ↑
//!     └─── Commands (EvaluateNow, UpdateInterval, Shutdown)
//! ```
//!
//! Missed ticks are skipped rather than bursted, and an evaluation error only
//! costs that tick.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, error, instrument, warn};

use crate::monitors::{BreachEvaluator, EvaluationSummary};

use super::messages::EvaluatorCommand;

pub struct EvaluatorActor {
    evaluator: BreachEvaluator,

    command_rx: mpsc::Receiver<EvaluatorCommand>,

    interval_duration: Duration,
}

fn skipping_interval(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

impl EvaluatorActor {
    pub fn new(
        evaluator: BreachEvaluator,
        command_rx: mpsc::Receiver<EvaluatorCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            evaluator,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    #[instrument(skip(self), fields(interval = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting evaluator actor");

        let mut ticker = skipping_interval(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.evaluator.evaluate().await {
                        error!("evaluation failed: {:#}", e);
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        EvaluatorCommand::EvaluateNow { respond_to } => {
                            debug!("received EvaluateNow command");
                            let result = self.evaluator.evaluate().await;
                            let _ = respond_to.send(result);
                        }

                        EvaluatorCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs.max(1));
                            ticker = skipping_interval(self.interval_duration);
                        }

                        EvaluatorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("evaluator actor stopped");
    }
}

/// Handle for controlling an EvaluatorActor
#[derive(Clone)]
pub struct EvaluatorHandle {
    sender: mpsc::Sender<EvaluatorCommand>,
}

impl EvaluatorHandle {
    /// Spawn the evaluator actor; the first evaluation runs immediately
    pub fn spawn(evaluator: BreachEvaluator, interval_duration: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = EvaluatorActor::new(evaluator, cmd_rx, interval_duration);

        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Evaluate immediately and return the summary
    pub async fn evaluate_now(&self) -> Result<EvaluationSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EvaluatorCommand::EvaluateNow { respond_to: tx })
            .await
            .context("failed to send EvaluateNow command")?;

        rx.await.context("failed to receive response")?
    }

    pub async fn update_interval(&self, interval_secs: u64) -> Result<()> {
        self.sender
            .send(EvaluatorCommand::UpdateInterval { interval_secs })
            .await
            .context("failed to send UpdateInterval command")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(EvaluatorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")
    }
}
