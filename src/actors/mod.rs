//! Actor-based background work
//!
//! Each actor runs as an independent tokio task and is controlled through a
//! cloneable handle that sends commands over an mpsc channel.
//!
//! ```text
//!   ┌─────────────────┐   EvaluateNow / Shutdown   ┌────────────────┐
//!   │ Hub, API routes │ ─────────────────────────→ │ EvaluatorActor │
//!   └─────────────────┘ ←───── oneshot reply ───── └───────┬────────┘
//!                                                          │ tick
//!                                               sampler → store → dispatcher
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: mpsc command channel per actor
//! 2. **Request/Response**: oneshot channels carried inside commands

pub mod evaluator;
pub mod messages;

pub use evaluator::{EvaluatorActor, EvaluatorHandle};
pub use messages::EvaluatorCommand;
