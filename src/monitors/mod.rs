pub mod evaluator;
pub mod sampler;
pub mod thresholds;

pub use evaluator::{BreachEvaluator, EvaluationSummary};
pub use sampler::{HttpSampler, MetricSampler};
