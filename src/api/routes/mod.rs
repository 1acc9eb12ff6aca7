pub mod breaches;
pub mod evaluator;
pub mod health;
pub mod notifications;
pub mod stats;
pub mod subscriptions;
pub mod thresholds;
