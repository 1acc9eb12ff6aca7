pub mod auth;
pub mod operator;

pub use operator::OperatorId;
