//! Errors surfaced at the alerting component boundary
//!
//! Storage and transport failures are folded into these categories before they
//! reach a caller. Per-endpoint delivery failures never show up here; they live
//! in the delivery report.

use thiserror::Error;

use crate::storage::error::StorageError;
use crate::storage::schema::Channel;

pub type AlertResult<T> = Result<T, AlertError>;

#[derive(Debug, Error)]
pub enum AlertError {
    /// Rejected before anything was persisted
    #[error("{0}")]
    Validation(String),

    /// Missing record, or a conditional update that matched nothing
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The channel provider is not configured
    #[error("{0} service unavailable: provider not configured")]
    Unavailable(Channel),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AlertError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
