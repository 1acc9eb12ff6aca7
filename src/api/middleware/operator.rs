//! Acting operator extraction
//!
//! Authentication lives outside this service; whoever sits in front of it
//! forwards the authenticated operator id in `X-Operator-Id`.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::api::error::ApiError;

pub const OPERATOR_HEADER: &str = "X-Operator-Id";

/// The operator on whose behalf the request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for OperatorId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OPERATOR_HEADER)
            .ok_or_else(|| ApiError::InvalidRequest(format!("missing {OPERATOR_HEADER} header")))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(OperatorId)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid {OPERATOR_HEADER} header")))
    }
}
