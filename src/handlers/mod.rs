pub mod health;
pub mod orders;
pub mod payments;

use crate::errors::ServiceError;
use axum::extract::rejection::JsonRejection;

pub use crate::AppState;

/// Malformed or mistyped JSON bodies become 400s with the usual error body.
pub(crate) fn json_rejection(rejection: JsonRejection) -> ServiceError {
    ServiceError::BadRequest(rejection.body_text())
}
