//! Path extraction that reports malformed parameters in the API error shape

use axum::{
    extract::{path::ErrorKind, rejection::PathRejection, FromRequestParts},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// `axum::extract::Path` rejecting with [`AppError`]
#[derive(Debug)]
pub struct Path<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for Path<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Path::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Path(value)) => Ok(Path(value)),
            Err(rejection) => Err(path_error(rejection)),
        }
    }
}

fn path_error(rejection: PathRejection) -> AppError {
    match rejection {
        PathRejection::FailedToDeserializePathParams(err) => {
            // A lone Uuid parameter reports no key
            let field = match err.kind() {
                ErrorKind::ParseErrorAtKey { key, .. } => key.clone(),
                _ => "id".to_string(),
            };
            AppError::validation(field, err.body_text())
        }
        other => AppError::Internal(other.body_text()),
    }
}
