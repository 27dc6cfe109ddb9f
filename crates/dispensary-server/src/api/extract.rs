//! `Json`, `Path` and `Query` wrappers whose rejections use the API error
//! envelope instead of axum's plain-text bodies.
//!
//! Serde's detail is logged at `debug` and never returned to the client.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::middleware::request_id_of;

use super::ApiError;

pub(super) struct ApiJson<T>(pub T);

pub(super) struct ApiPath<T>(pub T);

pub(super) struct ApiQuery<T>(pub T);

fn json_rejection_message(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::JsonDataError(_) => "request body does not match the expected shape",
        JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
        JsonRejection::MissingJsonContentType(_) => "expected content-type application/json",
        _ => "request body could not be read",
    }
}

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let request_id = request_id_of(req.extensions());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "rejected JSON body");
                Err(ApiError::new(
                    request_id,
                    "validation_error",
                    json_rejection_message(&rejection),
                ))
            }
        }
    }
}

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "rejected path parameters");
                Err(ApiError::new(
                    request_id_of(&parts.extensions),
                    "validation_error",
                    "invalid path parameter",
                ))
            }
        }
    }
}

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection.body_text(), "rejected query string");
                Err(ApiError::new(
                    request_id_of(&parts.extensions),
                    "validation_error",
                    "invalid query parameters",
                ))
            }
        }
    }
}
