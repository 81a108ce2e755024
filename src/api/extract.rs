//! Request extractors.

use axum::extract::FromRequest;

use super::error::ApiError;

/// JSON body extractor that reports undecodable payloads as 400 in the
/// standard error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
