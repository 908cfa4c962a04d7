//! JSON request and response bodies whose failures surface as [`ServerError`]s, so clients see
//! the same error body for a malformed payload as for any other failure.

use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;
use std::any::type_name;
use tracing::warn;

/// Rejects with [`ServerError::JsonRejection`] when the body is missing, malformed or the wrong
/// shape.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self.0) {
            Ok(body) => body,
            Err(err) => {
                warn!(body_type = type_name::<T>(), "Serializing a response body failed");
                return ServerError::JsonResponse(err).into_response();
            }
        };

        (TypedHeader(ContentType::json()), body).into_response()
    }
}
