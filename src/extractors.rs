use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// `axum::Json<T>` whose rejections use the `AppError` envelope.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| JsonBody(value))
            .map_err(json_rejection_to_app_error)
    }
}

fn json_rejection_to_app_error(rejection: JsonRejection) -> AppError {
    let status = rejection.status();
    tracing::warn!(status = status.as_u16(), error = %rejection.body_text(), "Rejected JSON body");

    match rejection {
        JsonRejection::BytesRejection(_) if status == StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::payload_too_large("Request body too large")
        }
        JsonRejection::MissingJsonContentType(_) => {
            AppError::bad_request("INVALID_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => AppError::bad_request("INVALID_REQUEST_BODY", "Invalid request body"),
    }
}
