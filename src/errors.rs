use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Absent, or owned by someone else. The two are not distinguished.
    #[error("Notification not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let msg = match &self {
            AppError::Store(e) => {
                tracing::error!("Store error: {:#}", e);
                crate::middleware::metrics::record_store_error();
                "internal storage error".to_string()
            }
            AppError::Unauthorized => "authentication required".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "errorMessage": msg,
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let resp = AppError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorMessage"], "Notification not found");
    }

    #[tokio::test]
    async fn test_store_error_hides_detail() {
        let resp = AppError::Store(anyhow::anyhow!("connection refused: 10.0.0.3")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["errorMessage"], "internal storage error");
    }

    #[tokio::test]
    async fn test_validation_message_is_passed_through() {
        let resp = AppError::Validation("malformed notification id".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["errorMessage"], "malformed notification id");
    }
}
