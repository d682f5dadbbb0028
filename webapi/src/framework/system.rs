use std::error::Error;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::json::Json;

#[derive(Debug)]
pub enum AppError {
    Unexpected(Box<dyn Error + Send + Sync>),
    Forbidden(Option<String>),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// エラーレスポンスのボディ. `message` はステータスの理由句.
#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    reason: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = status.canonical_reason().unwrap_or("Unknown Error");

        let reason = match &self {
            AppError::Unexpected(e) => {
                tracing::error!("unexpected error: {e}");
                None
            }
            AppError::Forbidden(reason) => reason.as_deref(),
        };

        (status, Json(ErrorBody { message, reason })).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Unexpected(str) => {
                write!(f, "{}", str)
            }
            AppError::Forbidden(msg) => {
                write!(f, "Forbidden: {}", msg.as_deref().unwrap_or("no message"))
            }
        }
    }
}

impl Error for AppError {}

/// 認証済みユーザー
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn forbidden_renders_json_body() {
        let resp = AppError::Forbidden(None).into_response();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"message": "Forbidden", "reason": null}"#);
    }

    #[tokio::test]
    async fn unexpected_hides_the_cause() {
        let resp = AppError::Unexpected("db exploded".into()).into_response();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            &body[..],
            br#"{"message": "Internal Server Error", "reason": null}"#
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            AppError::Forbidden(Some("bad token".into())).to_string(),
            "Forbidden: bad token"
        );
        assert_eq!(AppError::Forbidden(None).to_string(), "Forbidden: no message");
    }
}
