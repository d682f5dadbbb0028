use axum::response::IntoResponse;
use serde::Serialize;

use crate::framework::{json::Json, logger::LoggerInterface, session::Session, ReqScopedState};

pub const MESSAGE: &str = "This is /zethus/get_example endpoint!";

/// 認証は登録時にホスト側で付与されるので、ここではセッションを受け取るだけ.
pub async fn handler(state: ReqScopedState, Session { user, .. }: Session) -> impl IntoResponse {
    state
        .logger()
        .debug(&format!("get_example requested by {}", user.name));

    Json(ResponseValue { data: MESSAGE })
}

#[derive(Serialize)]
struct ResponseValue {
    data: &'static str,
}
