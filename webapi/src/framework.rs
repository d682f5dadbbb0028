pub mod cors;
pub mod env;
pub mod json;
pub mod logger;
pub mod middleware;
pub mod session;
pub mod system;
pub mod web_app;

use self::{env::Env, session::Session, system::AppError, web_app::WebApp};
use axum::{async_trait, extract, http::request::Parts, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::{net::SocketAddr, time::Duration};
use tower_http::timeout::TimeoutLayer;
use ulid::Ulid;

use crate::settings::TIMEOUT_DURATION;

/// アプリケーション全体での共有する状態.
#[derive(Clone)]
pub struct AppState {
    pub env: Env,
}

impl AppState {
    pub fn new(env: Env) -> Self {
        Self { env }
    }
}

/// リクエストごとに分離された状態.
#[derive(Clone, Debug)]
pub struct ReqScopedState {
    pub ts: DateTime<Utc>,
    pub req_id: Ulid,
    pub session: Option<Session>,
    pub log_member: Map<String, Value>,
}

impl ReqScopedState {
    pub fn new(
        req_id: Ulid,
        session: Option<Session>,
        req: &extract::Request,
        remote_addr: Option<&SocketAddr>,
    ) -> Self {
        let method = req.method();
        let uri = req.uri();

        let ts = i64::try_from(req_id.timestamp_ms())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        let mut pairs = vec![
            ("req_id", req_id.to_string()),
            ("timestamp", ts.to_rfc3339()),
            ("uri", uri.path().to_string()),
            ("method", method.to_string()),
        ];

        if let Some(addr) = remote_addr {
            pairs.push(("remote_addr", addr.to_string()));
        }

        // cookie と query にはトークンが含まれうるので記録しない
        if let Some(v) = req.headers().get("user-agent") {
            pairs.push((
                "user-agent",
                v.to_str().unwrap_or("parse error").to_string(),
            ));
        }

        Self {
            req_id,
            session,
            ts,
            log_member: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect(),
        }
    }

    pub fn logger(&self) -> logger::Logger {
        logger::Logger(self)
    }
}

#[async_trait]
impl<S> extract::FromRequestParts<S> for ReqScopedState
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ReqScopedState>()
            .cloned()
            .ok_or_else(|| AppError::Unexpected("request scoped state is missing".into()))
    }
}

/// ルートテーブルから、ホスト側のミドルウェアを含んだルーターを組み立てる.
pub fn mk_router(web_app: WebApp, state: AppState) -> Router {
    web_app
        .into_router()
        .layer(axum::middleware::from_fn(middleware::log))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::setup,
        ))
        .layer(cors::mk_cors_layer(&state.env.allow_origins))
        .layer(TimeoutLayer::new(Duration::from_secs(TIMEOUT_DURATION)))
        .with_state(state)
}
