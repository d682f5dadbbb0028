use std::{net::SocketAddr, time::Instant};

use axum::{
    extract::{self, ConnectInfo},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ulid::Ulid;

use super::{
    logger::LoggerInterface,
    session,
    system::AppError,
    web_app::HostPattern,
    AppState, ReqScopedState,
};

/// リクエストごとの状態を作り、資格情報からセッションを解決する.
pub async fn setup(
    extract::State(state): extract::State<AppState>,
    mut req: extract::Request,
    next: Next,
) -> Response {
    let req_id = Ulid::new();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let session = session::find_credential(req.headers(), req.uri())
        .and_then(|credential| session::find_session(&credential, &state.env.token));

    let req_scoped_state = ReqScopedState::new(req_id, session, &req, remote_addr.as_ref());
    req.extensions_mut().insert(req_scoped_state);

    next.run(req).await
}

/// アクセスログ
pub async fn log(req: extract::Request, next: Next) -> Result<Response, AppError> {
    let item = req
        .extensions()
        .get::<ReqScopedState>()
        .cloned()
        .ok_or_else(|| AppError::Unexpected("setup middleware has not run".into()))?;

    let started = Instant::now();
    let resp = next.run(req).await;

    let status = resp.status();
    let line = format!("{} in {}ms", status, started.elapsed().as_millis());
    let logger = item.logger();
    match AccessLevel::of(status) {
        AccessLevel::Info => logger.info(&line),
        AccessLevel::Warning => logger.warning(&line),
        AccessLevel::Danger => logger.danger(&line),
    }
    Ok(resp)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AccessLevel {
    Info,
    Warning,
    Danger,
}

impl AccessLevel {
    fn of(status: StatusCode) -> Self {
        if status.is_server_error() {
            AccessLevel::Danger
        } else if status.is_client_error() {
            AccessLevel::Warning
        } else {
            AccessLevel::Info
        }
    }
}

/// 認証済みでなければハンドラまで到達させない.
pub async fn auth(req: extract::Request, next: Next) -> Result<Response, AppError> {
    let item = req
        .extensions()
        .get::<ReqScopedState>()
        .ok_or_else(|| AppError::Unexpected("setup middleware has not run".into()))?;

    if item.session.is_some() {
        Ok(next.run(req).await)
    } else {
        item.logger().warning("rejected unauthenticated request");
        Err(AppError::Forbidden(None))
    }
}

/// 前方一致ルートで、プレフィックスの後ろに何もないリクエストは 404 にする.
pub async fn require_tail(
    extract::State(prefix): extract::State<String>,
    req: extract::Request,
    next: Next,
) -> Response {
    if req.uri().path() == prefix {
        StatusCode::NOT_FOUND.into_response()
    } else {
        next.run(req).await
    }
}

/// ホストパターンにマッチしないリクエストは、そのルートが存在しないものとして扱う.
pub async fn host_filter(
    extract::State(pattern): extract::State<HostPattern>,
    req: extract::Request,
    next: Next,
) -> Response {
    let matched = request_host(&req).is_some_and(|host| pattern.matches(host));

    if matched {
        next.run(req).await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn request_host(req: &extract::Request) -> Option<&str> {
    let host = req.uri().host().or_else(|| {
        req.headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
    })?;

    Some(strip_port(host))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:8888
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}
