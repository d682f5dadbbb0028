use super::ReqScopedState;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

pub trait LoggerInterface {
    fn info(&self, item: &str);
    fn warning(&self, item: &str);
    fn danger(&self, item: &str);
    fn debug(&self, item: &str);
}

/// リクエストの情報を付与して構造化ログを出すロガー.
#[derive(Clone, Debug)]
pub struct Logger<'a>(pub &'a ReqScopedState);

impl<'a> LoggerInterface for Logger<'a> {
    fn info(&self, item: &str) {
        log(self.0, LogLevel::Info, item)
    }

    fn warning(&self, item: &str) {
        log(self.0, LogLevel::Warning, item)
    }

    fn danger(&self, item: &str) {
        log(self.0, LogLevel::Danger, item)
    }

    fn debug(&self, item: &str) {
        log(self.0, LogLevel::Debug, item)
    }
}

#[derive(Clone, Copy, Debug)]
enum LogLevel {
    Info,
    Warning,
    Danger,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let item = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Danger => "danger",
            LogLevel::Debug => "debug",
        };
        write!(f, "{}", item)
    }
}

fn log(ctx: &ReqScopedState, level: LogLevel, item: &str) {
    let line = mk_line(ctx, level, item);

    match level {
        LogLevel::Info => tracing::info!(target: "webapi::request", "{line}"),
        LogLevel::Warning => tracing::warn!(target: "webapi::request", "{line}"),
        LogLevel::Danger => tracing::error!(target: "webapi::request", "{line}"),
        LogLevel::Debug => tracing::debug!(target: "webapi::request", "{line}"),
    }
}

fn mk_line(ctx: &ReqScopedState, level: LogLevel, item: &str) -> Value {
    let mut map = ctx.log_member.clone();

    map.insert("log_level".to_string(), json!(level.to_string()));
    map.insert("message".to_string(), json!(item));

    map.into()
}

/// `RUST_LOG` を見てサブスクライバを設定する. 未設定なら info.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use ulid::Ulid;

    #[test]
    fn line_carries_request_members() {
        let req = Request::builder()
            .uri("/zethus/get_example?token=secret")
            .header("user-agent", "curl/8.0")
            .body(Body::empty())
            .unwrap();
        let state = ReqScopedState::new(Ulid::new(), None, &req, None);

        let line = mk_line(&state, LogLevel::Warning, "hello");

        assert_eq!(line["log_level"], "warning");
        assert_eq!(line["message"], "hello");
        assert_eq!(line["method"], "GET");
        assert_eq!(line["uri"], "/zethus/get_example");
        assert_eq!(line["user-agent"], "curl/8.0");
        assert_eq!(line["req_id"], state.req_id.to_string());
        assert!(line.get("remote_addr").is_none());
    }
}
