pub const SESSION_ID_KEY: &str = "session-id";
/// クエリパラメータで渡すトークンのキー
pub const TOKEN_QUERY_KEY: &str = "token";

pub const TIMEOUT_DURATION: u64 = 30;

/// すべてのホストにマッチするホストパターン
pub const HOST_PATTERN: &str = ".*$";

/// 拡張のURLセグメント
pub const URL_PATH: &str = "zethus";
pub const EXAMPLE_SEGMENT: &str = "get_example";
pub const APP_SEGMENT: &str = "app";

/// 静的ファイルのディレクトリ名 (クレートのディレクトリ直下)
pub const PUBLIC_DIR_NAME: &str = "zethus";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8888";
pub const DEFAULT_BASE_URL: &str = "/";
