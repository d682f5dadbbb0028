//! 拡張がルートを登録するためのウェブアプリケーション.
//!
//! 拡張は [`WebApp::settings`] で `base_url` などを読み、
//! [`WebApp::add_handlers`] でホストパターンごとにルートを追加する.
//! 実際の `axum::Router` への変換はホスト側が [`WebApp::into_router`] で行う.

use std::{fmt, path::PathBuf};

use axum::{
    http::{HeaderName, HeaderValue},
    middleware,
    routing::MethodRouter,
    Router,
};
use regex::Regex;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};

use crate::settings::HOST_PATTERN;

use super::{middleware as host, AppState};

/// ウェブアプリケーションの設定. 起動後は変わらない.
#[derive(Clone, Debug)]
pub struct Settings {
    pub base_url: String,
    pub static_root: PathBuf,
}

/// リクエストのホスト名に対するパターン.
#[derive(Clone, Debug)]
pub enum HostPattern {
    /// `.*$`
    Any,
    Matching { source: String, regex: Regex },
}

impl HostPattern {
    /// 先頭に固定してマッチさせる. `.*$` は [`HostPattern::Any`] になる.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        if pattern == HOST_PATTERN {
            return Ok(HostPattern::Any);
        }

        let regex = Regex::new(&format!("^(?:{pattern})"))?;
        Ok(HostPattern::Matching {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            HostPattern::Any => HOST_PATTERN,
            HostPattern::Matching { source, .. } => source,
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Any => true,
            HostPattern::Matching { regex, .. } => regex.is_match(host),
        }
    }
}

impl PartialEq for HostPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ルートのパス
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// パスが完全に一致する
    Exact(String),
    /// パスの前方が一致する. 残りの部分はハンドラに渡る.
    Prefix(String),
}

impl Route {
    pub fn path(&self) -> &str {
        match self {
            Route::Exact(path) | Route::Prefix(path) => path,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Exact(path) => f.write_str(path),
            Route::Prefix(path) => write!(f, "{path}/(.*)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaticFileOptions {
    pub path: PathBuf,
}

pub enum Handler {
    Api(MethodRouter<AppState>),
    /// 前方一致した残りのパスを `path` 以下のファイルとして返す.
    StaticFiles(StaticFileOptions),
}

/// `(pattern, handler, options)` の組.
pub struct HandlerSpec {
    pub route: Route,
    pub handler: Handler,
    pub authenticated: bool,
    pub default_headers: Vec<(HeaderName, HeaderValue)>,
}

impl HandlerSpec {
    pub fn api(route: Route, method_router: MethodRouter<AppState>) -> Self {
        Self {
            route,
            handler: Handler::Api(method_router),
            authenticated: false,
            default_headers: Vec::new(),
        }
    }

    pub fn static_files(route: Route, options: StaticFileOptions) -> Self {
        Self {
            route,
            handler: Handler::StaticFiles(options),
            authenticated: false,
            default_headers: Vec::new(),
        }
    }

    /// ハンドラの前に認証を要求する.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// このルートのすべてのレスポンスに付けるヘッダー. エラーレスポンスも含む.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.push((name, value));
        self
    }

    fn into_router(self) -> Router<AppState> {
        let HandlerSpec {
            route,
            handler,
            authenticated,
            default_headers,
        } = self;

        let mut router = match handler {
            Handler::Api(method_router) => {
                // 未実装のメソッドには認証より先に 405 を返す
                let method_router = if authenticated {
                    method_router.route_layer(middleware::from_fn(host::auth))
                } else {
                    method_router
                };

                match &route {
                    Route::Exact(path) => Router::new().route(path, method_router),
                    Route::Prefix(path) => {
                        Router::new().route(&format!("{path}/*path"), method_router)
                    }
                }
            }
            Handler::StaticFiles(options) => {
                let prefix = route.path().to_string();
                // `prefix/(.*)` なので、プレフィックスそのものにはマッチさせない
                let router = Router::new()
                    .nest_service(&prefix, ServeDir::new(options.path))
                    .route_layer(middleware::from_fn_with_state(prefix, host::require_tail));
                if authenticated {
                    router.route_layer(middleware::from_fn(host::auth))
                } else {
                    router
                }
            }
        };

        for (name, value) in default_headers {
            router = router.layer(SetResponseHeaderLayer::overriding(name, value));
        }
        router
    }
}

/// 拡張から見えるウェブアプリケーション.
pub struct WebApp {
    settings: Settings,
    handlers: Vec<(HostPattern, Vec<HandlerSpec>)>,
}

impl WebApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            handlers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// ホストパターンに対してルートを追加する.
    ///
    /// 登録済みのパスと重なるものは追加せずに警告を出す.
    /// 同じ拡張を二回読み込んでもルートは一回だけ登録される.
    pub fn add_handlers(&mut self, host_pattern: HostPattern, handlers: Vec<HandlerSpec>) {
        for spec in handlers {
            if let Err(e) = check_route_path(spec.route.path()) {
                tracing::warn!("route {} cannot be registered, skipping: {e}", spec.route);
                continue;
            }

            if self.is_registered(spec.route.path()) {
                tracing::warn!(
                    "route {} is already registered, skipping (host pattern {})",
                    spec.route,
                    host_pattern
                );
                continue;
            }

            match self.handlers.iter_mut().find(|(p, _)| *p == host_pattern) {
                Some((_, group)) => group.push(spec),
                None => self.handlers.push((host_pattern.clone(), vec![spec])),
            }
        }
    }

    fn is_registered(&self, path: &str) -> bool {
        self.handlers
            .iter()
            .flat_map(|(_, group)| group)
            .any(|spec| spec.route.path() == path)
    }

    /// 登録済みのルートを登録順に返す.
    pub fn routes(&self) -> impl Iterator<Item = (&HostPattern, &Route)> {
        self.handlers
            .iter()
            .flat_map(|(pattern, group)| group.iter().map(move |spec| (pattern, &spec.route)))
    }

    pub fn into_router(self) -> Router<AppState> {
        self.handlers
            .into_iter()
            .fold(Router::new(), |router, (host_pattern, group)| {
                let mut group_router = group
                    .into_iter()
                    .fold(Router::new(), |acc, spec| acc.merge(spec.into_router()));

                if let HostPattern::Matching { .. } = host_pattern {
                    group_router = group_router
                        .route_layer(middleware::from_fn_with_state(host_pattern, host::host_filter));
                }

                router.merge(group_router)
            })
    }
}

/// ルーターのパス構文として解釈される文字
pub const RESERVED_PATH_CHARS: [char; 2] = [':', '*'];

/// ルーターに渡せるパスか確かめる.
///
/// `:` と `*` はキャプチャとして解釈されるので、リテラルのパスには含められない.
pub fn check_route_path(path: &str) -> Result<(), InvalidRoutePath> {
    if !path.starts_with('/') {
        return Err(InvalidRoutePath::NotAbsolute(path.to_string()));
    }
    match path.chars().find(|c| RESERVED_PATH_CHARS.contains(c)) {
        Some(c) => Err(InvalidRoutePath::ReservedChar(path.to_string(), c)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRoutePath {
    NotAbsolute(String),
    ReservedChar(String, char),
}

impl fmt::Display for InvalidRoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRoutePath::NotAbsolute(path) => write!(f, "{path:?} does not start with '/'"),
            InvalidRoutePath::ReservedChar(path, c) => {
                write!(f, "{path:?} contains the reserved character {c:?}")
            }
        }
    }
}

impl std::error::Error for InvalidRoutePath {}

/// パスの断片を `/` でつなぐ.
///
/// 各断片の前後の `/` は取り除き、空の断片は無視する.
/// 先頭の断片が `/` で始まっていれば結果も `/` で始まり、
/// 最後の断片が `/` で終わっていれば結果も `/` で終わる.
pub fn url_path_join(pieces: &[&str]) -> String {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return String::new();
    };
    let initial = first.starts_with('/');
    let is_final = last.ends_with('/');

    let mut result = pieces
        .iter()
        .map(|piece| piece.trim_matches('/'))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if initial {
        result.insert(0, '/');
    }
    if is_final {
        result.push('/');
    }
    if result == "//" {
        result = "/".to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing;

    fn settings() -> Settings {
        Settings {
            base_url: "/".to_string(),
            static_root: PathBuf::from("/tmp/zethus"),
        }
    }

    #[test]
    fn joins_like_a_url_path() {
        assert_eq!(url_path_join(&["/", "zethus", "app"]), "/zethus/app");
        assert_eq!(url_path_join(&["/lab/", "zethus", "get_example"]), "/lab/zethus/get_example");
        assert_eq!(url_path_join(&["", "zethus", "app"]), "zethus/app");
        assert_eq!(url_path_join(&["a//", "/b/", "c/"]), "a/b/c/");
        assert_eq!(url_path_join(&["/", "/"]), "/");
        assert_eq!(url_path_join(&["/"]), "/");
        assert_eq!(url_path_join(&[]), "");
    }

    #[test]
    fn wildcard_host_pattern() {
        let p = HostPattern::new(".*$").unwrap();
        assert_eq!(p, HostPattern::Any);
        assert!(p.matches("anything.example.org"));
        assert_eq!(p.to_string(), ".*$");
    }

    #[test]
    fn host_pattern_is_anchored_at_start() {
        let p = HostPattern::new(r"notebook\.example\.org$").unwrap();
        assert!(p.matches("notebook.example.org"));
        assert!(!p.matches("evil-notebook.example.org"));
        assert!(!p.matches("notebook.example.org.evil"));
    }

    #[test]
    fn invalid_host_pattern() {
        assert!(HostPattern::new("(").is_err());
    }

    #[test]
    fn route_display() {
        assert_eq!(Route::Exact("/a/b".into()).to_string(), "/a/b");
        assert_eq!(Route::Prefix("/a/app".into()).to_string(), "/a/app/(.*)");
    }

    #[test]
    fn duplicate_paths_are_skipped() {
        let mut app = WebApp::new(settings());
        let mk = || {
            vec![
                HandlerSpec::api(Route::Exact("/a".into()), routing::get(|| async { "a" })),
                HandlerSpec::static_files(
                    Route::Prefix("/files".into()),
                    StaticFileOptions {
                        path: PathBuf::from("/tmp"),
                    },
                ),
            ]
        };

        app.add_handlers(HostPattern::Any, mk());
        app.add_handlers(HostPattern::Any, mk());

        let routes: Vec<_> = app.routes().map(|(_, r)| r.clone()).collect();
        assert_eq!(
            routes,
            vec![Route::Exact("/a".into()), Route::Prefix("/files".into())]
        );
    }

    #[test]
    fn reserved_chars_are_not_route_paths() {
        assert_eq!(check_route_path("/user/alice/zethus/app"), Ok(()));
        assert_eq!(
            check_route_path("/a*b/zethus/get_example"),
            Err(InvalidRoutePath::ReservedChar("/a*b/zethus/get_example".into(), '*'))
        );
        assert_eq!(
            check_route_path("/user/:name/zethus/get_example"),
            Err(InvalidRoutePath::ReservedChar("/user/:name/zethus/get_example".into(), ':'))
        );
        assert_eq!(
            check_route_path("zethus/app"),
            Err(InvalidRoutePath::NotAbsolute("zethus/app".into()))
        );
    }

    #[test]
    fn unroutable_paths_are_skipped() {
        let mut app = WebApp::new(settings());
        app.add_handlers(
            HostPattern::Any,
            vec![
                HandlerSpec::api(Route::Exact("/a*b/x".into()), routing::get(|| async { "x" })),
                HandlerSpec::api(Route::Exact("/u/:name/x".into()), routing::get(|| async { "x" })),
                HandlerSpec::api(Route::Exact("/ok".into()), routing::get(|| async { "ok" })),
            ],
        );

        let paths: Vec<_> = app.routes().map(|(_, r)| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/ok".to_string()]);

        // 変換でパニックしない
        let _router = app.into_router();
    }

    #[test]
    fn groups_by_host_pattern() {
        let mut app = WebApp::new(settings());
        let only = HostPattern::new("localhost$").unwrap();

        app.add_handlers(
            HostPattern::Any,
            vec![HandlerSpec::api(Route::Exact("/a".into()), routing::get(|| async { "a" }))],
        );
        app.add_handlers(
            only.clone(),
            vec![HandlerSpec::api(Route::Exact("/b".into()), routing::get(|| async { "b" }))],
        );

        let routes: Vec<_> = app
            .routes()
            .map(|(p, r)| (p.to_string(), r.path().to_string()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (".*$".to_string(), "/a".to_string()),
                ("localhost$".to_string(), "/b".to_string()),
            ]
        );
    }
}
