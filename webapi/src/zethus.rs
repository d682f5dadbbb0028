//! zethus のルートを登録する拡張.

use axum::{
    http::{header, HeaderValue},
    routing,
};

use crate::{
    framework::{
        json::APPLICATION_JSON,
        web_app::{url_path_join, HandlerSpec, HostPattern, Route, StaticFileOptions, WebApp},
    },
    settings::{APP_SEGMENT, EXAMPLE_SEGMENT, URL_PATH},
};

pub mod get_example;

/// `base_url` 以下に example エンドポイントと静的ファイルのルートを登録する.
pub fn setup_handlers(web_app: &mut WebApp) {
    let settings = web_app.settings();
    let base_url = rooted(&settings.base_url);

    let route_pattern = url_path_join(&[&base_url, URL_PATH, EXAMPLE_SEGMENT]);
    let route_zethus = url_path_join(&[&base_url, URL_PATH, APP_SEGMENT]);
    let public = settings.static_root.clone();

    tracing::info!("adding route for static file handler: {route_zethus}");
    tracing::info!("serving files: {}", public.display());

    let handlers = vec![
        HandlerSpec::api(Route::Exact(route_pattern), routing::get(get_example::handler))
            .authenticated()
            .default_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_JSON),
            ),
        HandlerSpec::static_files(
            Route::Prefix(route_zethus),
            StaticFileOptions { path: public },
        ),
    ];
    web_app.add_handlers(HostPattern::Any, handlers);
}

/// ルーターに渡すパスは `/` 始まりでなければならない.
fn rooted(base_url: &str) -> String {
    if base_url.starts_with('/') {
        base_url.to_string()
    } else {
        format!("/{base_url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::web_app::Settings;
    use std::path::PathBuf;

    fn web_app(base_url: &str) -> WebApp {
        WebApp::new(Settings {
            base_url: base_url.to_string(),
            static_root: PathBuf::from("/opt/zethus"),
        })
    }

    fn routes(app: &WebApp) -> Vec<Route> {
        app.routes().map(|(_, route)| route.clone()).collect()
    }

    #[test]
    fn registers_under_base_url() {
        for base in ["/", "/lab", "/user/alice/", "/a/b/c"] {
            let mut app = web_app(base);
            setup_handlers(&mut app);

            assert_eq!(
                routes(&app),
                vec![
                    Route::Exact(url_path_join(&[base, "zethus", "get_example"])),
                    Route::Prefix(url_path_join(&[base, "zethus", "app"])),
                ],
                "base_url {base}"
            );
        }
    }

    #[test]
    fn concrete_paths() {
        let mut app = web_app("/user/alice/");
        setup_handlers(&mut app);

        let shown: Vec<String> = routes(&app).iter().map(ToString::to_string).collect();
        assert_eq!(
            shown,
            vec![
                "/user/alice/zethus/get_example".to_string(),
                "/user/alice/zethus/app/(.*)".to_string(),
            ]
        );
    }

    #[test]
    fn empty_base_url_is_rooted() {
        let mut app = web_app("");
        setup_handlers(&mut app);

        let paths: Vec<String> = routes(&app).iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, vec!["/zethus/get_example", "/zethus/app"]);
        assert!(paths.iter().all(|p| p.starts_with("/zethus/")));
    }

    #[test]
    fn relative_base_url_is_rooted() {
        let mut app = web_app("lab");
        setup_handlers(&mut app);

        assert_eq!(routes(&app)[0].path(), "/lab/zethus/get_example");
    }

    #[test]
    fn registered_for_every_host() {
        let mut app = web_app("/");
        setup_handlers(&mut app);

        assert!(app.routes().all(|(pattern, _)| *pattern == HostPattern::Any));
    }

    #[test]
    fn second_setup_does_not_duplicate_routes() {
        let mut app = web_app("/");
        setup_handlers(&mut app);
        setup_handlers(&mut app);

        assert_eq!(routes(&app).len(), 2);
    }
}
