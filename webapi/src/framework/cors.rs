use axum::http::HeaderValue;
use tower_http::cors::CorsLayer;

/// 許可されたoriginだけを通すCORSレイヤー. パースできないoriginは読み飛ばす.
pub fn mk_cors_layer(allow_origins: &[String]) -> CorsLayer {
    let origins = allow_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("ignoring CORS origin {origin}: {e}");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new().allow_origin(origins)
}
