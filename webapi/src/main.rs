use std::{error::Error, net::SocketAddr};

use webapi::{
    framework::{
        self,
        env::Env,
        logger,
        web_app::{Settings, WebApp},
        AppState,
    },
    zethus,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logger::init_tracing();

    let env = Env::new()?;
    if env.token_generated {
        tracing::info!("no token configured, generated one: {}", env.token);
    }

    let listener = tokio::net::TcpListener::bind(env.bind_addr).await?;

    let mut web_app = WebApp::new(Settings {
        base_url: env.base_url.clone(),
        static_root: env.static_root.clone(),
    });
    zethus::setup_handlers(&mut web_app);

    let router = framework::mk_router(web_app, AppState::new(env));

    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("cannot listen for SIGTERM: {e}");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received SIGINT, shutting down");
            }
            return;
        }
    };

    tokio::select! {
        _ = terminate.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("received CTRL+C, shutting down");
    }
}
