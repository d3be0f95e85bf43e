use crate::config::ServerConfig;
use crate::error::Result;
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::get, Router};
use bookclub_app::{
    auth::session_layer,
    rest_api::api_router,
    state::{AppConfig, AppState},
};
use futures::FutureExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if !args.no_cors {
        app = app.layer(tower_http::cors::CorsLayer::very_permissive());
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;
    info!("Server stopped");

    Ok(())
}

pub fn main_router(state: AppState) -> Router<()> {
    let sessions = session_layer(state.config());

    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest("/api", api_router(state.clone()))
        .layer(sessions)
        .with_state(state)
        .route("/health", get(health));

    #[cfg(feature = "openapi")]
    {
        let docs = bookclub_app::rest_api::api_docs();
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs),
        );
    }
    router.layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    if config.uses_data_dir() {
        let data_dir = config.data_dir();
        if !data_dir.is_dir() {
            tokio::fs::create_dir_all(&data_dir).await?;
            info!("Created data directory {data_dir:?}");
        }
    }
    let app_config: AppConfig = config.into();

    let pool = bookclub_dal::new_pool(&config.database_url()).await?;
    bookclub_dal::migrate(&pool).await?;
    debug!("Database ready, {} admins configured", app_config.admin_emails.len());

    Ok(AppState::new(app_config, pool))
}
