use agentboard_api::{app, config::Settings, db, AppState};
use axum::http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentboard_api=info,tower_http=info")),
        )
        .init();

    let settings = Settings::load()?;

    let pool = db::open_pool(&settings.database_url)?;
    db::run_migrations(&pool)?;
    tracing::info!(database = %settings.database_url, "database ready");

    let origin = if settings.cors_origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(settings.cors_origin.parse::<HeaderValue>()?)
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let state = AppState::new(pool, &settings);
    let router = app(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "API server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
