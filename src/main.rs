mod auth;
mod calendar;
mod config;
mod cpf;
mod middleware;

mod db;
mod error;
mod models;
mod routes;
mod stats;

use crate::{config::Config, models::AppState};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    tracing::info!(
        week_start = %cfg.agenda.week_start,
        business_hours = cfg.agenda.business_hours.len(),
        first_hour = cfg.agenda.business_hours.first().map(|h| h.hour()),
        session_ttl_hours = cfg.session_ttl_hours,
        db_max_connections = cfg.db_max_connections,
        "configuration loaded"
    );

    let state = AppState {
        db: pool,
        session_ttl_hours: cfg.session_ttl_hours,
        agenda: cfg.agenda,
    };

    // Browser clients on another origin call the API directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
