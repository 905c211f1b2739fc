mod cache;
mod extract;
mod gateway;
mod gemini;
mod models;
mod normalize;
mod prompt;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use routes::{chat, current_plan, list_recipes, reset_session, set_day_time, skip_day, AppState};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::gateway::ChatGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Missing credential is fatal for the whole session, surfaced here.
    let gateway = ChatGateway::from_env()?;
    let state = AppState::new(gateway);

    let app = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/recipes", get(list_recipes))
        .route("/api/plan", get(current_plan))
        .route("/api/plan/day/:day_index/skip", post(skip_day))
        .route("/api/plan/day/:day_index/time", post(set_day_time))
        .route("/api/session/reset", post(reset_session))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
