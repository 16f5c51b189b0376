use sea_orm::Database;
use tracing::info;

use lorehaven_core::config::Config;
use lorehaven_core::tracing::init_tracing;
use lorehaven_verify::config::VerifyConfig;
use lorehaven_verify::router::build_router;
use lorehaven_verify::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing("info");

    let config = VerifyConfig::load().expect("failed to load verify config from environment");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let redis_cfg = deadpool_redis::Config::from_url(&config.redis_url);
    let redis = redis_cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .expect("failed to create Redis pool");

    let state = AppState {
        db,
        redis,
        policy: config.policy(),
        link_base: config.public_base_url.clone(),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.verify_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!(%addr, "verify service listening");
    axum::serve(listener, router).await.expect("server error");
}
