mod api;
mod middleware;

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = dispensary_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = dispensary_db::PoolConfig::from_app_config(&config);
    let pool = dispensary_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = dispensary_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations complete");

    let assistant = match &config.llm {
        Some(llm) => Some(dispensary_assistant::AssistantClient::from_config(llm)?),
        None => {
            tracing::info!("DISPENSARY_LLM_API_URL not set; chat auto-replies disabled");
            None
        }
    };

    let state = AppState::new(pool, &config).with_assistant(assistant);
    let app = build_app(state, rate_limit_state(config.rate_limit_per_minute));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        env = ?config.env,
        stock_policy = ?config.stock_policy,
        "dispensary server listening"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
