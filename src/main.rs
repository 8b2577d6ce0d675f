use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use speechkarma::auth::jwt::JwtService;
use speechkarma::config::AppConfig;
use speechkarma::db;
use speechkarma::routes;
use speechkarma::state::AppState;
use speechkarma::summary::{ChatCompletionSummarizer, Summarizer};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        ai_summary_enabled = config.ai_summary_enabled,
        "loaded speechkarma configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    run_migrations(&pool)?;

    let jwt = JwtService::from_config(&config)?;
    let summarizer = build_summarizer(&config)?;

    let state = AppState::new(pool, config, jwt, summarizer);
    let listen_addr: SocketAddr = {
        let config = state.config.clone();
        format!("{}:{}", config.server_host, config.server_port).parse()?
    };
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn build_summarizer(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn Summarizer>>> {
    if !config.ai_summary_enabled {
        return Ok(None);
    }
    let api_url = config
        .ai_summary_api_url
        .clone()
        .context("AI_SUMMARY_API_URL must be set when AI_SUMMARY_ENABLED")?;
    let summarizer = ChatCompletionSummarizer::new(
        api_url,
        config.ai_summary_api_key.clone(),
        config.ai_summary_model.clone(),
        Duration::from_secs(config.ai_summary_timeout_seconds),
    )?;
    Ok(Some(Arc::new(summarizer)))
}

fn run_migrations(pool: &db::PgPool) -> anyhow::Result<()> {
    let mut conn = pool
        .get()
        .context("failed to acquire connection for migrations")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
