//! Tally authentication API server binary.
//!
//! Connects to PostgreSQL, applies migrations and serves the auth routes.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tally_api::config::ApiConfig;
use tally_core::auth::jwt::TokenService;
use tally_core::auth::service::AuthService;
use tally_core::config::SecurityPolicyProvider;
use tally_core::config::cache::{DEFAULT_SETTINGS_TTL_MS, SettingsCache};
use tally_core::store::pg::PgStore;
use tracing::info;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "tally_api_server", about = "Tally authentication API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR")]
    bind_addr: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// How long persisted setting overrides are cached, in milliseconds.
    #[arg(long, env = "SETTINGS_CACHE_TTL_MS", default_value_t = DEFAULT_SETTINGS_TTL_MS)]
    settings_cache_ttl_ms: i64,

    /// Skip running embedded migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tally_api=debug,tally_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(database_url) = args.database_url {
        config.pg_connection_url = database_url;
    }

    info!(
        bind_addr = %config.bind_addr,
        app_env = %config.app_env,
        max_connections = args.max_connections,
        "starting tally_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    if args.skip_migrations {
        info!("skipping database migrations");
    } else {
        info!("running database migrations");
        tally_api::migrate(&pool).await?;
    }

    let store = Arc::new(PgStore::new(pool));
    let policy = Arc::new(SecurityPolicyProvider::with_cache(
        store.clone(),
        config.security,
        SettingsCache::with_ttl_ms(args.settings_cache_ttl_ms),
    ));
    let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.access_token_ttl_secs);
    let auth = AuthService::new(store, policy, tokens, config.auth);

    let state = tally_api::AppState {
        auth: Arc::new(auth),
        config: config.clone(),
    };
    let app = tally_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
