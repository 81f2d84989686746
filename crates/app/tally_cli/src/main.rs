// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use sqlx::postgres::PgPoolOptions;
use tally_core::auth::jwt::{DEFAULT_ACCESS_TOKEN_TTL_SECS, TokenService, resolve_jwt_secret};
use tally_core::auth::service::{AuthService, AuthSettings};
use tally_core::config::SecurityPolicyProvider;
use tally_core::models::config::{
    LOCKOUT_DURATION_MS_KEY, MAX_FAILED_ATTEMPTS_KEY, REQUIRE_EMAIL_VERIFICATION_KEY,
    SecurityDefaults,
};
use tally_core::store::SequenceGenerator;
use tally_core::store::pg::PgStore;

mod cli;
mod logging;

const SETTING_KEYS: [&str; 3] = [
    MAX_FAILED_ATTEMPTS_KEY,
    LOCKOUT_DURATION_MS_KEY,
    REQUIRE_EMAIL_VERIFICATION_KEY,
];

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    if let Commands::Version = args.command {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(args))
}

async fn execute(args: Cli) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await?;
    let store = Arc::new(PgStore::new(pool));

    match args.command {
        Commands::Version => {}
        Commands::Migrate => {
            tally_core::migrate::migrate(store.pool()).await?;
            log::info!("migrations applied");
        }
        Commands::CreateAdmin {
            email,
            name,
            password,
        } => {
            let id = auth_service(&store)
                .bootstrap_admin(&name, &email, &password)
                .await?;
            log::info!("created admin {email} with id {id}");
        }
        Commands::Unlock { email } => {
            let user = auth_service(&store).unlock(&email).await?;
            log::info!("unlocked {} (id {})", user.email, user.id);
        }
        Commands::SetSetting { key, value } => {
            if !SETTING_KEYS.contains(&key.as_str()) {
                return Err(Error::Custom(format!(
                    "unknown setting '{key}', expected one of: {}",
                    SETTING_KEYS.join(", ")
                )));
            }
            let policy = SecurityPolicyProvider::new(store.clone(), SecurityDefaults::default());
            policy.set_override(&key, &value).await?;
            log::info!("{key} = {value}");
        }
        Commands::NextId { counter } => {
            let value = store.next_value(&counter).await?;
            println!("{value}");
        }
    }

    Ok(())
}

fn auth_service(store: &Arc<PgStore>) -> AuthService {
    let policy = Arc::new(SecurityPolicyProvider::new(
        store.clone(),
        SecurityDefaults::default(),
    ));
    let tokens = TokenService::new(
        resolve_jwt_secret().as_bytes(),
        DEFAULT_ACCESS_TOKEN_TTL_SECS,
    );
    AuthService::new(store.clone(), policy, tokens, AuthSettings::default())
}
