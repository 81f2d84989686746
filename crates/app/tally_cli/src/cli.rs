use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Tally account administration")]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/tally"
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Apply pending database migrations.
    Migrate,

    /// Create a verified admin account.
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "Administrator")]
        name: String,

        #[arg(long, env = "TALLY_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Clear the failed-login counter and lock of an account.
    Unlock {
        #[arg(long)]
        email: String,
    },

    /// Persist a security setting override (e.g. `security.maxFailedLoginAttempts`).
    SetSetting { key: String, value: String },

    /// Draw the next value from a named counter.
    NextId {
        #[arg(default_value = tally_core::store::USERS_COUNTER)]
        counter: String,
    },
}
