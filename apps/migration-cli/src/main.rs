use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use db_access::config::DEFAULT_OPERATIONAL_DATABASE;
use db_access::{ConnectionProvider, DatabaseIdentity, DevModeConfig, RetryPolicy};
use migrator::{Migrator, DEFAULT_MIGRATIONS_DIR};

#[derive(Parser)]
#[command(name = "migration-cli")]
#[command(about = "Provision a database and bring it up to date (development mode)")]
struct Args {
    /// Logical name of the target database
    #[arg(short, long, env = "DATABASE_NAME")]
    database: String,

    /// Connection string for the pooled development database
    #[arg(short, long, env = "DATABASE_URL")]
    url: String,

    /// Directory holding the migration files and their manifest
    #[arg(long, default_value = DEFAULT_MIGRATIONS_DIR)]
    migrations_dir: PathBuf,

    /// Administrative database used for existence checks and creation
    #[arg(long, env = "OPERATIONAL_DATABASE", default_value = DEFAULT_OPERATIONAL_DATABASE)]
    operational_db: String,

    /// Attempts before a resuming database is given up on
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, default_value_t = 2000)]
    base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    #[arg(long, default_value_t = 10000)]
    max_delay_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_env_filter("migrator=info,migration=info,db_access=info,sqlx=warn")
        .init();

    let args = Args::parse();

    let policy = RetryPolicy::new(
        args.max_attempts,
        Duration::from_millis(args.base_delay_ms),
        Duration::from_millis(args.max_delay_ms),
    );
    let provider = ConnectionProvider::direct(policy);
    let identity = DatabaseIdentity::named(args.database.clone());
    let dev = DevModeConfig::enabled(args.url.clone());

    let migrator = Migrator::new(provider, identity, ())
        .with_dev(dev)
        .with_migrations_dir(args.migrations_dir)
        .with_operational_database(args.operational_db);

    match migrator.run().await {
        Ok(result) => {
            // The result doubles as a function response payload; print it
            // verbatim and let the exit code mirror the status.
            match serde_json::to_string(&result) {
                Ok(payload) => println!("{payload}"),
                Err(_) => println!("{}", result.body),
            }
            std::process::exit(if result.is_success() { 0 } else { 1 });
        }
        Err(e) => {
            eprintln!("Migration failed: {e}");
            std::process::exit(1);
        }
    }
}
