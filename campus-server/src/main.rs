use campus_server::{logging, run_server, ServerContext};

use campus_registry::{fixtures, Registry, SqliteDatabase};
use colored::Colorize;
use log::{error, info};
use std::env;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite://campus.db";

#[derive(Debug, Error)]
enum StartupError {
    #[error("Could not initialize database: {0}")]
    Database(campus_registry::DatabaseError),

    #[error("Could not seed demo data: {0}")]
    Fixtures(#[from] fixtures::FixtureError),
}

impl StartupError {
    fn hint(&self) -> String {
        match self {
            StartupError::Database(_) => format!(
                "This is a database error. Make sure {} points at a writable location, then try again.",
                env::var("CAMPUS_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
            ),
            StartupError::Fixtures(_) => {
                "Demo seeding failed. Unset CAMPUS_SEED_DEMO to start without it.".to_string()
            }
        }
    }
}

async fn init() -> Result<ServerContext, StartupError> {
    let url = env::var("CAMPUS_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    info!("Connecting to database...");
    let database = SqliteDatabase::connect(&url)
        .await
        .map_err(StartupError::Database)?;

    let registry = Registry::new(database);

    if env::var("CAMPUS_SEED_DEMO").is_ok() {
        fixtures::seed_demo_data(&registry).await?;
    }

    Ok(ServerContext::new(registry))
}

#[tokio::main]
async fn main() {
    logging::init_logger();

    match init().await {
        Ok(context) => {
            info!("Initialized successfully.");
            run_server(context).await;
        }
        Err(e) => {
            error!("{}", "Campus failed to start!".bold());
            error!("{}", e);
            error!("{}", format!("Hint: {}", e.hint()).italic());
        }
    }
}
