use diploma_registry::demo::seed_demo_data;
use diploma_registry::env::{database_url_from_env, load_environment};
use diploma_registry::telemetry::init_tracing;
use sqlx::SqlitePool;
use tracing::{error, info};

#[rocket::main]
async fn main() {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment: {}", e);
    }
    init_tracing();

    let database_url = database_url_from_env();
    let pool = match SqlitePool::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to {}: {}", database_url, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        error!("Database migration failed: {}", e);
        std::process::exit(1);
    }

    match seed_demo_data(&pool).await {
        Ok(summary) => info!(?summary, "Database initialised"),
        Err(e) => {
            error!("Failed to seed demo data: {}", e);
            std::process::exit(1);
        }
    }

    pool.close().await;
}
