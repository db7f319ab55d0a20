#[macro_use]
extern crate rocket;

pub mod api;
pub mod artifacts;
pub mod auth;
pub mod db;
pub mod demo;
pub mod env;
pub mod error;
pub mod fingerprint;
pub mod generator;
pub mod lookup;
pub mod models;
pub mod render;
pub mod roster;
pub mod routes;
pub mod telemetry;
pub mod tracking;
pub mod validation;
pub mod verification;
#[cfg(test)]
mod test;

use std::sync::Arc;

use api::{
    api_audit_artifacts, api_create_course, api_create_school, api_generate_diplomas,
    api_get_certificate, api_get_courses, api_get_schools, api_login, api_logout, api_lookup,
    api_me, bad_request_api, health, not_found_api, unprocessable_api,
};
use artifacts::ArtifactStore;
use auth::unauthorized_api;
use db::clean_expired_sessions;
use env::{AppConfig, load_environment};
use error::AppError;
use generator::DiplomaGenerator;
use render::PdfCertificateRenderer;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use rocket_dyn_templates::Template;
use routes::{
    cert_download, cert_view, home, lookup_form, lookup_submit, not_found_page, server_error_page,
};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracking::{StripTrackingParams, clean_url_redirect};
use tracing::{error, info};

const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

/// Loads configuration, prepares the database and artifact directory, and
/// returns the configured server ready to launch.
pub async fn build() -> Result<Rocket<Build>, Error> {
    if let Err(e) = load_environment() {
        return Err(Error::Anyhow(anyhow::anyhow!(
            "Failed to load environment files: {}",
            e
        )));
    }
    init_tracing();

    let config = AppConfig::from_env()?;

    let pool = SqlitePool::connect(&config.database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    ArtifactStore::new(&config.artifacts_dir)
        .ensure_root()
        .await?;

    spawn_session_cleanup(pool.clone());

    Ok(init_rocket(pool, config))
}

fn spawn_session_cleanup(pool: SqlitePool) {
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(
                SESSION_CLEANUP_INTERVAL_SECS,
            ))
            .await;
        }
    });
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    let generator = DiplomaGenerator::new(
        ArtifactStore::new(&config.artifacts_dir),
        Arc::new(PdfCertificateRenderer),
        &config.base_url,
    );
    init_rocket_with_generator(pool, config, generator)
}

pub fn init_rocket_with_generator(
    pool: SqlitePool,
    config: AppConfig,
    generator: DiplomaGenerator,
) -> Rocket<Build> {
    info!(base_url = %config.base_url, "Starting diploma registry");

    // Rosters arrive as a single text field of a multipart form
    let limits = Limits::default()
        .limit("string", 1.mebibytes())
        .limit("data-form", 4.mebibytes());
    let figment = rocket::Config::figment().merge(("limits", limits));

    rocket::custom(figment)
        .manage(pool)
        .manage(config)
        .manage(generator)
        .mount(
            "/",
            routes![
                home,
                lookup_form,
                lookup_submit,
                cert_view,
                cert_download,
                clean_url_redirect
            ],
        )
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_get_schools,
                api_create_school,
                api_get_courses,
                api_create_course,
                api_generate_diplomas,
                api_get_certificate,
                api_lookup,
                api_audit_artifacts,
                health,
            ],
        )
        .register("/", catchers![not_found_page, server_error_page])
        .register(
            "/api",
            catchers![
                unauthorized_api,
                not_found_api,
                unprocessable_api,
                bad_request_api
            ],
        )
        .attach(TelemetryFairing)
        .attach(StripTrackingParams)
        .attach(Template::fairing())
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
}
