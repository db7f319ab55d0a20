use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://diplomas.db?mode=rwc";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_ARTIFACTS_DIR: &str = "generated";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 8;
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Runtime settings for the registry, read from the process environment after
/// [`load_environment`] has merged the env files.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Public origin used to build verification URLs, without trailing slash.
    pub base_url: String,
    pub artifacts_dir: PathBuf,
    /// bcrypt hash of the shared admin password.
    pub admin_password_hash: String,
    pub session_ttl: chrono::Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url_from_env();

        let base_url = dotenvy::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = normalize_base_url(&base_url)?;

        let artifacts_dir = dotenvy::var("ARTIFACTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

        let session_ttl_hours = match dotenvy::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("SESSION_TTL_HOURS is not a number: {}", raw))?,
            Err(_) => DEFAULT_SESSION_TTL_HOURS,
        };
        if session_ttl_hours <= 0 {
            bail!("SESSION_TTL_HOURS must be positive, got {}", session_ttl_hours);
        }

        let admin_password_hash = match dotenvy::var("ADMIN_PASSWORD_HASH") {
            Ok(hash) if !hash.trim().is_empty() => hash.trim().to_string(),
            _ => {
                let password = match dotenvy::var("ADMIN_PASSWORD") {
                    Ok(password) if !password.is_empty() => password,
                    _ => {
                        warn!("ADMIN_PASSWORD not set, falling back to the default password");
                        DEFAULT_ADMIN_PASSWORD.to_string()
                    }
                };
                bcrypt::hash(password, bcrypt::DEFAULT_COST)
                    .context("Failed to hash admin password")?
            }
        };

        Ok(Self {
            database_url,
            base_url,
            artifacts_dir,
            admin_password_hash,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
        })
    }
}

pub fn database_url_from_env() -> String {
    dotenvy::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        bail!("BASE_URL must start with http:// or https://, got {}", raw);
    }
    Ok(trimmed.to_string())
}
