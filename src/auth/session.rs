use chrono::{NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;

use crate::env::AppConfig;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";
const TOKEN_LENGTH: usize = 48;

/// Request-scoped proof that the caller logged in with the admin password.
/// Handlers that take this guard never run for anonymous requests.
#[derive(Debug, Serialize, Clone)]
pub struct AdminSession {
    pub id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAdminSession {
    pub id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbAdminSession> for AdminSession {
    fn from(session: DbAdminSession) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: session.id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or(now),
            // A row without expiry is treated as already expired
            expires_at: session.expires_at.unwrap_or(NaiveDateTime::MIN),
        }
    }
}

impl AdminSession {
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}

pub fn verify_admin_password(config: &AppConfig, candidate: &str) -> Result<bool, AppError> {
    if candidate.is_empty() {
        return Ok(false);
    }

    match bcrypt::verify(candidate, &config.admin_password_hash) {
        Ok(valid) => Ok(valid),
        Err(e) => Err(AppError::Internal(format!(
            "Configured admin password hash is unusable: {}",
            e
        ))),
    }
}
