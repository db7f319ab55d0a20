use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{find_student_by_identifier, get_latest_diploma_id_for_student};
use crate::error::AppError;
use crate::models::normalize_identifier;

pub const STUDENT_NOT_FOUND: &str = "No encontrado. Verifica tu CURP.";
pub const NO_DIPLOMAS: &str = "No hay diplomas para este alumno.";

/// Id of the most recently issued diploma for a student identifier.
#[instrument(skip(pool))]
pub async fn find_latest_diploma_for_student(
    pool: &Pool<Sqlite>,
    identifier: &str,
) -> Result<String, AppError> {
    let identifier = normalize_identifier(identifier);
    if identifier.is_empty() {
        return Err(AppError::Validation("Ingresa tu CURP.".to_string()));
    }

    let student = find_student_by_identifier(pool, &identifier)
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    let diploma_id = get_latest_diploma_id_for_student(pool, student.id)
        .await?
        .ok_or_else(|| AppError::NotFound(NO_DIPLOMAS.to_string()))?;

    info!(diploma_id = %diploma_id, "Found latest diploma");
    Ok(diploma_id)
}
