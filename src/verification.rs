use std::path::Path;

use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::artifacts::ArtifactStore;
use crate::db::{get_all_diplomas, get_course, get_diploma, get_school, get_student};
use crate::error::AppError;
use crate::fingerprint::{fingerprint, matches};
use crate::models::{DiplomaRecord, Student};

/// A diploma as it reads today, plus whether it still hashes to the
/// fingerprint taken when it was issued.
#[derive(Debug, Serialize, Clone)]
pub struct Verification {
    pub record: DiplomaRecord,
    pub is_authentic: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OrphanedDiploma {
    pub diploma_id: String,
    pub student_id: i64,
    pub date: String,
}

/// Loads a diploma with the rows it points at. Referenced rows that vanished
/// are an internal fault, not a missing diploma.
#[instrument(skip(pool))]
pub async fn load_record(pool: &Pool<Sqlite>, diploma_id: &str) -> Result<DiplomaRecord, AppError> {
    let diploma = get_diploma(pool, diploma_id).await?;

    let student: Student = get_student(pool, diploma.student_id)
        .await
        .map_err(dangling("student"))?;
    let course = get_course(pool, diploma.course_id)
        .await
        .map_err(dangling("course"))?;
    let school = get_school(pool, diploma.school_id)
        .await
        .map_err(dangling("school"))?;

    Ok(DiplomaRecord {
        diploma,
        student,
        course,
        school,
    })
}

fn dangling(what: &'static str) -> impl Fn(AppError) -> AppError {
    move |e| match e {
        AppError::NotFound(msg) => {
            AppError::Internal(format!("Diploma references a missing {}: {}", what, msg))
        }
        other => other,
    }
}

#[instrument(skip(pool))]
pub async fn verify(pool: &Pool<Sqlite>, diploma_id: &str) -> Result<Verification, AppError> {
    let record = load_record(pool, diploma_id).await?;

    let recomputed = fingerprint(
        &record.student,
        &record.course,
        &record.school,
        &record.diploma.date,
    );
    let is_authentic = matches(&record.diploma.fingerprint, &recomputed);

    if is_authentic {
        info!("Diploma fingerprint matches");
    } else {
        warn!("Diploma fingerprint does not match its current data");
    }

    Ok(Verification {
        record,
        is_authentic,
    })
}

#[instrument(skip(pool, artifacts))]
pub async fn get_artifact(
    pool: &Pool<Sqlite>,
    artifacts: &ArtifactStore,
    diploma_id: &str,
) -> Result<Vec<u8>, AppError> {
    let diploma = get_diploma(pool, diploma_id).await?;
    let path = Path::new(&diploma.artifact_path);

    if diploma.artifact_path.is_empty() || !artifacts.exists(path).await {
        warn!(diploma_id, "Certificate file is missing from the artifact store");
        return Err(AppError::NotFound("Certificate file not found".to_string()));
    }

    artifacts.read(path).await
}

/// Diploma records whose certificate file is gone.
#[instrument(skip(pool, artifacts))]
pub async fn audit_artifacts(
    pool: &Pool<Sqlite>,
    artifacts: &ArtifactStore,
) -> Result<Vec<OrphanedDiploma>, AppError> {
    let diplomas = get_all_diplomas(pool).await?;
    let total = diplomas.len();

    let mut orphaned = Vec::new();
    for diploma in diplomas {
        let present = !diploma.artifact_path.is_empty()
            && artifacts.exists(Path::new(&diploma.artifact_path)).await;
        if !present {
            orphaned.push(OrphanedDiploma {
                diploma_id: diploma.id,
                student_id: diploma.student_id,
                date: diploma.date,
            });
        }
    }

    info!(total, orphaned = orphaned.len(), "Artifact audit finished");
    Ok(orphaned)
}
