use std::sync::Arc;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::db;
use crate::error::AppError;
use crate::fingerprint::fingerprint;
use crate::models::{Course, NewDiploma, NewStudent, School, StudentUpsert};
use crate::render::{Certificate, CertificateRenderer};
use crate::roster::Roster;

pub static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Created,
    Reused,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Generated {
        diploma_id: String,
        student: StudentStatus,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Serialize, Clone)]
pub struct RowReport {
    pub line: u64,
    pub identifier: Option<String>,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct GenerationResult {
    pub count: usize,
    pub diploma_ids: Vec<String>,
    pub failed: usize,
    pub rows: Vec<RowReport>,
}

/// Turns a roster into diplomas: one student upsert, one fingerprint, one
/// rendered certificate and one record per row, strictly in roster order.
pub struct DiplomaGenerator {
    artifacts: ArtifactStore,
    renderer: Arc<dyn CertificateRenderer>,
    base_url: String,
}

impl DiplomaGenerator {
    pub fn new(
        artifacts: ArtifactStore,
        renderer: Arc<dyn CertificateRenderer>,
        base_url: &str,
    ) -> Self {
        Self {
            artifacts,
            renderer,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Public page for a diploma; this is also the QR payload.
    pub fn verification_url(&self, diploma_id: &str) -> String {
        format!("{}/cert/{}", self.base_url, diploma_id)
    }

    /// Rejects the whole batch before anything is written when the request
    /// itself is unusable. Once rows start, a failing row is reported and the
    /// rest of the roster still runs.
    #[instrument(skip(self, pool, roster), fields(rows = roster.len()))]
    pub async fn generate(
        &self,
        pool: &Pool<Sqlite>,
        school_id: i64,
        course_id: i64,
        date: &str,
        roster: &Roster,
    ) -> Result<GenerationResult, AppError> {
        let date = date.trim();
        if date.is_empty() {
            return Err(AppError::Validation(
                "Accreditation date is required".to_string(),
            ));
        }
        if !DATE_PATTERN.is_match(date) {
            return Err(AppError::Validation(
                "Accreditation date must be in YYYY-MM-DD form".to_string(),
            ));
        }
        if roster.is_empty() {
            return Err(AppError::Validation(
                "Roster does not contain any students".to_string(),
            ));
        }

        let school = resolve(db::get_school(pool, school_id).await, "school")?;
        let course = resolve(db::get_course(pool, course_id).await, "course")?;

        info!(school = %school.name, course = %course.name, "Starting diploma generation");

        let mut result = GenerationResult::default();
        for line in &roster.lines {
            let outcome = match &line.parsed {
                Err(row_error) => {
                    warn!(line = line.line, error = %row_error, "Skipping invalid roster row");
                    RowOutcome::Failed {
                        reason: row_error.to_string(),
                    }
                }
                Ok(student) => {
                    match self
                        .generate_one(pool, student, &course, &school, date)
                        .await
                    {
                        Ok((diploma_id, upsert)) => {
                            result.diploma_ids.push(diploma_id.clone());
                            RowOutcome::Generated {
                                diploma_id,
                                student: if upsert.was_created() {
                                    StudentStatus::Created
                                } else {
                                    StudentStatus::Reused
                                },
                            }
                        }
                        Err(e) => {
                            e.log_and_record(&format!("Generating diploma for line {}", line.line));
                            RowOutcome::Failed {
                                reason: e.public_message(),
                            }
                        }
                    }
                }
            };

            if matches!(outcome, RowOutcome::Failed { .. }) {
                result.failed += 1;
            }
            result.rows.push(RowReport {
                line: line.line,
                identifier: line.identifier().map(String::from),
                outcome,
            });
        }

        result.count = result.diploma_ids.len();
        info!(
            generated = result.count,
            failed = result.failed,
            "Diploma generation finished"
        );

        Ok(result)
    }

    /// One row. The artifact is on disk before the record that points at it
    /// is committed; if the commit fails the file is removed again.
    #[instrument(skip(self, pool, course, school), fields(identifier = %student.identifier))]
    async fn generate_one(
        &self,
        pool: &Pool<Sqlite>,
        student: &NewStudent,
        course: &Course,
        school: &School,
        date: &str,
    ) -> Result<(String, StudentUpsert), AppError> {
        let mut tx = pool.begin().await?;

        let upsert = db::upsert_student(&mut tx, student).await?;
        let stored_student = upsert.student();

        let diploma_id = Uuid::new_v4().to_string();
        let verification_url = self.verification_url(&diploma_id);
        let digest = fingerprint(stored_student, course, school, date);

        let document = self.renderer.render(&Certificate {
            diploma_id: &diploma_id,
            student: stored_student,
            course,
            school,
            date,
            verification_url: &verification_url,
        })?;
        let artifact_path = self.artifacts.write(&diploma_id, &document).await?;

        let new_diploma = NewDiploma {
            id: diploma_id.clone(),
            student_id: stored_student.id,
            course_id: course.id,
            school_id: school.id,
            date: date.to_string(),
            fingerprint: digest,
            artifact_path: artifact_path.display().to_string(),
            created_at: Utc::now().naive_utc(),
        };

        if let Err(e) = db::insert_diploma(&mut tx, &new_diploma).await {
            self.artifacts.remove(&diploma_id).await;
            return Err(e);
        }
        if let Err(e) = tx.commit().await {
            self.artifacts.remove(&diploma_id).await;
            return Err(e.into());
        }

        Ok((diploma_id, upsert))
    }
}

fn resolve<T>(result: Result<T, AppError>, what: &str) -> Result<T, AppError> {
    match result {
        Err(AppError::NotFound(_)) => Err(AppError::Validation(format!("Unknown {}", what))),
        other => other,
    }
}
