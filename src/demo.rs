use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::{create_course, create_school, get_all_courses, get_all_schools};
use crate::error::AppError;
use crate::models::{NewCourse, NewSchool};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SeedSummary {
    pub school_created: bool,
    pub course_created: bool,
}

pub fn demo_school() -> NewSchool {
    NewSchool {
        name: "Escuela Demo".to_string(),
        code: "00XXX0000X".to_string(),
        shift: "Matutino".to_string(),
        director: "Mtra. Ana López".to_string(),
        coordinator: "Ing. Carlos Ruiz".to_string(),
    }
}

pub fn demo_course() -> NewCourse {
    NewCourse {
        name: "Computación Básica".to_string(),
        level: "Inicial".to_string(),
        hours: "30".to_string(),
        competencies: "Uso básico de PC; Paint; Guardar archivos".to_string(),
        modules: "Intro PC; Teclado; Paint".to_string(),
    }
}

/// Inserts the demo school and course, each only when its table is empty.
#[instrument(skip(pool))]
pub async fn seed_demo_data(pool: &Pool<Sqlite>) -> Result<SeedSummary, AppError> {
    let mut summary = SeedSummary::default();

    if get_all_schools(pool).await?.is_empty() {
        create_school(pool, &demo_school()).await?;
        summary.school_created = true;
    }

    if get_all_courses(pool).await?.is_empty() {
        create_course(pool, &demo_course()).await?;
        summary.course_created = true;
    }

    info!(
        school_created = summary.school_created,
        course_created = summary.course_created,
        "Demo data ready"
    );
    Ok(summary)
}
