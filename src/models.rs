use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifiers are compared trimmed and uppercased everywhere: on upload, on
/// lookup and in the fingerprint.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub shift: String,
    pub director: String,
    pub coordinator: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSchool {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub shift: Option<String>,
    pub director: Option<String>,
    pub coordinator: Option<String>,
}

impl From<DbSchool> for School {
    fn from(school: DbSchool) -> Self {
        Self {
            id: school.id.unwrap_or_default(),
            name: school.name.unwrap_or_default(),
            code: school.code.unwrap_or_default(),
            shift: school.shift.unwrap_or_default(),
            director: school.director.unwrap_or_default(),
            coordinator: school.coordinator.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub level: String,
    pub hours: String, // Stored as text; the fingerprint hashes it verbatim
    pub competencies: String,
    pub modules: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCourse {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub level: Option<String>,
    pub hours: Option<String>,
    pub competencies: Option<String>,
    pub modules: Option<String>,
}

impl From<DbCourse> for Course {
    fn from(course: DbCourse) -> Self {
        Self {
            id: course.id.unwrap_or_default(),
            name: course.name.unwrap_or_default(),
            level: course.level.unwrap_or_default(),
            hours: course.hours.unwrap_or_default(),
            competencies: course.competencies.unwrap_or_default(),
            modules: course.modules.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Student {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub grade: String,
    pub group: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStudent {
    pub id: Option<i64>,
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub grade: Option<String>,
    pub group_name: Option<String>,
}

impl From<DbStudent> for Student {
    fn from(student: DbStudent) -> Self {
        Self {
            id: student.id.unwrap_or_default(),
            identifier: student.identifier.unwrap_or_default(),
            name: student.name.unwrap_or_default(),
            grade: student.grade.unwrap_or_default(),
            group: student.group_name.unwrap_or_default(),
        }
    }
}

/// Student data as it arrives from a roster row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub identifier: String,
    pub name: String,
    pub grade: String,
    pub group: String,
}

/// Outcome of inserting a roster student. An existing record always wins: its
/// name, grade and group are never overwritten by a later upload.
#[derive(Debug, Clone, PartialEq)]
pub enum StudentUpsert {
    Created(Student),
    Reused(Student),
}

impl StudentUpsert {
    pub fn student(&self) -> &Student {
        match self {
            StudentUpsert::Created(student) | StudentUpsert::Reused(student) => student,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, StudentUpsert::Created(_))
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Diploma {
    pub id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub school_id: i64,
    pub date: String,
    pub fingerprint: String,
    #[serde(skip_serializing)]
    pub artifact_path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbDiploma {
    pub id: Option<String>,
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub school_id: Option<i64>,
    pub date: Option<String>,
    pub fingerprint: Option<String>,
    pub artifact_path: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbDiploma> for Diploma {
    fn from(db: DbDiploma) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            student_id: db.student_id.unwrap_or_default(),
            course_id: db.course_id.unwrap_or_default(),
            school_id: db.school_id.unwrap_or_default(),
            date: db.date.unwrap_or_default(),
            fingerprint: db.fingerprint.unwrap_or_default(),
            artifact_path: db.artifact_path.unwrap_or_default(),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewDiploma {
    pub id: String,
    pub student_id: i64,
    pub course_id: i64,
    pub school_id: i64,
    pub date: String,
    pub fingerprint: String,
    pub artifact_path: String,
    pub created_at: NaiveDateTime,
}

/// A diploma with the rows it references, as needed to verify or render it.
#[derive(Debug, Serialize, Clone)]
pub struct DiplomaRecord {
    pub diploma: Diploma,
    pub student: Student,
    pub course: Course,
    pub school: School,
}

#[derive(Debug, Clone, Default)]
pub struct NewSchool {
    pub name: String,
    pub code: String,
    pub shift: String,
    pub director: String,
    pub coordinator: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub name: String,
    pub level: String,
    pub hours: String,
    pub competencies: String,
    pub modules: String,
}
