use crate::{
    auth::{AdminSession, DbAdminSession},
    error::AppError,
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::models::{
    Course, DbCourse, DbDiploma, DbSchool, DbStudent, Diploma, NewCourse, NewDiploma, NewSchool,
    NewStudent, School, Student, StudentUpsert,
};

const SCHOOL_COLUMNS: &str = "id, name, code, shift, director, coordinator";
const COURSE_COLUMNS: &str = "id, name, level, hours, competencies, modules";
const STUDENT_COLUMNS: &str = "id, identifier, name, grade, group_name";
const DIPLOMA_COLUMNS: &str =
    "id, student_id, course_id, school_id, date, fingerprint, artifact_path, created_at";

#[instrument(skip(pool))]
pub async fn create_school(pool: &Pool<Sqlite>, school: &NewSchool) -> Result<i64, AppError> {
    info!("Creating school");
    let res = sqlx::query(
        "INSERT INTO schools (name, code, shift, director, coordinator) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&school.name)
    .bind(&school.code)
    .bind(&school.shift)
    .bind(&school.director)
    .bind(&school.coordinator)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_school(pool: &Pool<Sqlite>, id: i64) -> Result<School, AppError> {
    info!("Fetching school by ID");
    let row = sqlx::query_as::<_, DbSchool>(&format!(
        "SELECT {} FROM schools WHERE id = ?",
        SCHOOL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(school) => Ok(School::from(school)),
        _ => Err(AppError::NotFound(format!("School with id {} not found", id))),
    }
}

#[instrument(skip(pool))]
pub async fn get_all_schools(pool: &Pool<Sqlite>) -> Result<Vec<School>, AppError> {
    info!("Getting all schools");
    let rows = sqlx::query_as::<_, DbSchool>(&format!(
        "SELECT {} FROM schools ORDER BY name, id",
        SCHOOL_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(School::from).collect())
}

#[instrument(skip(pool))]
pub async fn create_course(pool: &Pool<Sqlite>, course: &NewCourse) -> Result<i64, AppError> {
    info!("Creating course");
    let res = sqlx::query(
        "INSERT INTO courses (name, level, hours, competencies, modules) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&course.name)
    .bind(&course.level)
    .bind(&course.hours)
    .bind(&course.competencies)
    .bind(&course.modules)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_course(pool: &Pool<Sqlite>, id: i64) -> Result<Course, AppError> {
    info!("Fetching course by ID");
    let row = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {} FROM courses WHERE id = ?",
        COURSE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(course) => Ok(Course::from(course)),
        _ => Err(AppError::NotFound(format!("Course with id {} not found", id))),
    }
}

#[instrument(skip(pool))]
pub async fn get_all_courses(pool: &Pool<Sqlite>) -> Result<Vec<Course>, AppError> {
    info!("Getting all courses");
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {} FROM courses ORDER BY name, id",
        COURSE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Course::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_student(pool: &Pool<Sqlite>, id: i64) -> Result<Student, AppError> {
    info!("Fetching student by ID");
    let row = sqlx::query_as::<_, DbStudent>(&format!(
        "SELECT {} FROM students WHERE id = ?",
        STUDENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(student) => Ok(Student::from(student)),
        _ => Err(AppError::NotFound(format!("Student with id {} not found", id))),
    }
}

/// Expects an already normalized identifier.
#[instrument(skip(pool))]
pub async fn find_student_by_identifier(
    pool: &Pool<Sqlite>,
    identifier: &str,
) -> Result<Option<Student>, AppError> {
    info!("Finding student by identifier");
    let row = sqlx::query_as::<_, DbStudent>(&format!(
        "SELECT {} FROM students WHERE identifier = ?",
        STUDENT_COLUMNS
    ))
    .bind(identifier)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Student::from))
}

#[instrument(skip(pool))]
pub async fn count_students(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Inserts the student unless the identifier is already taken, then reads back
/// whichever row owns the identifier. The unique index on `identifier` is the
/// only guard against two concurrent uploads racing on the same student.
#[instrument(skip(conn), fields(identifier = %student.identifier))]
pub async fn upsert_student(
    conn: &mut SqliteConnection,
    student: &NewStudent,
) -> Result<StudentUpsert, AppError> {
    info!("Upserting student");
    let inserted = sqlx::query(
        "INSERT INTO students (identifier, name, grade, group_name)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (identifier) DO NOTHING",
    )
    .bind(&student.identifier)
    .bind(&student.name)
    .bind(&student.grade)
    .bind(&student.group)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query_as::<_, DbStudent>(&format!(
        "SELECT {} FROM students WHERE identifier = ?",
        STUDENT_COLUMNS
    ))
    .bind(&student.identifier)
    .fetch_one(&mut *conn)
    .await?;

    let existing = Student::from(row);
    if inserted.rows_affected() == 1 {
        Ok(StudentUpsert::Created(existing))
    } else {
        Ok(StudentUpsert::Reused(existing))
    }
}

#[instrument(skip(conn, diploma), fields(diploma_id = %diploma.id))]
pub async fn insert_diploma(
    conn: &mut SqliteConnection,
    diploma: &NewDiploma,
) -> Result<(), AppError> {
    info!("Inserting diploma");
    sqlx::query(
        "INSERT INTO diplomas
         (id, student_id, course_id, school_id, date, fingerprint, artifact_path, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&diploma.id)
    .bind(diploma.student_id)
    .bind(diploma.course_id)
    .bind(diploma.school_id)
    .bind(&diploma.date)
    .bind(&diploma.fingerprint)
    .bind(&diploma.artifact_path)
    .bind(diploma.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_diploma(pool: &Pool<Sqlite>, id: &str) -> Result<Diploma, AppError> {
    info!("Fetching diploma by ID");
    let row = sqlx::query_as::<_, DbDiploma>(&format!(
        "SELECT {} FROM diplomas WHERE id = ?",
        DIPLOMA_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(diploma) => Ok(Diploma::from(diploma)),
        _ => Err(AppError::NotFound(format!("Diploma {} not found", id))),
    }
}

/// Most recent diploma of a student. Equal timestamps fall back to the larger
/// diploma id so the answer never depends on storage order.
#[instrument(skip(pool))]
pub async fn get_latest_diploma_id_for_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Option<String>, AppError> {
    info!("Getting latest diploma for student");
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM diplomas
         WHERE student_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

#[instrument(skip(pool))]
pub async fn get_all_diplomas(pool: &Pool<Sqlite>) -> Result<Vec<Diploma>, AppError> {
    info!("Getting all diplomas");
    let rows = sqlx::query_as::<_, DbDiploma>(&format!(
        "SELECT {} FROM diplomas ORDER BY created_at, id",
        DIPLOMA_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Diploma::from).collect())
}

#[instrument(skip(pool, token))]
pub async fn create_admin_session(
    pool: &Pool<Sqlite>,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating admin session");

    let res = sqlx::query("INSERT INTO admin_sessions (token, expires_at) VALUES (?, ?)")
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<AdminSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbAdminSession>(
        "SELECT id, token, created_at, expires_at FROM admin_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(AdminSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
