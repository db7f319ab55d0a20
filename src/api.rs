use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::auth::{AdminSession, SESSION_COOKIE, verify_admin_password};
use crate::db::{
    create_admin_session, create_course, create_school, get_all_courses, get_all_schools,
    get_course, get_school, invalidate_session,
};
use crate::env::AppConfig;
use crate::generator::{DiplomaGenerator, GenerationResult};
use crate::lookup::find_latest_diploma_for_student;
use crate::models::{Course, NewCourse, NewSchool, School};
use crate::roster::parse_roster;
use crate::validation::{
    ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse,
};
use crate::verification::{OrphanedDiploma, audit_artifacts, verify};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub expires_at: Option<String>,
    pub error: Option<String>,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    let validated = login.validate_custom()?;

    if !verify_admin_password(config, &validated.password).validate_custom()? {
        warn!("Rejected admin login attempt");
        return Ok(Json(LoginResponse {
            success: false,
            expires_at: None,
            error: Some("Invalid password".to_string()),
        }));
    }

    let token = AdminSession::generate_token();
    let expires_at = Utc::now() + config.session_ttl;

    create_admin_session(db, &token, expires_at.naive_utc())
        .await
        .validate_custom()?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::seconds(
            config.session_ttl.num_seconds(),
        ));
    cookies.add_private(cookie);

    info!("Admin logged in");
    Ok(Json(LoginResponse {
        success: true,
        expires_at: Some(expires_at.to_rfc3339()),
        error: None,
    }))
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Redirect {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(e) = invalidate_session(db, &token).await {
            e.log_and_record("Logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Redirect::to("/")
}

#[get("/me")]
pub async fn api_me(session: AdminSession) -> Json<AdminSession> {
    Json(session)
}

#[derive(Deserialize, Validate)]
pub struct CreateSchoolRequest {
    #[validate(custom(function = "not_blank", message = "School name is required"))]
    name: String,
    #[validate(custom(function = "not_blank", message = "School code is required"))]
    code: String,
    #[serde(default)]
    shift: String,
    #[serde(default)]
    director: String,
    #[serde(default)]
    coordinator: String,
}

#[get("/schools")]
pub async fn api_get_schools(
    _session: AdminSession,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<School>>, ApiError> {
    let schools = get_all_schools(db).await.validate_custom()?;
    Ok(Json(schools))
}

#[post("/schools", data = "<school>")]
pub async fn api_create_school(
    _session: AdminSession,
    school: Json<CreateSchoolRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<School>>, ApiError> {
    let validated = school.validate_custom()?;

    let new_school = NewSchool {
        name: validated.name.trim().to_string(),
        code: validated.code.trim().to_string(),
        shift: validated.shift.trim().to_string(),
        director: validated.director.trim().to_string(),
        coordinator: validated.coordinator.trim().to_string(),
    };

    let id = create_school(db, &new_school).await.validate_custom()?;
    let school = get_school(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(school)))
}

#[derive(Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(custom(function = "not_blank", message = "Course name is required"))]
    name: String,
    #[validate(custom(function = "not_blank", message = "Course level is required"))]
    level: String,
    #[validate(custom(function = "not_blank", message = "Course hours are required"))]
    hours: String,
    #[serde(default)]
    competencies: String,
    #[serde(default)]
    modules: String,
}

#[get("/courses")]
pub async fn api_get_courses(
    _session: AdminSession,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = get_all_courses(db).await.validate_custom()?;
    Ok(Json(courses))
}

#[post("/courses", data = "<course>")]
pub async fn api_create_course(
    _session: AdminSession,
    course: Json<CreateCourseRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Course>>, ApiError> {
    let validated = course.validate_custom()?;

    // Hours are stored as typed; they feed the fingerprint verbatim
    let new_course = NewCourse {
        name: validated.name.trim().to_string(),
        level: validated.level.trim().to_string(),
        hours: validated.hours.trim().to_string(),
        competencies: validated.competencies.trim().to_string(),
        modules: validated.modules.trim().to_string(),
    };

    let id = create_course(db, &new_course).await.validate_custom()?;
    let course = get_course(db, id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(course)))
}

#[derive(FromForm)]
pub struct GenerateForm {
    school_id: i64,
    course_id: i64,
    date: String,
    roster: String,
}

#[post("/diplomas/generate", data = "<form>")]
pub async fn api_generate_diplomas(
    _session: AdminSession,
    form: Form<GenerateForm>,
    db: &State<Pool<Sqlite>>,
    generator: &State<DiplomaGenerator>,
) -> Result<Json<GenerationResult>, ApiError> {
    let form = form.into_inner();
    let roster = parse_roster(&form.roster).validate_custom()?;

    let result = generator
        .generate(db, form.school_id, form.course_id, &form.date, &roster)
        .await
        .validate_custom()?;

    Ok(Json(result))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CertificateResponse {
    pub diploma_id: String,
    pub is_authentic: bool,
    pub student_name: String,
    pub course_name: String,
    pub school_name: String,
    pub date: String,
    pub issued_at: String,
}

#[get("/cert/<id>")]
pub async fn api_get_certificate(
    id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let verification = verify(db, id).await.validate_custom()?;
    let record = verification.record;

    Ok(Json(CertificateResponse {
        diploma_id: record.diploma.id,
        is_authentic: verification.is_authentic,
        student_name: record.student.name,
        course_name: record.course.name,
        school_name: record.school.name,
        date: record.diploma.date,
        issued_at: record.diploma.created_at.to_rfc3339(),
    }))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LookupResponse {
    pub diploma_id: String,
    pub verification_url: String,
}

#[get("/lookup/<identifier>")]
pub async fn api_lookup(
    identifier: &str,
    db: &State<Pool<Sqlite>>,
    generator: &State<DiplomaGenerator>,
) -> Result<Json<LookupResponse>, ApiError> {
    let diploma_id = find_latest_diploma_for_student(db, identifier)
        .await
        .validate_custom()?;

    Ok(Json(LookupResponse {
        verification_url: generator.verification_url(&diploma_id),
        diploma_id,
    }))
}

#[get("/admin/audit")]
pub async fn api_audit_artifacts(
    _session: AdminSession,
    db: &State<Pool<Sqlite>>,
    generator: &State<DiplomaGenerator>,
) -> Result<Json<Vec<OrphanedDiploma>>, ApiError> {
    let orphaned = audit_artifacts(db, generator.artifacts())
        .await
        .validate_custom()?;
    Ok(Json(orphaned))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(404)]
pub fn not_found_api() -> Custom<Json<ValidationResponse>> {
    Status::NotFound.to_validation_response()
}

#[catch(422)]
pub fn unprocessable_api() -> Custom<Json<ValidationResponse>> {
    Status::UnprocessableEntity.to_validation_response()
}

#[catch(400)]
pub fn bad_request_api() -> Custom<Json<ValidationResponse>> {
    Status::BadRequest.to_validation_response()
}
