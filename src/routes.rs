use rocket::form::Form;
use rocket::http::{Header, Status};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::{Request, State};
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::error::AppError;
use crate::generator::DiplomaGenerator;
use crate::lookup::find_latest_diploma_for_student;
use crate::verification::{get_artifact, verify};

const TITLE: &str = "Verificación de diplomas";

#[get("/")]
pub fn home() -> Template {
    Template::render("home", context! { title: TITLE })
}

#[get("/lookup")]
pub fn lookup_form() -> Template {
    Template::render(
        "lookup",
        context! {
            title: TITLE,
            identifier: "",
            error: Option::<String>::None,
        },
    )
}

#[derive(FromForm)]
pub struct LookupForm {
    identifier: String,
}

#[derive(Responder)]
pub enum LookupOutcome {
    Found(Redirect),
    Rejected(Custom<Template>),
}

#[post("/lookup", data = "<form>")]
pub async fn lookup_submit(form: Form<LookupForm>, db: &State<Pool<Sqlite>>) -> LookupOutcome {
    let identifier = form.into_inner().identifier;

    match find_latest_diploma_for_student(db, &identifier).await {
        Ok(diploma_id) => {
            info!(diploma_id = %diploma_id, "Redirecting lookup to certificate");
            LookupOutcome::Found(Redirect::to(format!("/cert/{}", diploma_id)))
        }
        Err(e) => {
            e.log_and_record("Diploma lookup");
            LookupOutcome::Rejected(Custom(
                e.status_code(),
                Template::render(
                    "lookup",
                    context! {
                        title: TITLE,
                        identifier: identifier,
                        error: e.public_message(),
                    },
                ),
            ))
        }
    }
}

#[get("/cert/<id>")]
pub async fn cert_view(id: &str, db: &State<Pool<Sqlite>>) -> Result<Template, Status> {
    let verification = verify(db, id)
        .await
        .map_err(|e| e.to_status_with_log("Certificate page"))?;
    let record = verification.record;

    Ok(Template::render(
        "cert",
        context! {
            title: TITLE,
            is_authentic: verification.is_authentic,
            diploma_id: &record.diploma.id,
            date: &record.diploma.date,
            issued_at: record.diploma.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            student_name: &record.student.name,
            course_name: &record.course.name,
            course_level: &record.course.level,
            course_hours: &record.course.hours,
            school_name: &record.school.name,
            school_code: &record.school.code,
        },
    ))
}

#[derive(Responder)]
#[response(content_type = "application/pdf")]
pub struct PdfDownload {
    body: Vec<u8>,
    disposition: Header<'static>,
}

impl PdfDownload {
    fn new(diploma_id: &str, body: Vec<u8>) -> Self {
        Self {
            body,
            disposition: Header::new(
                "Content-Disposition",
                format!("attachment; filename=\"diploma-{}.pdf\"", diploma_id),
            ),
        }
    }
}

#[get("/cert/<id>/download")]
pub async fn cert_download(
    id: &str,
    db: &State<Pool<Sqlite>>,
    generator: &State<DiplomaGenerator>,
) -> Result<PdfDownload, Status> {
    let bytes = get_artifact(db, generator.artifacts(), id)
        .await
        .map_err(|e| e.to_status_with_log("Certificate download"))?;

    Ok(PdfDownload::new(id, bytes))
}

#[catch(404)]
pub fn not_found_page(req: &Request) -> Template {
    error_page(req, AppError::NotFound("Page not found".to_string()))
}

#[catch(500)]
pub fn server_error_page(req: &Request) -> Template {
    error_page(req, AppError::Internal(String::new()))
}

fn error_page(req: &Request, error: AppError) -> Template {
    let message = if req.uri().path().as_str().starts_with("/cert/") && !error.is_server_fault() {
        "Diploma no encontrado".to_string()
    } else {
        error.public_message()
    };

    Template::render(
        "error",
        context! {
            title: TITLE,
            status: error.status_code().code,
            message: message,
        },
    )
}
