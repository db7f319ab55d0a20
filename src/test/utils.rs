#[cfg(test)]
pub mod test_db {
    use crate::artifacts::ArtifactStore;
    use crate::db::{create_course, create_school};
    use crate::env::AppConfig;
    use crate::error::AppError;
    use crate::generator::DiplomaGenerator;
    use crate::models::{NewCourse, NewSchool};
    use crate::render::{CertificateRenderer, PdfCertificateRenderer};
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Once};
    use uuid::Uuid;

    static INIT: Once = Once::new();
    pub static TEST_ADMIN_PASSWORD: &str = "correct-horse";
    pub static TEST_BASE_URL: &str = "http://verify.test";

    #[derive(Default)]
    pub struct TestDbBuilder {
        schools: Vec<NewSchool>,
        courses: Vec<NewCourse>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn school(mut self, name: &str, code: &str) -> Self {
            self.schools.push(NewSchool {
                name: name.to_string(),
                code: code.to_string(),
                shift: "Matutino".to_string(),
                director: "Mtra. Ana López".to_string(),
                coordinator: "Ing. Carlos Ruiz".to_string(),
            });
            self
        }

        pub fn course(mut self, name: &str, level: &str, hours: &str) -> Self {
            self.courses.push(NewCourse {
                name: name.to_string(),
                level: level.to_string(),
                hours: hours.to_string(),
                competencies: "Uso básico de PC; Paint; Guardar archivos".to_string(),
                modules: "Intro PC; Teclado; Paint".to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut school_ids = HashMap::new();
            for school in &self.schools {
                let id = create_school(&pool, school).await?;
                school_ids.insert(school.name.clone(), id);
            }

            let mut course_ids = HashMap::new();
            for course in &self.courses {
                let id = create_course(&pool, course).await?;
                course_ids.insert(course.name.clone(), id);
            }

            let artifacts_dir =
                std::env::temp_dir().join(format!("diploma-registry-test-{}", Uuid::new_v4()));

            Ok(TestDb {
                pool,
                school_ids,
                course_ids,
                artifacts_dir,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub school_ids: HashMap<String, i64>,
        pub course_ids: HashMap<String, i64>,
        pub artifacts_dir: PathBuf,
    }

    impl TestDb {
        pub fn school_id(&self, name: &str) -> i64 {
            self.school_ids[name]
        }

        pub fn course_id(&self, name: &str) -> i64 {
            self.course_ids[name]
        }

        pub fn artifacts(&self) -> ArtifactStore {
            ArtifactStore::new(&self.artifacts_dir)
        }

        pub fn generator(&self) -> DiplomaGenerator {
            self.generator_with(Arc::new(PdfCertificateRenderer))
        }

        pub fn generator_with(&self, renderer: Arc<dyn CertificateRenderer>) -> DiplomaGenerator {
            DiplomaGenerator::new(self.artifacts(), renderer, TEST_BASE_URL)
        }

        pub fn config(&self) -> AppConfig {
            AppConfig {
                database_url: "sqlite::memory:".to_string(),
                base_url: TEST_BASE_URL.to_string(),
                artifacts_dir: self.artifacts_dir.clone(),
                admin_password_hash: bcrypt::hash(TEST_ADMIN_PASSWORD, 4)
                    .expect("Failed to hash test password"),
                session_ttl: chrono::Duration::hours(8),
            }
        }

        pub fn artifact_count(&self) -> usize {
            std::fs::read_dir(&self.artifacts_dir)
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    impl Drop for TestDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.artifacts_dir);
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::test_db::{TEST_ADMIN_PASSWORD, TestDb, TestDbBuilder};
    use crate::error::AppError;
    use crate::init_rocket_with_generator;
    use crate::models::Student;
    use crate::render::{Certificate, CertificateRenderer};
    use crate::roster::{Roster, parse_roster};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    pub const DEMO_SCHOOL: &str = "Escuela Demo";
    pub const DEMO_COURSE: &str = "Computación Básica";
    pub const DEMO_DATE: &str = "2024-06-01";
    const MULTIPART_BOUNDARY: &str = "X-DIPLOMA-REGISTRY-BOUNDARY";

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .school(DEMO_SCHOOL, "00XXX0000X")
            .course(DEMO_COURSE, "Inicial", "30")
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub fn roster(text: &str) -> Roster {
        parse_roster(text).expect("Failed to parse test roster")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket =
            init_rocket_with_generator(test_db.pool.clone(), test_db.config(), test_db.generator());
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to create test client");
        (client, test_db)
    }

    pub async fn login_test_admin(client: &Client) {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "password": TEST_ADMIN_PASSWORD }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok, "Admin login failed");
    }

    /// Multipart body with plain fields and a roster file part.
    pub fn generate_form(
        school_id: i64,
        course_id: i64,
        date: &str,
        roster: &str,
    ) -> (ContentType, String) {
        let mut body = String::new();
        for (name, value) in [
            ("school_id", school_id.to_string()),
            ("course_id", course_id.to_string()),
            ("date", date.to_string()),
        ] {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, name, value
            ));
        }
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"roster\"; filename=\"roster.csv\"\r\nContent-Type: text/csv\r\n\r\n{}\r\n--{}--\r\n",
            MULTIPART_BOUNDARY, roster, MULTIPART_BOUNDARY
        ));

        let content_type = ContentType::new("multipart", "form-data")
            .with_params(("boundary", MULTIPART_BOUNDARY));
        (content_type, body)
    }

    /// Fails for one student name and renders a tiny placeholder otherwise.
    pub struct FailingRenderer {
        pub fail_for: String,
    }

    impl CertificateRenderer for FailingRenderer {
        fn render(&self, certificate: &Certificate<'_>) -> Result<Vec<u8>, AppError> {
            let student: &Student = certificate.student;
            if student.name == self.fail_for {
                return Err(AppError::Rendering(format!(
                    "Refusing to render {}",
                    student.name
                )));
            }
            Ok(format!("%PDF-1.5\n% {}\n", certificate.verification_url).into_bytes())
        }
    }
}
