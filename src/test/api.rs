#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use serde_json::{Value, json};

    use crate::api::{CertificateResponse, LoginResponse, LookupResponse};
    use crate::models::{Course, School};
    use crate::test::test_utils::{
        DEMO_COURSE, DEMO_DATE, DEMO_SCHOOL, create_standard_test_db, generate_form,
        login_test_admin, setup_test_client,
    };

    const ROSTER: &str = "curp,nombre,grado,grupo\nABCD010101HDFXXX01,Ana Pérez,3,A\n,Sin CURP,3,A\n";

    #[rocket::async_test]
    async fn test_login_api() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "password": "wrong" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: LoginResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(!body.success);
        assert!(body.error.is_some());

        let response = client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        login_test_admin(&client).await;

        let response = client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let me: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(me.get("token").is_none(), "Session token must not be exposed");

        let response = client.post("/api/logout").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);

        let response = client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_empty_password_is_a_validation_error() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(json!({ "password": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn test_admin_endpoints_require_session() {
        let test_db = create_standard_test_db().await;
        let school_id = test_db.school_id(DEMO_SCHOOL);
        let course_id = test_db.course_id(DEMO_COURSE);
        let (client, _test_db) = setup_test_client(test_db).await;

        for endpoint in ["/api/schools", "/api/courses", "/api/admin/audit", "/api/me"] {
            let response = client.get(endpoint).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Unauthorized,
                "Endpoint {} did not require authentication",
                endpoint
            );
        }

        let (content_type, body) = generate_form(school_id, course_id, DEMO_DATE, ROSTER);
        let response = client
            .post("/api/diplomas/generate")
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let forged = client
            .get("/api/schools")
            .private_cookie(("session_token", "forged-token"))
            .dispatch()
            .await;
        assert_eq!(forged.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_expired_session_is_rejected() {
        let test_db = create_standard_test_db().await;
        let expired_at = (chrono::Utc::now() - chrono::Duration::minutes(5)).naive_utc();
        crate::db::create_admin_session(&test_db.pool, "expired-token", expired_at)
            .await
            .unwrap();
        let (client, _test_db) = setup_test_client(test_db).await;

        let response = client
            .get("/api/schools")
            .private_cookie(("session_token", "expired-token"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_reference_data_api() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;
        login_test_admin(&client).await;

        let response = client
            .post("/api/schools")
            .header(ContentType::JSON)
            .body(json!({ "name": "Escuela Norte", "code": "11YYY1111Y" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let school: School = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(school.code, "11YYY1111Y");
        assert_eq!(school.shift, "");

        let response = client
            .post("/api/schools")
            .header(ContentType::JSON)
            .body(json!({ "name": "  ", "code": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let errors: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(errors["errors"].get("name").is_some());
        assert!(errors["errors"].get("code").is_some());

        let response = client
            .post("/api/courses")
            .header(ContentType::JSON)
            .body(json!({ "name": "Ofimática", "level": "Intermedio", "hours": " 40 " }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let course: Course = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(course.hours, "40");

        let response = client.get("/api/schools").dispatch().await;
        let schools: Vec<School> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(schools.len(), 2);

        let response = client.get("/api/courses").dispatch().await;
        let courses: Vec<Course> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(courses.len(), 2);
    }

    #[rocket::async_test]
    async fn test_generate_verify_and_lookup_flow() {
        let test_db = create_standard_test_db().await;
        let school_id = test_db.school_id(DEMO_SCHOOL);
        let course_id = test_db.course_id(DEMO_COURSE);
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_admin(&client).await;

        let (content_type, body) = generate_form(school_id, course_id, DEMO_DATE, ROSTER);
        let response = client
            .post("/api/diplomas/generate")
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let result: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["failed"], 1);
        assert_eq!(result["rows"][0]["status"], "generated");
        assert_eq!(result["rows"][0]["student"], "created");
        assert_eq!(result["rows"][1]["status"], "failed");
        assert_eq!(result["rows"][1]["reason"], "missing identifier");
        let diploma_id = result["diploma_ids"][0].as_str().unwrap().to_string();
        assert_eq!(test_db.artifact_count(), 1);

        client.post("/api/logout").dispatch().await;

        let response = client.get(format!("/api/cert/{}", diploma_id)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        assert!(!body.contains("fingerprint"));
        assert!(!body.contains(".pdf"));
        let cert: CertificateResponse = serde_json::from_str(&body).unwrap();
        assert!(cert.is_authentic);
        assert_eq!(cert.student_name, "Ana Pérez");
        assert_eq!(cert.school_name, DEMO_SCHOOL);
        assert_eq!(cert.date, DEMO_DATE);

        let response = client
            .get("/api/lookup/abcd010101hdfxxx01")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let lookup: LookupResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(lookup.diploma_id, diploma_id);
        assert_eq!(
            lookup.verification_url,
            format!("http://verify.test/cert/{}", diploma_id)
        );

        let response = client.get("/api/lookup/UNKNOWN").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client.get("/api/cert/does-not-exist").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_generate_rejects_bad_requests() {
        let test_db = create_standard_test_db().await;
        let school_id = test_db.school_id(DEMO_SCHOOL);
        let course_id = test_db.course_id(DEMO_COURSE);
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_admin(&client).await;

        let cases = [
            (school_id, course_id, "06/01/2024", ROSTER),
            (school_id + 10, course_id, DEMO_DATE, ROSTER),
            (school_id, course_id, DEMO_DATE, "nombre,grado\nAna,3\n"),
        ];

        for (school, course, date, roster) in cases {
            let (content_type, body) = generate_form(school, course, date, roster);
            let response = client
                .post("/api/diplomas/generate")
                .header(content_type)
                .body(body)
                .dispatch()
                .await;
            assert_eq!(response.status(), Status::BadRequest);
            let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
            assert_eq!(body["status"], "error");
        }

        assert_eq!(
            crate::db::count_students(&test_db.pool).await.unwrap(),
            0
        );
        assert_eq!(test_db.artifact_count(), 0);
    }

    #[rocket::async_test]
    async fn test_audit_reports_missing_files() {
        let test_db = create_standard_test_db().await;
        let school_id = test_db.school_id(DEMO_SCHOOL);
        let course_id = test_db.course_id(DEMO_COURSE);
        let (client, test_db) = setup_test_client(test_db).await;
        login_test_admin(&client).await;

        let (content_type, body) = generate_form(school_id, course_id, DEMO_DATE, ROSTER);
        let response = client
            .post("/api/diplomas/generate")
            .header(content_type)
            .body(body)
            .dispatch()
            .await;
        let result: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let diploma_id = result["diploma_ids"][0].as_str().unwrap().to_string();

        std::fs::remove_file(test_db.artifacts().path_for(&diploma_id)).unwrap();

        let response = client.get("/api/admin/audit").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let orphaned: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(orphaned[0]["diploma_id"], diploma_id.as_str());
    }

    #[rocket::async_test]
    async fn test_health() {
        let test_db = create_standard_test_db().await;
        let (client, _test_db) = setup_test_client(test_db).await;

        let response = client.get("/api/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }
}
