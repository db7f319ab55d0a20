#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDateTime, Utc};

    use crate::db::{insert_diploma, upsert_student};
    use crate::error::AppError;
    use crate::lookup::{NO_DIPLOMAS, STUDENT_NOT_FOUND, find_latest_diploma_for_student};
    use crate::models::{NewDiploma, NewStudent};
    use crate::test::test_utils::{DEMO_COURSE, DEMO_SCHOOL, create_standard_test_db};

    fn new_student() -> NewStudent {
        NewStudent {
            identifier: "ABCD010101HDFXXX01".to_string(),
            name: "Ana Pérez".to_string(),
            grade: "3".to_string(),
            group: "A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_diploma_wins_and_ties_break_on_id() {
        let test_db = create_standard_test_db().await;
        let school_id = test_db.school_id(DEMO_SCHOOL);
        let course_id = test_db.course_id(DEMO_COURSE);
        let mut conn = test_db.pool.acquire().await.unwrap();

        let student = upsert_student(&mut conn, &new_student()).await.unwrap();
        let student_id = student.student().id;

        let now = Utc::now().naive_utc();
        let diploma = |id: &str, created_at: NaiveDateTime| NewDiploma {
            id: id.to_string(),
            student_id,
            course_id,
            school_id,
            date: "2024-06-01".to_string(),
            fingerprint: "0".repeat(64),
            artifact_path: format!("generated/{}.pdf", id),
            created_at,
        };

        insert_diploma(&mut conn, &diploma("old", now - Duration::days(30)))
            .await
            .unwrap();
        insert_diploma(&mut conn, &diploma("b-newest", now))
            .await
            .unwrap();
        insert_diploma(&mut conn, &diploma("a-newest", now))
            .await
            .unwrap();
        drop(conn);

        let latest = find_latest_diploma_for_student(&test_db.pool, " abcd010101hdfxxx01 ")
            .await
            .expect("Lookup failed");
        assert_eq!(latest, "b-newest");
    }

    #[tokio::test]
    async fn test_unknown_student_and_student_without_diplomas() {
        let test_db = create_standard_test_db().await;

        match find_latest_diploma_for_student(&test_db.pool, "NOPE").await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, STUDENT_NOT_FOUND),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let mut conn = test_db.pool.acquire().await.unwrap();
        upsert_student(&mut conn, &new_student()).await.unwrap();
        drop(conn);

        match find_latest_diploma_for_student(&test_db.pool, "ABCD010101HDFXXX01").await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, NO_DIPLOMAS),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_identifier_is_rejected() {
        let test_db = create_standard_test_db().await;

        let result = find_latest_diploma_for_student(&test_db.pool, "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
