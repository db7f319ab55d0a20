#[cfg(test)]
mod tests {
    use lopdf::Document;

    use crate::models::{Course, School, Student};
    use crate::render::{Certificate, CertificateRenderer, PdfCertificateRenderer};

    #[test]
    fn test_renders_single_page_pdf() {
        let student = Student {
            id: 1,
            identifier: "ABCD010101HDFXXX01".to_string(),
            name: "Ana Pérez".to_string(),
            grade: "3".to_string(),
            group: "A".to_string(),
        };
        let course = Course {
            id: 1,
            name: "Computación Básica".to_string(),
            level: "Inicial".to_string(),
            hours: "30".to_string(),
            competencies: "Uso básico de PC; ".repeat(20),
            modules: String::new(),
        };
        let school = School {
            id: 1,
            name: "Escuela Demo".to_string(),
            code: "00XXX0000X".to_string(),
            shift: String::new(),
            director: String::new(),
            coordinator: String::new(),
        };

        let bytes = PdfCertificateRenderer
            .render(&Certificate {
                diploma_id: "7f1c2a8e-0000-4000-8000-000000000001",
                student: &student,
                course: &course,
                school: &school,
                date: "2024-06-01",
                verification_url: "http://verify.test/cert/7f1c2a8e-0000-4000-8000-000000000001",
            })
            .expect("Rendering failed");

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let document = Document::load_mem(&bytes).expect("Rendered PDF should parse");
        assert_eq!(document.get_pages().len(), 1);
    }
}
