//! Deterministic fingerprint over the facts that define a diploma.
//!
//! The digest is `sha256` of the fields below joined with `|`, in this order:
//!
//! 1. student identifier
//! 2. student name
//! 3. school name
//! 4. school code
//! 5. course name
//! 6. course level
//! 7. course hours
//! 8. accreditation date
//!
//! Absent values are hashed as the empty string so every field keeps its
//! position. Hours and date are hashed exactly as stored; reformatting either
//! one changes the digest of every existing diploma.
//!
//! This is a plain hash, not a signature. Anyone who can rewrite both the
//! stored facts and the stored fingerprint can produce a record that verifies.

use sha2::{Digest, Sha256};

use crate::models::{Course, School, Student};

pub const FIELD_SEPARATOR: char = '|';

/// Hex length of a SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// Borrowed view over the eight hashed fields, in hashing order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintFields<'a> {
    pub student_identifier: &'a str,
    pub student_name: &'a str,
    pub school_name: &'a str,
    pub school_code: &'a str,
    pub course_name: &'a str,
    pub course_level: &'a str,
    pub course_hours: &'a str,
    pub date: &'a str,
}

impl<'a> FingerprintFields<'a> {
    pub fn new(student: &'a Student, course: &'a Course, school: &'a School, date: &'a str) -> Self {
        Self {
            student_identifier: &student.identifier,
            student_name: &student.name,
            school_name: &school.name,
            school_code: &school.code,
            course_name: &course.name,
            course_level: &course.level,
            course_hours: &course.hours,
            date,
        }
    }

    fn ordered(&self) -> [&'a str; 8] {
        [
            self.student_identifier,
            self.student_name,
            self.school_name,
            self.school_code,
            self.course_name,
            self.course_level,
            self.course_hours,
            self.date,
        ]
    }

    /// The exact string that gets hashed.
    pub fn canonical(&self) -> String {
        let mut canonical = String::new();
        for (i, field) in self.ordered().iter().enumerate() {
            if i > 0 {
                canonical.push(FIELD_SEPARATOR);
            }
            canonical.push_str(field);
        }
        canonical
    }
}

pub fn fingerprint_fields(fields: &FingerprintFields<'_>) -> String {
    let digest = Sha256::digest(fields.canonical().as_bytes());
    hex::encode(digest)
}

pub fn fingerprint(student: &Student, course: &Course, school: &School, date: &str) -> String {
    fingerprint_fields(&FingerprintFields::new(student, course, school, date))
}

/// Case-sensitive comparison: stored fingerprints are always lowercase hex, so
/// anything else is a mismatch.
pub fn matches(stored: &str, recomputed: &str) -> bool {
    stored.len() == FINGERPRINT_LEN && stored == recomputed
}
