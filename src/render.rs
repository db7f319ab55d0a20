//! Fixed-layout certificate rendering.
//!
//! The layout is a single A4 page drawn with the PDF base-14 Helvetica fonts,
//! so nothing has to be embedded. The QR code is painted module by module as
//! filled squares and always encodes the verification URL verbatim.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use qrcode::{Color, QrCode};
use tracing::instrument;

use crate::error::AppError;
use crate::models::{Course, School, Student};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const QR_SIZE: f32 = 100.0;
const QR_QUIET_ZONE: usize = 2;
const COMPETENCIES_MAX_CHARS: usize = 120;

type Rgb = (f32, f32, f32);

const BLACK: Rgb = (0.07, 0.07, 0.07);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const BORDER: Rgb = (0.047, 0.29, 0.431);
const ACCENT: Rgb = (0.463, 0.239, 0.737);

/// Everything printed on one certificate.
#[derive(Debug, Clone, Copy)]
pub struct Certificate<'a> {
    pub diploma_id: &'a str,
    pub student: &'a Student,
    pub course: &'a Course,
    pub school: &'a School,
    pub date: &'a str,
    pub verification_url: &'a str,
}

pub trait CertificateRenderer: Send + Sync {
    fn render(&self, certificate: &Certificate<'_>) -> Result<Vec<u8>, AppError>;
}

#[derive(Debug, Default, Clone)]
pub struct PdfCertificateRenderer;

impl CertificateRenderer for PdfCertificateRenderer {
    #[instrument(skip_all, fields(diploma_id = %certificate.diploma_id))]
    fn render(&self, certificate: &Certificate<'_>) -> Result<Vec<u8>, AppError> {
        let mut canvas = Canvas::default();
        draw_certificate(&mut canvas, certificate)?;

        let content = Content {
            operations: canvas.operations,
        }
        .encode()?;

        assemble_document(content, &format!("Diploma {}", certificate.diploma_id))
    }
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }

    // Rough Helvetica advance per em, good enough for centering
    fn average_advance(self) -> f32 {
        match self {
            Font::Regular => 0.5,
            Font::Bold => 0.56,
        }
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

/// Maps text to WinAnsiEncoding, which the base-14 fonts use. Latin-1
/// characters map directly; anything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '\u{20ac}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[derive(Default)]
struct Canvas {
    operations: Vec<Operation>,
}

impl Canvas {
    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn fill_color(&mut self, (r, g, b): Rgb) {
        self.op("rg", vec![real(r), real(g), real(b)]);
    }

    fn stroke_color(&mut self, (r, g, b): Rgb) {
        self.op("RG", vec![real(r), real(g), real(b)]);
    }

    fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.op("re", vec![real(x), real(y), real(width), real(height)]);
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32)) {
        self.op("m", vec![real(from.0), real(from.1)]);
        self.op("l", vec![real(to.0), real(to.1)]);
        self.op("S", vec![]);
    }

    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.op("BT", vec![]);
        self.op(
            "Tf",
            vec![Object::Name(font.resource_name().to_vec()), real(size)],
        );
        self.op("Td", vec![real(x), real(y)]);
        self.op("Tj", vec![Object::string_literal(win_ansi(text))]);
        self.op("ET", vec![]);
    }

    fn centered_text(&mut self, font: Font, size: f32, center_x: f32, y: f32, text: &str) {
        let width = text.chars().count() as f32 * size * font.average_advance();
        self.text(font, size, (center_x - width / 2.0).max(30.0), y, text);
    }

    fn qr_code(&mut self, payload: &str, x: f32, y: f32, size: f32) -> Result<(), AppError> {
        let code = QrCode::new(payload.as_bytes())?;
        let width = code.width();
        let module = size / (width + 2 * QR_QUIET_ZONE) as f32;

        self.fill_color(WHITE);
        self.rect(x, y, size, size);
        self.op("f", vec![]);

        self.fill_color((0.0, 0.0, 0.0));
        for (index, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let column = (index % width + QR_QUIET_ZONE) as f32;
            let row = (index / width + QR_QUIET_ZONE) as f32;
            self.rect(
                x + column * module,
                y + size - (row + 1.0) * module,
                module,
                module,
            );
        }
        self.op("f", vec![]);

        Ok(())
    }
}

fn draw_certificate(canvas: &mut Canvas, certificate: &Certificate<'_>) -> Result<(), AppError> {
    let Certificate {
        diploma_id,
        student,
        course,
        school,
        date,
        verification_url,
    } = *certificate;
    let center = PAGE_WIDTH / 2.0;

    canvas.stroke_color(BORDER);
    canvas.op("w", vec![real(6.0)]);
    canvas.rect(20.0, 20.0, PAGE_WIDTH - 40.0, PAGE_HEIGHT - 40.0);
    canvas.op("S", vec![]);

    canvas.fill_color(ACCENT);
    canvas.centered_text(Font::Bold, 22.0, center, PAGE_HEIGHT - 90.0, &school.name);
    canvas.fill_color(BLACK);
    canvas.centered_text(
        Font::Regular,
        12.0,
        center,
        PAGE_HEIGHT - 110.0,
        &format!("CCT: {}", school.code),
    );
    if !school.shift.trim().is_empty() {
        canvas.centered_text(
            Font::Regular,
            11.0,
            center,
            PAGE_HEIGHT - 126.0,
            &format!("Turno: {}", school.shift),
        );
    }

    canvas.centered_text(Font::Bold, 34.0, center, PAGE_HEIGHT - 200.0, "DIPLOMA");

    let mut y = PAGE_HEIGHT - 250.0;
    canvas.centered_text(Font::Regular, 14.0, center, y, "Se otorga a");
    y -= 30.0;
    canvas.centered_text(Font::Bold, 20.0, center, y, &student.name);
    y -= 30.0;
    canvas.centered_text(
        Font::Regular,
        13.0,
        center,
        y,
        &format!(
            "por haber acreditado '{}' (Nivel {}) con {} horas.",
            course.name, course.level, course.hours
        ),
    );
    if !course.competencies.trim().is_empty() {
        y -= 25.0;
        canvas.centered_text(
            Font::Regular,
            11.0,
            center,
            y,
            &format!(
                "Competencias: {}",
                truncate(&course.competencies, COMPETENCIES_MAX_CHARS)
            ),
        );
    }
    y -= 25.0;
    canvas.centered_text(
        Font::Regular,
        13.0,
        center,
        y,
        &format!("Fecha de acreditación: {}", date),
    );

    let signature_y = 150.0;
    canvas.stroke_color(BLACK);
    canvas.op("w", vec![real(0.8)]);
    canvas.line((100.0, signature_y), (300.0, signature_y));
    canvas.line((PAGE_WIDTH - 300.0, signature_y), (PAGE_WIDTH - 100.0, signature_y));
    canvas.centered_text(
        Font::Regular,
        10.0,
        200.0,
        signature_y - 14.0,
        or_default(&school.director, "Director(a)"),
    );
    canvas.centered_text(
        Font::Regular,
        10.0,
        PAGE_WIDTH - 200.0,
        signature_y - 14.0,
        or_default(&school.coordinator, "Coordinador(a) de Computación"),
    );

    canvas.qr_code(verification_url, PAGE_WIDTH - 160.0, 60.0, QR_SIZE)?;
    canvas.fill_color(BLACK);
    canvas.text(Font::Regular, 8.0, PAGE_WIDTH - 160.0, 50.0, "Verificar");
    canvas.text(
        Font::Regular,
        8.0,
        40.0,
        40.0,
        &format!("Folio: {}", diploma_id),
    );

    Ok(())
}

fn assemble_document(content: Vec<u8>, title: &str) -> Result<Vec<u8>, AppError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => Object::Integer(1),
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(title)),
        "Producer" => Object::string_literal(env!("CARGO_PKG_NAME")),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| AppError::Rendering(format!("Failed to serialize PDF: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::{truncate, win_ansi};

    #[test]
    fn win_ansi_keeps_spanish_accents() {
        assert_eq!(win_ansi("Pérez"), vec![b'P', 0xE9, b'r', b'e', b'z']);
        assert_eq!(win_ansi("ñ✓"), vec![0xF1, b'?']);
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_needed() {
        assert_eq!(truncate("Paint", 120), "Paint");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
