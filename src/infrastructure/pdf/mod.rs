// ============================================================
// PDF RENDERING
// ============================================================
// One single-column A4 document per normalized row

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::domain::error::{AppError, Result};
use crate::domain::table::Record;

/// Turns one normalized row into a document.
pub trait RowRenderer: Send + Sync {
    fn render(&self, headers: &[String], record: &Record, title: &str) -> Result<Vec<u8>>;

    /// File extension of the produced artifacts, without the dot.
    fn extension(&self) -> &'static str;
}

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: f32 = 40.0;
const TOP_Y: f32 = 785.0;
const BOTTOM_Y: f32 = 60.0;
const WRAP_COLUMNS: usize = 95;

const TITLE_SIZE: f32 = 16.0;
const LABEL_SIZE: f32 = 10.0;
const VALUE_SIZE: f32 = 11.0;
const LINE_HEIGHT: f32 = 15.0;

/// Plain lopdf renderer using the standard Helvetica fonts.
#[derive(Debug, Default, Clone)]
pub struct LopdfRenderer;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl RowRenderer for LopdfRenderer {
    fn render(&self, headers: &[String], record: &Record, title: &str) -> Result<Vec<u8>> {
        let mut layout = PageLayout::new();
        layout.line("F2", TITLE_SIZE, 0.0, title);
        layout.gap(LINE_HEIGHT * 0.5);

        for header in headers {
            let value = record.get(header).map(|v| v.trim()).unwrap_or("");
            if value.is_empty() {
                continue;
            }
            layout.ensure_room(LINE_HEIGHT * 2.0);
            layout.line("F2", LABEL_SIZE, 0.35, header);
            for wrapped in wrap_text(&normalize_text(value), WRAP_COLUMNS) {
                layout.line("F1", VALUE_SIZE, 0.0, &wrapped);
            }
            layout.gap(LINE_HEIGHT * 0.4);
        }

        layout.finish()
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

/// Accumulates text operations and breaks pages at the bottom margin.
struct PageLayout {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: f32,
}

impl PageLayout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: TOP_Y,
        }
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < BOTTOM_Y {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.y = TOP_Y;
    }

    fn gap(&mut self, amount: f32) {
        self.y -= amount;
    }

    fn line(&mut self, font: &str, size: f32, grey: f32, text: &str) {
        self.ensure_room(LINE_HEIGHT);
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("g", vec![grey.into()]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![MARGIN_LEFT.into(), self.y.into()]),
            Operation::new("Tj", vec![Object::String(encode_latin1(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
        self.y -= LINE_HEIGHT;
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.break_page();
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let regular_id = doc.add_object(font_dictionary("Helvetica"));
        let bold_id = doc.add_object(font_dictionary("Helvetica-Bold"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| AppError::RenderError(format!("Failed to encode page: {}", e)))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| AppError::RenderError(format!("Failed to write PDF: {}", e)))?;
        Ok(bytes)
    }
}

fn font_dictionary(base_font: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Replace typographic punctuation the standard fonts handle poorly.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Latin-1 bytes for a PDF literal string; anything wider becomes `?`.
fn encode_latin1(text: &str) -> Vec<u8> {
    normalize_text(text)
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| if (c as u32) < 0x100 { c as u8 } else { b'?' })
        .collect()
}

/// Greedy word wrap on character count; explicit newlines are kept.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            // hard-split words longer than a line
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
            }
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}
