//! Plain-text chapter rendering into PDF.
//!
//! A chapter is a bold title block followed by word-wrapped body lines on an
//! A4 page in millimetre coordinates measured from the top-left corner. A new
//! page starts once the cursor passes the configured break line. Text is set in
//! the base-14 Times fonts with WinAnsi encoding, so no font files are needed.

use crate::config::LayoutConfig;
use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::debug;

const PT_PER_MM: f32 = 72.0 / 25.4;
const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";
/// Times-Bold runs slightly wider than the Roman metrics below.
const BOLD_WIDTH_FACTOR: f32 = 1.06;

/// Turns a chapter title and body into document bytes.
pub trait ChapterWriter {
    fn render(&self, title: &str, body: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct TextPdfWriter {
    layout: LayoutConfig,
}

impl TextPdfWriter {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    /// Lay out the chapter into per-page line lists without producing bytes.
    pub fn paginate(&self, title: &str, body: &str) -> Vec<Vec<PlacedLine>> {
        let layout = &self.layout;
        let width = layout.text_width_mm();
        let mut pages = vec![Vec::new()];
        let mut y = layout.margin_mm;

        let title_lines = wrap_text(title, width, layout.title_font_size * BOLD_WIDTH_FACTOR);
        for (idx, line) in title_lines.iter().enumerate() {
            pages[0].push(PlacedLine {
                text: line.clone(),
                y_mm: y + idx as f32 * layout.title_line_height_mm,
                bold: true,
            });
        }
        y += title_lines.len() as f32 * layout.title_line_height_mm + layout.title_gap_mm;

        for line in wrap_text(body, width, layout.body_font_size) {
            if y > layout.page_break_y_mm {
                pages.push(Vec::new());
                y = layout.margin_mm;
            }
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    text: line,
                    y_mm: y,
                    bold: false,
                });
            }
            y += layout.body_line_height_mm;
        }
        pages
    }

    fn build_document(&self, pages: &[Vec<PlacedLine>]) -> Result<Vec<u8>> {
        let layout = &self.layout;
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let regular = doc.add_object(font_dictionary("Times-Roman"));
        let bold = doc.add_object(font_dictionary("Times-Bold"));
        let resources = doc.add_object(dictionary! {
            "Font" => dictionary! {
                REGULAR_FONT => regular,
                BOLD_FONT => bold,
            },
        });

        let media_box = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(layout.page_width_mm * PT_PER_MM),
            Object::Real(layout.page_height_mm * PT_PER_MM),
        ];

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for lines in pages {
            let content = Content {
                operations: self.page_operations(lines),
            };
            let encoded = content
                .encode()
                .context("Failed to encode page content stream")?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => media_box.clone(),
                "Resources" => resources,
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
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .context("Failed to serialize chapter PDF")?;
        Ok(buffer)
    }

    fn page_operations(&self, lines: &[PlacedLine]) -> Vec<Operation> {
        let layout = &self.layout;
        let x = layout.margin_mm * PT_PER_MM;
        let mut ops = Vec::with_capacity(lines.len() * 4 + 2);
        ops.push(Operation::new("BT", vec![]));
        for line in lines {
            let (font, size) = if line.bold {
                (BOLD_FONT, layout.title_font_size)
            } else {
                (REGULAR_FONT, layout.body_font_size)
            };
            let y = (layout.page_height_mm - line.y_mm) * PT_PER_MM;
            ops.push(Operation::new("Tf", vec![font.into(), Object::Real(size)]));
            ops.push(Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }
}

impl ChapterWriter for TextPdfWriter {
    fn render(&self, title: &str, body: &str) -> Result<Vec<u8>> {
        let pages = self.paginate(title, body);
        debug!(pages = pages.len(), "Laid out chapter");
        self.build_document(&pages)
    }
}

/// One line of text at a vertical position on its page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub y_mm: f32,
    pub bold: bool,
}

fn font_dictionary(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Break `text` into lines no wider than `max_width_mm`. Explicit newlines are
/// kept (blank lines included); words wider than a line are split by
/// character.
pub fn wrap_text(text: &str, max_width_mm: f32, font_size: f32) -> Vec<String> {
    let space = text_width_mm(" ", font_size);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0.0;
        for word in paragraph.split(' ').filter(|word| !word.is_empty()) {
            let word_width = text_width_mm(word, font_size);
            if word_width > max_width_mm {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut pieces = split_long_word(word, max_width_mm, font_size);
                current = pieces.pop().unwrap_or_default();
                current_width = text_width_mm(&current, font_size);
                lines.extend(pieces);
                continue;
            }
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space + word_width <= max_width_mm {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
                current_width = word_width;
            }
        }
        lines.push(current);
    }
    lines
}

fn split_long_word(word: &str, max_width_mm: f32, font_size: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    for ch in word.chars() {
        let ch_width = char_width(ch) as f32 / 1000.0 * font_size / PT_PER_MM;
        if !current.is_empty() && width + ch_width > max_width_mm {
            pieces.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(ch);
        width += ch_width;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Width of `text` set at `font_size` points, in millimetres.
pub fn text_width_mm(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(char_width).sum();
    units as f32 / 1000.0 * font_size / PT_PER_MM
}

/// Times-Roman advance widths (1/1000 em) for printable ASCII.
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 333, 333, 333, 500, 564, 250, 333, 250, 278, // ' '..'/'
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // '0'..'?'
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // '@'..'O'
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 'P'..'_'
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // '`'..'o'
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 'p'..'~'
];

fn char_width(ch: char) -> u32 {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        u32::from(TIMES_ROMAN_WIDTHS[(code - 0x20) as usize])
    } else {
        500
    }
}

/// Encode for a WinAnsi base-14 font. Characters outside the encoding become
/// `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\u{20AC}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{00A0}' => b' ',
            c if (c as u32) < 0x20 => b' ',
            c if (0x20..0x7F).contains(&(c as u32)) || (0xA0..=0xFF).contains(&(c as u32)) => {
                c as u32 as u8
            }
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::PdfSource;

    fn writer() -> TextPdfWriter {
        TextPdfWriter::new(LayoutConfig::default())
    }

    #[test]
    fn wrapping_respects_width_and_keeps_blank_lines() {
        let text = "alpha beta gamma delta\n\nomega";
        let lines = wrap_text(text, text_width_mm("alpha beta gamma", 11.0) + 0.01, 11.0);
        assert_eq!(lines, vec!["alpha beta gamma", "delta", "", "omega"]);
    }

    #[test]
    fn overlong_words_are_split() {
        let word = "x".repeat(400);
        let lines = wrap_text(&word, 50.0, 11.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
        for line in &lines {
            assert!(text_width_mm(line, 11.0) <= 50.0 + 0.001);
        }
    }

    #[test]
    fn long_body_flows_onto_more_pages() {
        let body = vec!["A line of text."; 120].join("\n");
        let pages = writer().paginate("Title", &body);
        assert!(pages.len() >= 3);
        assert!(pages[0][0].bold);
        assert_eq!(pages[0][0].y_mm, 20.0);
        // body starts one title line plus the gap below the margin
        assert_eq!(pages[0][1].y_mm, 38.0);
        for page in &pages {
            for line in page {
                assert!(line.y_mm <= 280.0 + 6.0);
            }
        }
        assert_eq!(pages[1][0].y_mm, 20.0);
        let total: usize = pages.iter().map(|p| p.iter().filter(|l| !l.bold).count()).sum();
        assert_eq!(total, 120);
    }

    #[test]
    fn rendered_chapter_is_a_readable_pdf() {
        let body = vec!["Paragraph text."; 80].join("\n\n");
        let bytes = writer().render("Chapter One", &body).unwrap();
        let pdf = PdfSource::from_bytes(&bytes).unwrap();
        assert!(pdf.page_count() >= 2);
    }

    #[test]
    fn win_ansi_encoding_maps_latin1_and_quotes() {
        assert_eq!(encode_win_ansi("Aé’"), vec![b'A', 0xE9, 0x92]);
        assert_eq!(encode_win_ansi("ğ\t"), vec![b'?', b' ']);
    }
}
