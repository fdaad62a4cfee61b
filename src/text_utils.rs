//! Text cleanup helpers shared by the export paths.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_PARAGRAPH_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());
static RE_PDF_RESERVED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\?%*:|"<>]"#).unwrap());
static RE_EPUB_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s\-_]").unwrap());

/// Tabs become spaces, runs of blank lines collapse to a single paragraph
/// break, and the ends are trimmed.
pub fn normalize_whitespace(text: &str) -> String {
    let detabbed = text.replace('\t', " ");
    RE_PARAGRAPH_GAP
        .replace_all(&detabbed, "\n\n")
        .trim()
        .to_string()
}

/// Map the Turkish letters the base-14 fonts cannot draw to plain ASCII.
/// Every other character passes through untouched.
pub fn transliterate_turkish(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            'ğ' => 'g',
            'Ğ' => 'G',
            'ü' => 'u',
            'Ü' => 'U',
            'ş' => 's',
            'Ş' => 'S',
            'ı' => 'i',
            'İ' => 'I',
            'ö' => 'o',
            'Ö' => 'O',
            'ç' => 'c',
            'Ç' => 'C',
            'â' => 'a',
            'î' => 'i',
            other => other,
        })
        .collect()
}

/// Output name for a copied PDF range: path separators and shell-reserved
/// characters are removed.
pub fn sanitize_pdf_filename(name: &str) -> String {
    RE_PDF_RESERVED.replace_all(name, "").into_owned()
}

/// Output stem for a rendered EPUB chapter. Only ASCII letters, digits,
/// whitespace, `-` and `_` survive; an empty result becomes `chapter_<start>`.
pub fn sanitize_epub_filename(name: &str, start: u32) -> String {
    let kept = RE_EPUB_DISALLOWED.replace_all(name, "");
    let trimmed = kept.trim();
    if trimmed.is_empty() {
        format!("chapter_{start}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_gaps_collapse_to_one_blank_line() {
        let text = "\tOne\n\n\n\nTwo\n \n  \nThree\n\nFour  ";
        assert_eq!(normalize_whitespace(text), "One\n\nTwo\n\nThree\n\nFour");
    }

    #[test]
    fn turkish_letters_become_ascii() {
        assert_eq!(transliterate_turkish("Işığın Ötesi çâî"), "Isigin Otesi cai");
        assert_eq!(transliterate_turkish("café"), "café");
    }

    #[test]
    fn pdf_names_lose_reserved_characters() {
        assert_eq!(
            sanitize_pdf_filename(r#"a/b\c?d%e*f:g|h"i<j>k.pdf"#),
            "abcdefghijk.pdf"
        );
        assert_eq!(sanitize_pdf_filename("Part 1 - Intro.pdf"), "Part 1 - Intro.pdf");
    }

    #[test]
    fn epub_names_strip_diacritics_instead_of_transliterating() {
        assert_eq!(sanitize_epub_filename("bölüm/1", 4), "blm1");
        assert_eq!(sanitize_epub_filename("  Chapter_2 - End! ", 2), "Chapter_2 - End");
    }

    #[test]
    fn empty_epub_names_fall_back_to_chapter_index() {
        assert_eq!(sanitize_epub_filename("çğ?!", 7), "chapter_7");
        assert_eq!(sanitize_epub_filename("", 1), "chapter_1");
    }
}
