//! Input type detection.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Epub,
}

impl DocumentKind {
    /// Classify by declared media type first, then by file extension.
    pub fn sniff(file_name: &str, declared_mime: Option<&str>) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        match declared_mime.map(str::trim) {
            Some("application/pdf") => return Some(DocumentKind::Pdf),
            Some("application/epub+zip") => return Some(DocumentKind::Epub),
            _ => {}
        }
        if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if lower.ends_with(".epub") {
            Some(DocumentKind::Epub)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Epub => "epub",
        };
        write!(f, "{label}")
    }
}
