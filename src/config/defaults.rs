use crate::config::LogLevel;

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}

pub(crate) fn default_output_dir() -> String {
    ".".to_string()
}

pub(crate) fn default_pdf_archive_name() -> String {
    "split_pdf.zip".to_string()
}

pub(crate) fn default_epub_archive_name() -> String {
    "epub_chapters.zip".to_string()
}

pub(crate) fn default_page_width_mm() -> f32 {
    210.0
}

pub(crate) fn default_page_height_mm() -> f32 {
    297.0
}

pub(crate) fn default_margin_mm() -> f32 {
    20.0
}

pub(crate) fn default_title_font_size() -> f32 {
    16.0
}

pub(crate) fn default_body_font_size() -> f32 {
    11.0
}

pub(crate) fn default_title_line_height_mm() -> f32 {
    8.0
}

pub(crate) fn default_title_gap_mm() -> f32 {
    10.0
}

pub(crate) fn default_body_line_height_mm() -> f32 {
    6.0
}

pub(crate) fn default_page_break_y_mm() -> f32 {
    280.0
}
