use serde::{Deserialize, Serialize};

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "super::tables::ConfigTables", into = "super::tables::ConfigTables")]
pub struct AppConfig {
    pub log_level: LogLevel,
    pub output: OutputConfig,
    pub layout: LayoutConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            output: OutputConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Where the finished archive lands and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "crate::config::defaults::default_output_dir")]
    pub dir: String,
    #[serde(default = "crate::config::defaults::default_pdf_archive_name")]
    pub pdf_archive_name: String,
    #[serde(default = "crate::config::defaults::default_epub_archive_name")]
    pub epub_archive_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: crate::config::defaults::default_output_dir(),
            pdf_archive_name: crate::config::defaults::default_pdf_archive_name(),
            epub_archive_name: crate::config::defaults::default_epub_archive_name(),
        }
    }
}

/// Page geometry for chapters rendered from EPUB text. Lengths are millimetres,
/// font sizes are points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LayoutConfig {
    #[serde(default = "crate::config::defaults::default_page_width_mm")]
    pub page_width_mm: f32,
    #[serde(default = "crate::config::defaults::default_page_height_mm")]
    pub page_height_mm: f32,
    #[serde(default = "crate::config::defaults::default_margin_mm")]
    pub margin_mm: f32,
    #[serde(default = "crate::config::defaults::default_title_font_size")]
    pub title_font_size: f32,
    #[serde(default = "crate::config::defaults::default_body_font_size")]
    pub body_font_size: f32,
    #[serde(default = "crate::config::defaults::default_title_line_height_mm")]
    pub title_line_height_mm: f32,
    #[serde(default = "crate::config::defaults::default_title_gap_mm")]
    pub title_gap_mm: f32,
    #[serde(default = "crate::config::defaults::default_body_line_height_mm")]
    pub body_line_height_mm: f32,
    #[serde(default = "crate::config::defaults::default_page_break_y_mm")]
    pub page_break_y_mm: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            page_width_mm: crate::config::defaults::default_page_width_mm(),
            page_height_mm: crate::config::defaults::default_page_height_mm(),
            margin_mm: crate::config::defaults::default_margin_mm(),
            title_font_size: crate::config::defaults::default_title_font_size(),
            body_font_size: crate::config::defaults::default_body_font_size(),
            title_line_height_mm: crate::config::defaults::default_title_line_height_mm(),
            title_gap_mm: crate::config::defaults::default_title_gap_mm(),
            body_line_height_mm: crate::config::defaults::default_body_line_height_mm(),
            page_break_y_mm: crate::config::defaults::default_page_break_y_mm(),
        }
    }
}

impl LayoutConfig {
    /// Width available to a wrapped line.
    pub fn text_width_mm(&self) -> f32 {
        (self.page_width_mm - 2.0 * self.margin_mm).max(1.0)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
