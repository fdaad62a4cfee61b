use super::models::AppConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load the config at `path`, falling back to defaults when the file is
/// missing or does not parse.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str::<AppConfig>(contents).context("Failed to parse config TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let cfg = parse_config("").expect("empty config should parse");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.output.pdf_archive_name, "split_pdf.zip");
        assert_eq!(cfg.layout.text_width_mm(), 170.0);
    }

    #[test]
    fn partial_tables_keep_unset_defaults() {
        let cfg = parse_config(
            r#"
[logging]
log_level = "warn"

[layout]
margin_mm = 15.0
"#,
        )
        .expect("config should parse");
        assert_eq!(cfg.log_level, LogLevel::Warn);
        assert_eq!(cfg.layout.margin_mm, 15.0);
        assert_eq!(cfg.layout.body_font_size, 11.0);
        assert_eq!(cfg.output.epub_archive_name, "epub_chapters.zip");
    }

    #[test]
    fn serialized_config_round_trips() {
        let mut cfg = AppConfig::default();
        cfg.output.dir = "out".to_string();
        let text = toml::to_string(&cfg).expect("serialize");
        assert!(text.contains("[output]"));
        assert_eq!(parse_config(&text).expect("parse"), cfg);
    }

    #[test]
    fn unreadable_path_returns_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here/config.toml"));
        assert_eq!(cfg, AppConfig::default());
    }
}
