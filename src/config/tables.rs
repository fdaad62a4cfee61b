use super::defaults;
use super::models::{AppConfig, LayoutConfig, LogLevel, OutputConfig};
use serde::Deserialize;

/// On-disk shape of `config.toml`: one table per concern.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    layout: LayoutConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            output: tables.output,
            layout: tables.layout,
        }
    }
}

impl From<AppConfig> for ConfigTables {
    fn from(config: AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            output: config.output,
            layout: config.layout,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
