use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::colors::{ColorSource, PaletteColors, RandomColors};
use crate::export::EXPORT_FILE_NAME;

/// Longest refresh interval the builder accepts.
pub const MAX_INTERVAL_SECONDS: u64 = 24 * 60 * 60;

/// How colors are picked for types that have none yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    #[default]
    Random,
    Category10,
    Tableau10,
}

/// Deployment settings, read from `config.json` next to the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Path segment the app is served under.
    #[serde(alias = "APP_NAME")]
    pub app_name: String,
    #[serde(alias = "APP_ICON")]
    pub app_icon: String,
    pub default_interval_seconds: u64,
    pub color_scheme: ColorScheme,
    /// Makes `Random` reproducible.
    pub color_seed: Option<u64>,
    pub export_file_name: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_icon: String::new(),
            default_interval_seconds: 0,
            color_scheme: ColorScheme::Random,
            color_seed: None,
            export_file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("default interval {0}s is out of range")]
    Interval(u64),
}

impl DashboardConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Like [`DashboardConfig::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(ConfigError::Interval(self.default_interval_seconds));
        }
        Ok(())
    }

    /// Root the dashboard route hangs off, e.g. `https://host/app`.
    pub fn base_url(&self, origin: &str) -> String {
        let origin = origin.trim_end_matches('/');
        let app = self.app_name.trim_matches('/');
        if app.is_empty() {
            origin.to_string()
        } else {
            format!("{origin}/{app}")
        }
    }

    pub fn color_source(&self) -> Box<dyn ColorSource> {
        match (self.color_scheme, self.color_seed) {
            (ColorScheme::Random, Some(seed)) => {
                Box::new(RandomColors::seeded(seed))
            }
            (ColorScheme::Random, None) => Box::new(RandomColors::new()),
            (ColorScheme::Category10, _) => {
                Box::new(PaletteColors::category10())
            }
            (ColorScheme::Tableau10, _) => Box::new(PaletteColors::tableau10()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_uppercase_keys() {
        let config = DashboardConfig::from_json(
            r#"{ "APP_NAME": "geo", "APP_ICON": "logo.png" }"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "geo");
        assert_eq!(config.app_icon, "logo.png");
        assert_eq!(config.export_file_name, "exported_filtered_data.json");
        assert_eq!(config.color_scheme, ColorScheme::Random);
    }

    #[test]
    fn test_rejects_bad_interval() {
        let err = DashboardConfig::from_json(
            r#"{ "default_interval_seconds": 999999 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Interval(999999)));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = DashboardConfig::load_or_default(Path::new(
            "/nonexistent/geodash/config.json",
        ))
        .unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_base_url() {
        let mut config = DashboardConfig::default();
        assert_eq!(config.base_url("https://h/"), "https://h");
        config.app_name = "/geo/".into();
        assert_eq!(config.base_url("https://h"), "https://h/geo");
    }

    #[test]
    fn test_seeded_color_source() {
        let config = DashboardConfig {
            color_seed: Some(3),
            ..DashboardConfig::default()
        };
        assert_eq!(
            config.color_source().next_color(),
            config.color_source().next_color()
        );

        let palette = DashboardConfig {
            color_scheme: ColorScheme::Category10,
            ..DashboardConfig::default()
        };
        assert_eq!(palette.color_source().next_color(), "#1f77b4");
    }
}
