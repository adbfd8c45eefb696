use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::{SessionSettings, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const MIN_REQUEST_TIMEOUT_S: f64 = 15.0;
const MAX_REQUEST_TIMEOUT_S: f64 = 300.0;

/// Keys accepted in `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub enhance_prompts: Option<bool>,
    pub request_timeout_s: Option<f64>,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub enhance_prompts: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub request_timeout_s: f64,
    pub settings: SessionSettings,
}

impl StudioConfig {
    /// Precedence: overrides, then environment, then file, then defaults.
    pub fn resolve<F>(file: FileConfig, overrides: ConfigOverrides, env_lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| {
            env_lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = non_empty(overrides.api_key)
            .or_else(|| env_value("GEMINI_API_KEY"))
            .or_else(|| env_value("GOOGLE_API_KEY"))
            .or_else(|| non_empty(file.api_key));
        let api_base = env_value("GEMINI_API_BASE")
            .or_else(|| non_empty(file.api_base))
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let request_timeout_s = file
            .request_timeout_s
            .filter(|value| value.is_finite())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);

        let settings = SessionSettings {
            text_model: non_empty(overrides.text_model)
                .or_else(|| non_empty(file.text_model))
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: non_empty(overrides.image_model)
                .or_else(|| non_empty(file.image_model))
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            enhance_prompts: overrides.enhance_prompts || file.enhance_prompts.unwrap_or(false),
        };

        Self {
            api_key,
            api_base,
            request_timeout_s,
            settings,
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lumen").join("config.toml"))
}

/// Reads `path`. A missing file is only an error when the user named it.
pub fn load_file_config(path: &Path, explicit: bool) -> Result<FileConfig> {
    if !path.exists() && !explicit {
        return Ok(FileConfig::default());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading config {}", path.display()))?;
    parse_file_config(&raw).with_context(|| format!("invalid config {}", path.display()))
}

pub fn parse_file_config(raw: &str) -> Result<FileConfig> {
    Ok(toml::from_str(raw)?)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_any_source() {
        let config = StudioConfig::resolve(
            FileConfig::default(),
            ConfigOverrides::default(),
            env_from(&[]),
        );
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout_s, DEFAULT_REQUEST_TIMEOUT_S);
        assert_eq!(config.settings, SessionSettings::default());
    }

    #[test]
    fn api_key_precedence_is_flag_env_file() {
        let file = FileConfig {
            api_key: Some("from-file".to_string()),
            ..FileConfig::default()
        };
        let env = env_from(&[("GOOGLE_API_KEY", "from-google-env")]);
        let config = StudioConfig::resolve(file.clone(), ConfigOverrides::default(), &env);
        assert_eq!(config.api_key.as_deref(), Some("from-google-env"));

        let env = env_from(&[
            ("GOOGLE_API_KEY", "from-google-env"),
            ("GEMINI_API_KEY", "from-gemini-env"),
        ]);
        let config = StudioConfig::resolve(file.clone(), ConfigOverrides::default(), &env);
        assert_eq!(config.api_key.as_deref(), Some("from-gemini-env"));

        let overrides = ConfigOverrides {
            api_key: Some("from-flag".to_string()),
            ..ConfigOverrides::default()
        };
        let config = StudioConfig::resolve(file.clone(), overrides, &env);
        assert_eq!(config.api_key.as_deref(), Some("from-flag"));

        let config = StudioConfig::resolve(file, ConfigOverrides::default(), env_from(&[]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn parse_file_config_reads_all_keys_and_clamps_timeout() -> Result<()> {
        let file = parse_file_config(
            r#"
api_key = "k"
api_base = "https://example.test/v1beta/"
text_model = "gemini-2.0-flash"
image_model = "gemini-3-pro-image-preview"
enhance_prompts = true
request_timeout_s = 900.0
"#,
        )?;
        let config = StudioConfig::resolve(file, ConfigOverrides::default(), env_from(&[]));
        assert_eq!(config.api_base, "https://example.test/v1beta");
        assert_eq!(config.settings.text_model, "gemini-2.0-flash");
        assert_eq!(config.settings.image_model, "gemini-3-pro-image-preview");
        assert!(config.settings.enhance_prompts);
        assert_eq!(config.request_timeout_s, 300.0);
        Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_file_config("colour = \"red\"").is_err());
    }

    #[test]
    fn missing_file_is_fine_unless_explicit() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        assert_eq!(load_file_config(&path, false)?, FileConfig::default());
        assert!(load_file_config(&path, true).is_err());

        fs::write(&path, "enhance_prompts = true\n")?;
        assert_eq!(load_file_config(&path, true)?.enhance_prompts, Some(true));
        Ok(())
    }
}
