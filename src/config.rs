// src/config.rs

use std::path::Path;
use std::{fs, io};

use serde::Deserialize;

/// Crate configuration, loaded from a TOML file. Every field has a
/// default so a missing section (or a missing file, via
/// [`Config::load_or_default`]) still yields a usable configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub storage: StorageSection,
    /// Directory of prompt template overrides; the shipped templates are
    /// used when unset.
    #[serde(default)]
    pub prompt_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrSection {
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_ocr_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Staging directory for the upload-based OCR path.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_ocr_endpoint() -> String {
    "http://localhost:8020".to_string()
}

fn default_ocr_api_key_env() -> String {
    "OCR_API_KEY".to_string()
}

fn default_staging_dir() -> String {
    "staging".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OcrSection {
    fn default() -> Self {
        OcrSection {
            endpoint: default_ocr_endpoint(),
            api_key_env: default_ocr_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        StorageSection {
            staging_dir: default_staging_dir(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config file if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_for_missing_sections() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.llm.default_model, "gpt-3.5-turbo");
        assert_eq!(cfg.ocr.api_key_env, "OCR_API_KEY");
        assert_eq!(cfg.storage.staging_dir, "staging");
        assert_eq!(cfg.prompt_dir, None);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            default_model = "gpt-4-turbo"

            [storage]
            staging_dir = "/tmp/receipts"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.default_model, "gpt-4-turbo");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.storage.staging_dir, "/tmp/receipts");
    }
}
