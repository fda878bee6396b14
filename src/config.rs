//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration. The API token for
//! the sentiment classifier can be given inline, but is normally looked up in the process
//! environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::voice::EmotionMapping;
use crate::{Error, Result};

const DEFAULT_MODEL_ID: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";
const DEFAULT_ENDPOINT_BASE: &str = "https://router.huggingface.co/hf-inference/models/";

/// Top-level configuration of an [`EmpathyEngine`](crate::EmpathyEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory the audio files are written to. Created when the engine is constructed.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Also write the SSML document next to each audio file, as `<audio file name>.ssml`.
    #[serde(default)]
    pub write_ssml_sidecar: bool,
    /// Settings of the remote sentiment classifier.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Replacement voice profile table. The built-in table is used when absent.
    #[serde(default)]
    pub profiles: Option<EmotionMapping>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            write_ssml_sidecar: false,
            classifier: ClassifierConfig::default(),
            profiles: None,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|err| {
            Error::Configuration(format!("failed to parse {}: {}", path.display(), err))
        })
    }

    /// Returns the configured voice profile table, or the built-in one.
    pub fn mapping(&self) -> EmotionMapping {
        self.profiles.clone().unwrap_or_default()
    }
}

/// Settings of the Hugging Face inference classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model to query.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Full URL of the inference endpoint. Derived from the model ID when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// API token. When absent, the first non-empty variable in `token_env_vars` is used.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Environment variables that may hold the API token, in lookup order.
    #[serde(default = "default_token_env_vars")]
    pub token_env_vars: Vec<String>,
    /// Network timeout of a single classification request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            endpoint: None,
            token: None,
            token_env_vars: default_token_env_vars(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClassifierConfig {
    /// Returns the URL classification requests are posted to.
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("{}{}", DEFAULT_ENDPOINT_BASE, self.model_id))
    }

    /// Returns the network timeout of a single request.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the inline token, or the value of the first non-empty environment variable.
    pub fn resolve_token(&self) -> Option<String> {
        self.token.clone().filter(|token| !token.is_empty()).or_else(|| {
            self.token_env_vars
                .iter()
                .filter_map(|name| std::env::var(name).ok())
                .find(|value| !value.is_empty())
        })
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_token_env_vars() -> Vec<String> {
    vec!["HF_TOKEN".to_string(), "HUGGINGFACEHUB_API_TOKEN".to_string()]
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(PathBuf::from("outputs"), config.output_dir);
        assert!(!config.write_ssml_sidecar);
        assert_eq!(DEFAULT_MODEL_ID, config.classifier.model_id);
        assert_eq!(Duration::from_secs(10), config.classifier.timeout());
        assert!(config.profiles.is_none());
    }

    #[test]
    fn test_endpoint_derived_from_model() {
        let config = ClassifierConfig {
            model_id: "org/model".to_string(),
            ..Default::default()
        };
        assert_eq!("https://router.huggingface.co/hf-inference/models/org/model", config.endpoint());

        let config = ClassifierConfig {
            endpoint: Some("http://localhost:8080/classify".to_string()),
            ..Default::default()
        };
        assert_eq!("http://localhost:8080/classify", config.endpoint());
    }

    #[test]
    fn test_inline_token_wins() {
        let config = ClassifierConfig {
            token: Some("inline".to_string()),
            token_env_vars: vec!["EMPATHY_ENGINE_TEST_UNSET_TOKEN".to_string()],
            ..Default::default()
        };
        assert_eq!(Some("inline".to_string()), config.resolve_token());
    }

    #[test]
    fn test_missing_token() {
        let config = ClassifierConfig {
            token: Some(String::new()),
            token_env_vars: vec!["EMPATHY_ENGINE_TEST_UNSET_TOKEN".to_string()],
            ..Default::default()
        };
        assert_eq!(None, config.resolve_token());
    }
}
