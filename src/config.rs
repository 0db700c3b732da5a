use crate::rubric::RubricKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the judge model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JudgeConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Model used to grade answers
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature for the judge; the backend default applies when unset
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Rubric the answers are graded against
    #[serde(default)]
    pub rubric: RubricKind,
}

/// Settings for generating answers to cases that do not provide one
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider name, only "gemini" is supported
    pub provider: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

/// A question to evaluate, with an optional ready-made answer
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaseConfig {
    pub question: String,
    /// Generated with the generation settings when missing
    #[serde(default)]
    pub answer: Option<String>,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_api_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_env_var_api_key() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_log_path() -> String {
    "evaluations.csv".to_string()
}

/// Root configuration of a run file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub judge: JudgeConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// CSV file evaluations are appended to
    #[serde(default = "default_log_path")]
    pub log_path: String,
    /// Cases evaluated in order
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
log_path = "/tmp/evals.csv"

[judge]
api_endpoint = "http://localhost:8080/v1"
env_var_api_key = "JUDGE_API_KEY"
model = "gemini-2.5-pro"
temperature = 0.2
rubric = "simple"

[generation]
model = "gemini-2.0-flash"
temperature = 0.9

[[cases]]
question = "What is 2+2?"
answer = "4"

[[cases]]
question = "Why is the sky blue?"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.log_path, "/tmp/evals.csv");
        assert_eq!(config.judge.api_endpoint, "http://localhost:8080/v1");
        assert_eq!(config.judge.env_var_api_key, "JUDGE_API_KEY");
        assert_eq!(config.judge.model, "gemini-2.5-pro");
        assert_eq!(config.judge.temperature, Some(0.2));
        assert_eq!(config.judge.rubric, RubricKind::Simple);
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.generation.model, "gemini-2.0-flash");
        assert_eq!(config.generation.temperature, 0.9);
        assert_eq!(config.cases.len(), 2);
        assert_eq!(config.cases[0].answer.as_deref(), Some("4"));
        assert!(config.cases[1].answer.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let toml_content = r#"
[judge]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.log_path, "evaluations.csv");
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.judge.env_var_api_key, "GEMINI_API_KEY");
        assert_eq!(config.judge.model, "gemini-2.5-flash");
        assert_eq!(config.judge.temperature, None);
        assert_eq!(config.judge.rubric, RubricKind::MultiDimension);
        assert_eq!(config.generation.temperature, 0.7);
        assert!(config.cases.is_empty());
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/run.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_unknown_rubric() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "[judge]\nrubric = \"holistic\"\n").unwrap();

        let result = Config::from_file(temp_file.path());
        assert!(result.unwrap_err().to_string().contains("Failed to parse TOML config"));
    }
}
