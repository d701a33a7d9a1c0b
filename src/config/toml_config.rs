use crate::utils::error::{Result, ToolkitError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "lms-toolkit.toml";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitConfig {
    pub toolkit: ToolkitInfo,
    pub store: StoreConfig,
    pub report: ReportConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "rest" for the remote record API, "memory" for the seeded local store.
    pub r#type: String,
    pub endpoint: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    /// Archive name; a `{timestamp}` placeholder is filled at write time.
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub system_stats: Option<bool>,
}

impl ToolkitConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ToolkitError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ToolkitError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Loads the named file, or `lms-toolkit.toml` from the working
    /// directory, or built-in defaults (memory store, text report) when
    /// neither exists.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    Self::from_file(DEFAULT_CONFIG_FILE)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Replaces `${VAR_NAME}` references with environment values, leaving
    /// unknown references in place.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        match self.store.r#type.as_str() {
            "rest" => {
                let endpoint =
                    validation::validate_required_field("store.endpoint", &self.store.endpoint)?;
                validation::validate_url("store.endpoint", endpoint)?;
            }
            "memory" => {}
            other => {
                return Err(ToolkitError::InvalidConfigValueError {
                    field: "store.type".to_string(),
                    value: other.to_string(),
                    reason: "Supported store types: rest, memory".to_string(),
                })
            }
        }

        if let Some(timeout) = self.store.timeout_seconds {
            validation::validate_positive_number("store.timeout_seconds", timeout as usize, 1)?;
        }

        validation::validate_path("report.output_path", &self.report.output_path)?;

        let valid_formats = ["text", "csv", "json"];
        for format in &self.report.output_formats {
            if !valid_formats.contains(&format.as_str()) {
                return Err(ToolkitError::InvalidConfigValueError {
                    field: "report.output_formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        valid_formats.join(", ")
                    ),
                });
            }
        }

        Ok(())
    }

    pub fn store_kind(&self) -> &str {
        &self.store.r#type
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn output_path(&self) -> &str {
        &self.report.output_path
    }

    pub fn output_formats(&self) -> &[String] {
        &self.report.output_formats
    }

    pub fn compression(&self) -> Option<&CompressionConfig> {
        self.report
            .compression
            .as_ref()
            .filter(|compression| compression.enabled)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn system_stats_enabled(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.system_stats)
            .unwrap_or(false)
    }
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            toolkit: ToolkitInfo {
                name: "lms-toolkit".to_string(),
                description: "LMS group import and token tooling".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            store: StoreConfig {
                r#type: "memory".to_string(),
                endpoint: None,
                auth_token: None,
                timeout_seconds: None,
                seed_file: None,
            },
            report: ReportConfig {
                output_path: "./reports".to_string(),
                output_formats: vec!["text".to_string()],
                compression: None,
            },
            monitoring: None,
        }
    }
}

impl Validate for ToolkitConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
