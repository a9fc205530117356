//! Global configuration model for composition and synthesis.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyweaveError};

/// Serialization format of synthesized templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl OutputFormat {
    /// File extension used for templates in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = SkyweaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(SkyweaveError::Config {
                message: format!("unknown output format: {other}"),
            }),
        }
    }
}

/// Root configuration for a Skyweave composition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyweaveConfig {
    /// Directory synthesized templates are written to.
    pub output_dir: PathBuf,
    /// Template serialization format.
    pub format: OutputFormat,
    /// Reject configuration fields a resource kind does not declare.
    pub strict_schema: bool,
    /// Deployment stage name used by API stacks.
    pub stage_name: String,
}

impl Default for SkyweaveConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(crate::constants::DEFAULT_OUTPUT_DIR),
            format: OutputFormat::default(),
            strict_schema: true,
            stage_name: crate::constants::DEFAULT_STAGE_NAME.to_string(),
        }
    }
}

impl SkyweaveConfig {
    /// Loads a configuration from a YAML file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SkyweaveError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_yaml::from_str(&content)?;
        if config.stage_name.is_empty() {
            return Err(SkyweaveError::Config {
                message: "stage_name must not be empty".into(),
            });
        }
        Ok(config)
    }
}
