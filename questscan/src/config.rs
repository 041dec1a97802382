use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for a scan run.
///
/// # Configuration Locations
///
/// Files are layered in this order, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/questscan/config.yaml`
/// 2. Local `.questscan.yaml` in the current directory
/// 3. Custom config file given with `--config` (must exist)
///
/// Command-line arguments are applied on top with [`ScanConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// # File or folder holding the samples
/// root_path: "/data/samples"
///
/// # Parallel scanners
/// jobs: 4
///
/// # Paths to skip (glob syntax)
/// ignore_patterns:
///   - "**/quarantine/**"
///
/// # text, json or yaml
/// format: "json"
///
/// show_progress: false
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File or folder to analyse
    #[serde(default)]
    pub root_path: Option<PathBuf>,

    /// Number of parallel scanners; one means everything runs on the
    /// calling thread
    #[serde(default = "default_jobs")]
    pub jobs: NonZeroUsize,

    /// Patterns to ignore (glob syntax), applied after the size filter
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Report format
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default = "default_show_progress")]
    pub show_progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_jobs() -> NonZeroUsize {
    NonZeroUsize::MIN
}

fn default_show_progress() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root_path: None,
            jobs: default_jobs(),
            ignore_patterns: Vec::new(),
            format: OutputFormat::default(),
            show_progress: default_show_progress(),
            log_level: default_log_level(),
        }
    }
}

/// How the report is written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `__text map` / `__cstring map` listings
    #[default]
    Text,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

impl ScanConfig {
    /// Loads configuration from the default locations plus an explicit file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("questscan/config.yaml")),
            Some(PathBuf::from(".questscan.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values.
    ///
    /// A CLI value wins whenever it differs from its default.
    pub fn merge_with_cli(mut self, cli_config: ScanConfig) -> Self {
        if cli_config.root_path.is_some() {
            self.root_path = cli_config.root_path;
        }
        if cli_config.jobs != default_jobs() {
            self.jobs = cli_config.jobs;
        }
        if !cli_config.ignore_patterns.is_empty() {
            self.ignore_patterns = cli_config.ignore_patterns;
        }
        if cli_config.format != OutputFormat::default() {
            self.format = cli_config.format;
        }
        if !cli_config.show_progress {
            self.show_progress = false;
        }
        if cli_config.log_level != default_log_level() {
            self.log_level = cli_config.log_level;
        }
        self
    }
}
