pub mod cli;
pub mod toml_config;

use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use self::toml_config::FileConfig;

pub const DEFAULT_BASE_URL: &str = "http://localhost:2024";
pub const DEFAULT_GRAPH: &str = "default";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "./transcripts";

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, clap::Parser)]
#[command(name = "condenser-view")]
#[command(about = "Follow a calendar condenser run as a live timeline")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub graph: Option<String>,

    /// Thread to run on; a new one is generated when omitted
    #[arg(long)]
    pub thread_id: Option<String>,

    #[arg(long)]
    pub api_token: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    /// JSON input for a new run
    #[arg(long)]
    pub input: Option<String>,

    /// Resume a thread that is already paused instead of starting a run
    #[arg(long)]
    pub resume: Option<String>,

    /// Answer every interrupt with this value instead of prompting
    #[arg(long)]
    pub auto_resume: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long, help = "Do not write transcript files")]
    pub no_transcript: bool,

    #[arg(short, long, help = "Only print the final summary")]
    pub quiet: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Fully resolved settings for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub base_url: String,
    pub graph_id: String,
    pub thread_id: String,
    pub timeout_seconds: u64,
    pub api_token: Option<String>,
    pub headers: Vec<(String, String)>,
    pub input: serde_json::Value,
    pub resume: Option<serde_json::Value>,
    pub auto_resume: Option<serde_json::Value>,
    pub output_dir: String,
    pub write_transcript: bool,
    pub quiet: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            graph_id: DEFAULT_GRAPH.to_string(),
            thread_id: uuid::Uuid::new_v4().to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            api_token: None,
            headers: Vec::new(),
            input: serde_json::json!({}),
            resume: None,
            auto_resume: None,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            write_transcript: true,
            quiet: false,
        }
    }
}

impl SessionConfig {
    /// Layer a configuration file under defaults.
    pub fn from_file_config(file: FileConfig) -> Self {
        let defaults = Self::default();
        Self {
            base_url: file.backend.base_url.unwrap_or(defaults.base_url),
            graph_id: file.backend.graph.unwrap_or(defaults.graph_id),
            thread_id: file.session.thread_id.unwrap_or(defaults.thread_id),
            timeout_seconds: file
                .backend
                .timeout_seconds
                .unwrap_or(defaults.timeout_seconds),
            api_token: file.backend.api_token,
            headers: file.backend.headers.unwrap_or_default().into_iter().collect(),
            input: file.session.input.unwrap_or(defaults.input),
            resume: None,
            auto_resume: file.session.auto_resume,
            output_dir: file.output.dir.unwrap_or(defaults.output_dir),
            write_transcript: file.output.transcript.unwrap_or(true),
            quiet: file.output.quiet.unwrap_or(false),
        }
    }

    /// Resolve command line flags on top of an optional file.
    #[cfg(feature = "cli")]
    pub fn resolve(cli: &CliConfig) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path);
                let file = FileConfig::from_file(path)?;
                file.validate()?;
                file
            }
            None => FileConfig::default(),
        };

        let mut config = Self::from_file_config(file);
        if let Some(base_url) = &cli.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(graph) = &cli.graph {
            config.graph_id = graph.clone();
        }
        if let Some(thread_id) = &cli.thread_id {
            config.thread_id = thread_id.clone();
        }
        if let Some(token) = &cli.api_token {
            config.api_token = Some(token.clone());
        }
        if let Some(timeout) = cli.timeout_seconds {
            config.timeout_seconds = timeout;
        }
        if let Some(input) = &cli.input {
            config.input = validation::validate_json("input", input)?;
        }
        config.resume = cli.resume.as_deref().map(reply_value);
        if let Some(reply) = &cli.auto_resume {
            config.auto_resume = Some(reply_value(reply));
        }
        if let Some(dir) = &cli.output_dir {
            config.output_dir = dir.clone();
        }
        if cli.no_transcript {
            config.write_transcript = false;
        }
        config.quiet |= cli.quiet;

        config.validate()?;
        Ok(config)
    }
}

/// Human replies are JSON when they parse as JSON and plain strings otherwise.
pub fn reply_value(raw: &str) -> serde_json::Value {
    let raw = raw.trim();
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("base_url", &self.base_url)?;
        validation::validate_path_segment("graph", &self.graph_id)?;
        validation::validate_path_segment("thread_id", &self.thread_id)?;
        validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 3600)?;
        if self.write_transcript {
            validation::validate_path("output_dir", &self.output_dir)?;
        }
        Ok(())
    }
}

impl ConfigProvider for SessionConfig {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn graph_id(&self) -> &str {
        &self.graph_id
    }

    fn thread_id(&self) -> &str {
        &self.thread_id
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
