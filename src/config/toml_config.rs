use crate::utils::error::{CondenserError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    pub graph: Option<String>,
    pub api_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    pub thread_id: Option<String>,
    pub input: Option<serde_json::Value>,
    pub auto_resume: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub transcript: Option<bool>,
    pub quiet: Option<bool>,
}

impl FileConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content)
            .map_err(|e| CondenserError::config(format!("TOML parsing error: {}", e)))
    }
}

/// 替換環境變數 (例如 ${CONDENSER_TOKEN})，找不到的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| CondenserError::config(format!("Invalid substitution pattern: {}", e)))?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

impl Validate for FileConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.backend.base_url {
            validation::validate_url("backend.base_url", url)?;
        }
        if let Some(graph) = &self.backend.graph {
            validation::validate_path_segment("backend.graph", graph)?;
        }
        if let Some(timeout) = self.backend.timeout_seconds {
            validation::validate_range("backend.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(thread_id) = &self.session.thread_id {
            validation::validate_path_segment("session.thread_id", thread_id)?;
        }
        if let Some(dir) = &self.output.dir {
            validation::validate_path("output.dir", dir)?;
        }
        Ok(())
    }
}
