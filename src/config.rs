use crate::error::{BridgeError, Result};
use crate::translate::types::ReasoningEffort;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_API_KEY: &str = "lm-studio";
pub const BASE_URL_ENV: &str = "LMSTUDIO_API_BASE_URL";
pub const DEBUG_ENV: &str = "DEBUG_LMSTUDIO";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Verbose payload logging. `DEBUG_LMSTUDIO` turns it on as well.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api: ApiMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Which upstream protocol chat-completions requests are sent with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Forward chat-completions as-is (tool-schema fix only).
    #[default]
    Chat,
    /// Translate to the responses protocol and back.
    Responses,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => f.write_str("chat"),
            Self::Responses => f.write_str("responses"),
        }
    }
}

fn default_port() -> u16 {
    4321
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            debug: false,
            provider: ProviderConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Base URL of the upstream server: config value, then `LMSTUDIO_API_BASE_URL`,
    /// then the LM Studio default.
    pub fn effective_base_url(&self) -> Result<String> {
        resolve_base_url(
            self.provider.base_url.as_deref(),
            std::env::var(BASE_URL_ENV).ok().as_deref(),
        )
    }

    /// API key sent as a bearer token. LM Studio ignores it, but other servers may not.
    pub fn resolve_api_key(&self) -> String {
        self.provider
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
            .or_else(|| self.provider.api_key.clone())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string())
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug || std::env::var(DEBUG_ENV).is_ok_and(|v| !v.is_empty())
    }

    /// Settings that are accepted but have no effect.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.provider.reasoning_effort.is_some() && self.provider.api != ApiMode::Responses {
            warnings.push(
                "reasoning_effort is only supported with api = \"responses\"; it will be ignored"
                    .to_string(),
            );
        }
        warnings
    }
}

fn resolve_base_url(configured: Option<&str>, from_env: Option<&str>) -> Result<String> {
    let raw = configured
        .or(from_env.filter(|v| !v.is_empty()))
        .unwrap_or(DEFAULT_BASE_URL);

    let url = reqwest::Url::parse(raw)
        .map_err(|e| BridgeError::config(format!("Invalid base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BridgeError::config(format!(
            "Base URL '{raw}' must use http or https"
        )));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("lmstudio-bridge.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("lmstudio-bridge")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("lmstudio-bridge").join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join("lmstudio-bridge").join("config.toml"));
        }
    }

    if let Some(home) = dirs_path() {
        paths.push(home.join(".lmstudio-bridge.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000

[provider]
base_url = "http://10.0.0.5:1234/v1"
api = "responses"
reasoning_effort = "high"

[provider.headers]
x-team = "research"
"#
        )
        .unwrap();

        let config = BridgeConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.provider.api, ApiMode::Responses);
        assert_eq!(config.provider.reasoning_effort, Some(ReasoningEffort::High));
        assert_eq!(
            config.provider.headers.get("x-team"),
            Some(&"research".to_string())
        );
        assert_eq!(config.effective_base_url().unwrap(), "http://10.0.0.5:1234/v1");
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = BridgeConfig::load(f.path()).unwrap();

        assert_eq!(config.port, 4321);
        assert_eq!(config.provider.api, ApiMode::Chat);
        assert!(config.provider.reasoning_effort.is_none());
    }

    #[test]
    fn test_base_url_precedence() {
        assert_eq!(
            resolve_base_url(None, None).unwrap(),
            "http://localhost:1234/v1"
        );
        assert_eq!(
            resolve_base_url(None, Some("http://gpu-box:1234/v1/")).unwrap(),
            "http://gpu-box:1234/v1"
        );
        assert_eq!(
            resolve_base_url(Some("https://example.com/v1"), Some("http://gpu-box:1234/v1"))
                .unwrap(),
            "https://example.com/v1"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(resolve_base_url(Some("not a url"), None).is_err());
        assert!(resolve_base_url(Some("ftp://host/v1"), None).is_err());
    }

    #[test]
    fn test_api_key_defaults() {
        let mut config = BridgeConfig::default();
        assert_eq!(config.resolve_api_key(), "lm-studio");

        config.provider.api_key = Some("sk-local".to_string());
        config.provider.api_key_env = Some("LMSTUDIO_BRIDGE_TEST_UNSET_KEY".to_string());
        assert_eq!(config.resolve_api_key(), "sk-local");
    }

    #[test]
    fn test_reasoning_effort_without_responses_warns() {
        let mut config = BridgeConfig::default();
        config.provider.reasoning_effort = Some(ReasoningEffort::Low);

        let warnings = config.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("reasoning_effort"));

        config.provider.api = ApiMode::Responses;
        assert!(config.warnings().is_empty());
    }
}
