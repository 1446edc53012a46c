use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "models/gemini-1.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Client-side timeout for the upstream call. Unset means no timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    8787
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            timeout_secs: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config(format!("Failed to read config file {}: {}", path.display(), e))
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

        for candidate in &config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read the API key from the configured environment variable.
    /// An unset or empty variable counts as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.upstream.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    /// `generateContent` endpoint for `model`, without the key.
    pub fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent",
            self.upstream.base_url.trim_end_matches('/'),
            model
        )
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("gemini-relay.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("gemini-relay").join("config.toml"));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("gemini-relay").join("config.toml"));
        paths.push(home.join(".gemini-relay.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
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

[upstream]
api_key_env = "MY_GEMINI_KEY"
default_model = "models/gemini-1.5-pro"
timeout_secs = 30
"#
        )
        .unwrap();

        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.upstream.api_key_env, "MY_GEMINI_KEY");
        assert_eq!(config.upstream.default_model, "models/gemini-1.5-pro");
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upstream.timeout_secs, Some(30));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = RelayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.upstream.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.upstream.default_model, "models/gemini-1.5-flash");
        assert!(config.upstream.timeout_secs.is_none());
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let err = RelayConfig::find_and_load(Some(Path::new("/nonexistent/relay.toml")))
            .unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[test]
    fn test_generate_url() {
        let mut config = RelayConfig::default();
        assert_eq!(
            config.generate_url("models/gemini-1.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );

        config.upstream.base_url = "http://127.0.0.1:9000/v1beta/".to_string();
        assert_eq!(
            config.generate_url("models/custom"),
            "http://127.0.0.1:9000/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn test_resolve_api_key_treats_empty_as_missing() {
        let mut config = RelayConfig::default();
        config.upstream.api_key_env = "GEMINI_RELAY_TEST_EMPTY_KEY".to_string();
        std::env::set_var("GEMINI_RELAY_TEST_EMPTY_KEY", "");
        assert!(config.resolve_api_key().is_none());

        config.upstream.api_key_env = "GEMINI_RELAY_TEST_SET_KEY".to_string();
        std::env::set_var("GEMINI_RELAY_TEST_SET_KEY", "abc");
        assert_eq!(config.resolve_api_key().as_deref(), Some("abc"));
    }
}
