use std::path::{Path, PathBuf};

use gcm_sender::SenderConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

/// On-disk configuration, layered under command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sender: SenderConfig,
    /// Retry budget used when `--retries` is not given.
    #[serde(default = "default_retries")]
    pub default_retries: u32,
}

fn default_retries() -> u32 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sender: SenderConfig::default(),
            default_retries: default_retries(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gcm").join("config.toml"))
    }

    /// Load `path`, or the default location if it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))
    }

    /// Apply command-line overrides.
    pub fn with_overrides(
        mut self,
        api_key: Option<String>,
        endpoint: Option<String>,
        timeout: Option<u64>,
    ) -> Self {
        if let Some(api_key) = api_key {
            self.sender.api_key = api_key;
        }
        if let Some(endpoint) = endpoint {
            self.sender.endpoint = endpoint;
        }
        if let Some(timeout) = timeout {
            self.sender.timeout_secs = timeout;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_retries = 2

[sender]
api_key = "from-file"
timeout_secs = 10
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.default_retries, 2);
        assert_eq!(config.sender.api_key, "from-file");
        assert_eq!(config.sender.timeout_secs, 10);
        assert_eq!(config.sender.endpoint, gcm_sender::GCM_SEND_ENDPOINT);
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_retries = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_win() {
        let config = AppConfig::default().with_overrides(
            Some("flag-key".to_string()),
            Some("http://localhost:8080/send".to_string()),
            None,
        );
        assert_eq!(config.sender.api_key, "flag-key");
        assert_eq!(config.sender.endpoint, "http://localhost:8080/send");
        assert_eq!(config.sender.timeout_secs, 30);
    }
}
