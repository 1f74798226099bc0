use scribing_flow::FlowContent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "scribing.config.json";

/// Server configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a silent client stays in the presence list
    #[serde(default = "default_presence_ttl")]
    pub presence_ttl: u64,

    /// Initial document: a `.json` flow content file or plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3040
}

fn default_presence_ttl() -> u64 {
    scribing_sync::PRESENCE_TTL.as_secs()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            presence_ttl: default_presence_ttl(),
            document: None,
        }
    }
}

impl ServerConfig {
    /// Load config from a directory
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: ServerConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(ServerConfig::default())
        }
    }

    pub fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl)
    }

    /// Read the initial document relative to `dir`; empty when unset
    pub fn initial_content(&self, dir: impl AsRef<Path>) -> anyhow::Result<FlowContent> {
        let Some(document) = &self.document else {
            return Ok(FlowContent::empty());
        };
        let path: PathBuf = dir.as_ref().join(document);
        let source = std::fs::read_to_string(&path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&source)?)
        } else {
            Ok(FlowContent::from_text(&source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "port": 8080,
            "presenceTtl": 5,
            "document": "welcome.txt"
        }"#;

        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.presence_ttl(), Duration::from_secs(5));
        assert_eq!(config.document.as_deref(), Some("welcome.txt"));
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(dir.path()).unwrap();
        assert_eq!(config.port, 3040);
        assert!(config.initial_content(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_plain_text_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("doc.txt"), "Hello\nWorld").unwrap();
        let config = ServerConfig {
            document: Some("doc.txt".to_string()),
            ..ServerConfig::default()
        };
        let content = config.initial_content(dir.path()).unwrap();
        assert_eq!(content.text(), "Hello\nWorld");
    }
}
