use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_database_config")]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Comma-separated operator handles, e.g. "alice, @bob, https://t.me/carol"
    #[serde(default)]
    pub allowed_usernames: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("leadbot.db")
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        port: default_port(),
    }
}

fn default_database_config() -> DatabaseConfig {
    DatabaseConfig {
        path: default_db_path(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [telegram]
            bot_token = "123:abc"
            allowed_usernames = "alice, @bob"

            [server]
            port = 8080

            [database]
            path = "/tmp/test.db"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.allowed_usernames, "alice, @bob");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("/tmp/test.db"));
    }

    #[test]
    fn test_defaults_apply_when_sections_missing() {
        let toml = r#"
            [telegram]
            bot_token = "123:abc"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, PathBuf::from("leadbot.db"));
        assert!(config.telegram.allowed_usernames.is_empty());
    }
}
