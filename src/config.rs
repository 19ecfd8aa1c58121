use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/lektra.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this many minutes of inactivity.
    pub session_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8350,
            cors_allowed_origins: vec![
                "http://localhost:8350".to_string(),
                "http://127.0.0.1:8350".to_string(),
            ],
            secure_cookies: true,
            session_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    /// Lower values reduce memory usage but decrease GPU resistance.
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations) - higher = more CPU work
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Minimum accepted password length at registration.
    pub min_password_len: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_len: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Load from the first config file found, then apply environment
    /// overrides. `LEKTRA_DATABASE_URL` wins over the file so tests and
    /// containers can point at their own database.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let paths = Self::config_paths();

        let mut config = match paths.iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                Self::load_from_path(path)?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        if let Ok(url) = std::env::var("LEKTRA_DATABASE_URL") {
            config.general.database_path = url;
        }
        if let Ok(port) = std::env::var("LEKTRA_PORT")
            && let Ok(port) = port.parse()
        {
            config.server.port = port;
        }

        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("lektra").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".lektra").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.is_empty() {
            anyhow::bail!("Database path cannot be empty");
        }

        if self.general.max_db_connections == 0 {
            anyhow::bail!("max_db_connections must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("min_db_connections cannot exceed max_db_connections");
        }

        if self.server.port == 0 {
            anyhow::bail!("port must be > 0");
        }

        if self.server.session_minutes <= 0 {
            anyhow::bail!("session_minutes must be > 0");
        }

        if self.security.min_password_len == 0 {
            anyhow::bail!("min_password_len must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8350);
        assert_eq!(config.general.database_path, "sqlite:data/lektra.db");
        assert_eq!(config.security.min_password_len, 6);
        assert!(config.observability.metrics_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[security]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [server]
            port = 9000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.port, 9000);

        assert_eq!(config.security.argon2_time_cost, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.session_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.min_db_connections = 10;
        config.general.max_db_connections = 5;
        assert!(config.validate().is_err());
    }
}
