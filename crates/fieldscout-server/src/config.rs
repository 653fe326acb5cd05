use serde::Deserialize;
use std::path::Path;

use crate::token::DEFAULT_TTL_SECS;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub audit: AuditConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "memory" => Some(Self::Memory),
            "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Reads an override; a set but unparseable variable is a configuration error.
fn parse_env<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => parse(&value)
            .map(Some)
            .ok_or_else(|| ConfigError::Validation(format!("{name} has invalid value '{value}'"))),
        Err(_) => Ok(None),
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/fieldscout".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("FIELDSCOUT_HTTP_HOST") {
            self.http.host = v;
        }
        if let Some(port) = parse_env("FIELDSCOUT_HTTP_PORT", |v| v.parse::<u16>().ok())? {
            self.http.port = port;
        }
        if let Ok(v) = std::env::var("FIELDSCOUT_DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(n) = parse_env("FIELDSCOUT_DATABASE_MAX_CONNECTIONS", |v| v.parse::<u32>().ok())? {
            self.database.max_connections = n;
        }
        if let Some(backend) = parse_env("FIELDSCOUT_STORAGE_BACKEND", StorageBackend::parse)? {
            self.storage.backend = backend;
        }
        if let Ok(v) = std::env::var("FIELDSCOUT_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(n) = parse_env("FIELDSCOUT_AUDIT_CAPACITY", |v| v.parse::<usize>().ok())? {
            self.audit.capacity = n;
        }
        if let Ok(v) = std::env::var("FIELDSCOUT_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(format) = parse_env("FIELDSCOUT_LOG_FORMAT", LogFormat::parse)? {
            self.log.format = format;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if self.audit.capacity == 0 {
            return Err(ConfigError::Validation(
                "audit.capacity must be non-zero".to_string(),
            ));
        }
        if self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.token_ttl_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = SECRET.to_string();
        config
    }

    #[test]
    fn default_config_has_sensible_values() {
        let config = AppConfig::default();

        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.token_ttl_secs, 8 * 60 * 60);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[http]
host = "127.0.0.1"
port = 9090

[storage]
backend = "postgres"

[auth]
jwt_secret = "{SECRET}"
token_ttl_secs = 600

[log]
format = "pretty"
level = "debug"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.http_addr(), "127.0.0.1:9090");
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.auth.token_ttl_secs, 600);
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn env_vars_override_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[auth]
jwt_secret = "{SECRET}"

[audit]
capacity = 16
"#
        )
        .unwrap();

        // SAFETY: no other test reads this variable
        unsafe { std::env::set_var("FIELDSCOUT_AUDIT_CAPACITY", "4096") };
        let config = AppConfig::load(Some(&path)).unwrap();
        unsafe { std::env::remove_var("FIELDSCOUT_AUDIT_CAPACITY") };

        assert_eq!(config.audit.capacity, 4096);
    }

    #[test]
    fn unknown_storage_backend_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, format!("[auth]\njwt_secret = \"{SECRET}\"\n")).unwrap();

        // SAFETY: no other test reads this variable
        unsafe { std::env::set_var("FIELDSCOUT_STORAGE_BACKEND", "mongodb") };
        let result = AppConfig::load(Some(&path));
        unsafe { std::env::remove_var("FIELDSCOUT_STORAGE_BACKEND") };

        assert!(matches!(
            result,
            Err(ConfigError::Validation(ref msg)) if msg.contains("FIELDSCOUT_STORAGE_BACKEND")
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/fieldscout.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile(..))));
    }

    #[test]
    fn validation_rejects_zero_port() {
        let mut config = valid_config();
        config.http.port = 0;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("port")));
    }

    #[test]
    fn validation_rejects_short_jwt_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short".to_string();

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("jwt_secret"))
        );
    }

    #[test]
    fn validation_rejects_zero_audit_capacity() {
        let mut config = valid_config();
        config.audit.capacity = 0;

        let result = config.validate();
        assert!(
            matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("audit.capacity"))
        );
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }
}
