//! Configuration loading and types for trackstream.
//!
//! Configuration is read from an optional YAML file, then overridden by
//! environment variables (a `.env` file is honoured by `main`).  Every
//! required value must be present after both layers; [`Config::validate`]
//! fails fast otherwise.
//!
//! | Variable           | Field                       |
//! |--------------------|-----------------------------|
//! | `PORT`             | `server.port`               |
//! | `STATIC_DIR`       | `server.static_dir`         |
//! | `DB_ENGINE`        | `metadata.engine`           |
//! | `SQLITE_PATH`      | `metadata.sqlite.path`      |
//! | `DB_HOST`          | `metadata.mysql.host`       |
//! | `DB_PORT`          | `metadata.mysql.port`       |
//! | `DB_USER`          | `metadata.mysql.user`       |
//! | `DB_PASSWORD`      | `metadata.mysql.password`   |
//! | `DATABASE`         | `metadata.mysql.database`   |
//! | `AWS_BUCKET`       | `storage.bucket`            |
//! | `AWS_REGION`       | `storage.region`            |
//! | `AWS_ENDPOINT_URL` | `storage.endpoint_url`      |

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`Config`].
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    /// A required setting has no value.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A setting has a value that cannot be used.
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    /// A `.env` file exists but could not be loaded.
    #[error("loading .env: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Track metadata store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Directory of the built front-end, served for unmatched paths.
    #[serde(default)]
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            static_dir: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

/// Which metadata engine to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataEngine {
    /// Embedded SQLite file.
    #[default]
    Sqlite,
    /// Remote MySQL server.
    Mysql,
}

/// Track metadata store configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetadataConfig {
    /// Backend type: `sqlite` or `mysql`.
    #[serde(default)]
    pub engine: MetadataEngine,

    /// SQLite-specific configuration.
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// MySQL-specific configuration.
    #[serde(default)]
    pub mysql: MySqlConfig,
}

/// SQLite-specific metadata configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

/// MySQL connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConfig {
    /// Server host name.
    #[serde(default)]
    pub host: String,

    /// Server port.
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// User name.
    #[serde(default)]
    pub user: String,

    /// Password. `None` means not configured at all; an empty string is a
    /// legitimate (if unwise) password.
    #[serde(default)]
    pub password: Option<String>,

    /// Database (schema) name.
    #[serde(default)]
    pub database: String,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mysql_port(),
            user: String::new(),
            password: None,
            database: String::new(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Bucket holding the audio objects.
    #[serde(default)]
    pub bucket: String,

    /// AWS region; falls back to the SDK's default chain when unset.
    #[serde(default)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_sqlite_path() -> String {
    "./data/tracks.db".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

impl Config {
    /// Apply environment overrides read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests off the real process
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            self.server.port = v.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("STATIC_DIR") {
            self.server.static_dir = Some(v);
        }
        if let Some(v) = lookup("DB_ENGINE") {
            self.metadata.engine = match v.to_ascii_lowercase().as_str() {
                "sqlite" => MetadataEngine::Sqlite,
                "mysql" => MetadataEngine::Mysql,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DB_ENGINE",
                        value: v,
                    })
                }
            };
        }
        if let Some(v) = lookup("SQLITE_PATH") {
            self.metadata.sqlite.path = v;
        }
        if let Some(v) = lookup("DB_HOST") {
            self.metadata.mysql.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.metadata.mysql.port = v.parse().map_err(|_| ConfigError::Invalid {
                name: "DB_PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("DB_USER") {
            self.metadata.mysql.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.metadata.mysql.password = Some(v);
        }
        if let Some(v) = lookup("DATABASE") {
            self.metadata.mysql.database = v;
        }
        if let Some(v) = lookup("AWS_BUCKET") {
            self.storage.bucket = v;
        }
        if let Some(v) = lookup("AWS_REGION") {
            self.storage.region = Some(v);
        }
        if let Some(v) = lookup("AWS_ENDPOINT_URL") {
            self.storage.endpoint_url = Some(v);
        }
        Ok(())
    }

    /// Check that every setting the service needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("storage.bucket (AWS_BUCKET)"));
        }

        match self.metadata.engine {
            MetadataEngine::Sqlite => {
                if self.metadata.sqlite.path.is_empty() {
                    return Err(ConfigError::Missing("metadata.sqlite.path (SQLITE_PATH)"));
                }
            }
            MetadataEngine::Mysql => {
                let mysql = &self.metadata.mysql;
                if mysql.host.is_empty() {
                    return Err(ConfigError::Missing("metadata.mysql.host (DB_HOST)"));
                }
                if mysql.user.is_empty() {
                    return Err(ConfigError::Missing("metadata.mysql.user (DB_USER)"));
                }
                if mysql.password.is_none() {
                    return Err(ConfigError::Missing("metadata.mysql.password (DB_PASSWORD)"));
                }
                if mysql.database.is_empty() {
                    return Err(ConfigError::Missing("metadata.mysql.database (DATABASE)"));
                }
            }
        }

        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Invalid {
                name: "logging.format",
                value: other.to_string(),
            }),
        }
    }
}

/// Load and parse configuration from a YAML file at `path`.
///
/// A missing file is not an error: the service can be configured from the
/// environment alone.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: display,
                source,
            })
        }
    };

    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

/// Load a `.env` file into the process environment.
///
/// Having no `.env` is normal in production; a file that is present but
/// malformed is an error, since the settings it was meant to provide would
/// otherwise be silently missing.
pub fn load_dotenv() -> Result<(), ConfigError> {
    dotenv_outcome(dotenvy::dotenv().map(|_| ()))
}

fn dotenv_outcome(result: Result<(), dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

/// Load the YAML file, apply process environment overrides, and validate.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let mut config = load_config(path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.metadata.engine, MetadataEngine::Sqlite);
        assert_eq!(config.metadata.mysql.port, 3306);
        assert!(config.observability.metrics);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).unwrap();
        assert!(config.storage.bucket.is_empty());
    }

    #[test]
    fn test_yaml_parses_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8080\n  static_dir: ./client/build\nmetadata:\n  engine: mysql\n  mysql:\n    host: db\n    user: app\n    password: ''\n    database: music\nstorage:\n  bucket: tracks\n  region: eu-west-1\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir.as_deref(), Some("./client/build"));
        assert_eq!(config.metadata.engine, MetadataEngine::Mysql);
        assert_eq!(config.metadata.mysql.password.as_deref(), Some(""));
        assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
        config.validate().unwrap();
    }

    fn read_env_file(path: &Path) -> Result<(), dotenvy::Error> {
        dotenvy::from_path_iter(path)?.collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    #[test]
    fn test_absent_dotenv_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_env_file(&dir.path().join(".env"));
        assert!(dotenv_outcome(result).is_ok());
    }

    #[test]
    fn test_malformed_dotenv_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "AWS_BUCKET=tracks\nnot a valid line\n").unwrap();

        let result = read_env_file(&path);
        assert!(matches!(
            dotenv_outcome(result),
            Err(ConfigError::DotEnv(dotenvy::Error::LineParse(..)))
        ));
    }

    #[test]
    fn test_bad_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides_yaml() {
        let mut config = Config::default();
        config.storage.bucket = "from-yaml".to_string();
        config
            .apply_env(env(&[
                ("AWS_BUCKET", "from-env"),
                ("DB_ENGINE", "MySQL"),
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "3307"),
                ("DB_USER", "reader"),
                ("DB_PASSWORD", "hunter2"),
                ("DATABASE", "music"),
                ("PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.storage.bucket, "from-env");
        assert_eq!(config.metadata.engine, MetadataEngine::Mysql);
        assert_eq!(config.metadata.mysql.port, 3307);
        assert_eq!(config.server.port, 9000);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_rejects_bad_numbers_and_engine() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[("PORT", "eighty")])),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            config.apply_env(env(&[("DB_ENGINE", "postgres")])),
            Err(ConfigError::Invalid {
                name: "DB_ENGINE",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_requires_bucket() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_validate_requires_mysql_settings() {
        let mut config = Config::default();
        config.storage.bucket = "tracks".to_string();
        config.metadata.engine = MetadataEngine::Mysql;
        config.metadata.mysql.host = "db".to_string();
        config.metadata.mysql.user = "app".to_string();
        config.metadata.mysql.database = "music".to_string();

        // Password never set.
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        config.metadata.mysql.password = Some(String::new());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.storage.bucket = "tracks".to_string();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                name: "logging.format",
                ..
            })
        ));
    }
}
