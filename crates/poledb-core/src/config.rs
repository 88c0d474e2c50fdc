//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/poledb/config.toml)
//! 3. Environment variables (POLEDB_* prefix, plus DATABASE_URL)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "POLEDB";

/// Connection string for the production database
const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Which database the service talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local SQLite file (development)
    #[default]
    Sqlite,
    /// PostgreSQL server (production)
    Postgres,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            other => bail!("Unknown backend '{}'. Expected sqlite or postgres", other),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database backend
    #[serde(default)]
    pub backend: BackendKind,

    /// Path of the SQLite database file
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(default)]
    pub database_url: Option<String>,

    /// Debug mode: database error messages are passed through to callers
    #[serde(default = "default_debug")]
    pub debug: bool,

    /// Log level for the CLI (error, warn, info, debug, trace)
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            sqlite_path: default_sqlite_path(),
            database_url: None,
            debug: default_debug(),
            log_level: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (POLEDB_BACKEND, POLEDB_SQLITE_PATH,
    ///    DATABASE_URL, POLEDB_DEBUG, POLEDB_LOG_LEVEL)
    /// 2. Config file (~/.config/poledb/config.toml or POLEDB_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // POLEDB_BACKEND
        if let Ok(val) = std::env::var(format!("{}_BACKEND", ENV_PREFIX)) {
            self.backend = val
                .parse()
                .with_context(|| format!("Invalid {}_BACKEND", ENV_PREFIX))?;
        }

        // POLEDB_SQLITE_PATH
        if let Ok(val) = std::env::var(format!("{}_SQLITE_PATH", ENV_PREFIX)) {
            self.sqlite_path = PathBuf::from(val);
        }

        // DATABASE_URL
        if let Ok(val) = std::env::var(DATABASE_URL_ENV) {
            self.database_url = if val.is_empty() { None } else { Some(val) };
        }

        // POLEDB_DEBUG
        if let Ok(val) = std::env::var(format!("{}_DEBUG", ENV_PREFIX)) {
            self.debug = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // POLEDB_LOG_LEVEL
        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            self.log_level = if val.is_empty() { None } else { Some(val) };
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with POLEDB_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("poledb")
            .join("config.toml")
    }
}

/// Get the default SQLite file location
fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("poledb")
        .join("sqlite.db")
}

fn default_debug() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "POLEDB_BACKEND",
        "POLEDB_SQLITE_PATH",
        "DATABASE_URL",
        "POLEDB_DEBUG",
        "POLEDB_LOG_LEVEL",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert!(config.debug);
        assert!(config.database_url.is_none());
        assert!(config.sqlite_path.ends_with("sqlite.db"));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert!("mysql".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Postgres.to_string(), "postgres");
    }

    #[test]
    fn test_env_override_backend() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("POLEDB_BACKEND", "postgres");
        config.apply_env_overrides().unwrap();
        assert_eq!(config.backend, BackendKind::Postgres);

        env::set_var("POLEDB_BACKEND", "oracle");
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_env_override_database_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("DATABASE_URL", "postgresql://poles@localhost/poles");
        config.apply_env_overrides().unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgresql://poles@localhost/poles")
        );

        // Empty string clears it
        env::set_var("DATABASE_URL", "");
        config.apply_env_overrides().unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_env_override_debug() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("POLEDB_DEBUG", "false");
        config.apply_env_overrides().unwrap();
        assert!(!config.debug);

        env::set_var("POLEDB_DEBUG", "1");
        config.apply_env_overrides().unwrap();
        assert!(config.debug);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            backend = "postgres"
            database_url = "postgresql://example/db"
            debug = false
            log_level = "debug"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.backend, BackendKind::Postgres);
        assert_eq!(config.database_url.as_deref(), Some("postgresql://example/db"));
        assert!(!config.debug);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        // Unset fields fall back to defaults
        assert!(config.sqlite_path.ends_with("sqlite.db"));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            backend: BackendKind::Sqlite,
            sqlite_path: PathBuf::from("/data/poles.db"),
            database_url: None,
            debug: false,
            log_level: None,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("backend = \"sqlite\""));
        assert!(toml_str.contains("sqlite_path"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sqlite_path, config.sqlite_path);
        assert_eq!(parsed.debug, config.debug);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert!(config.debug);
    }

    #[test]
    fn test_load_from_path_reads_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sqlite_path = \"/tmp/poles.db\"\n").unwrap();

        let config = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(config.sqlite_path, PathBuf::from("/tmp/poles.db"));
    }
}
