use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite database file
    pub database: PathBuf,
    /// Serve from the in-memory demo store instead of SQLite
    pub memory: bool,
    /// Directory for rotated log files, stdout when unset
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub tls: Option<TlsConfig>,
    /// Session lifetime in days
    pub session_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database: PathBuf::from("database/portuguese.db"),
            memory: false,
            log_dir: None,
            log_level: "info".to_string(),
            tls: None,
            session_days: 5,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {} failed: {}", path.display(), e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = Config::parse("port = 9000\nmemory = true").unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.memory);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.session_days, 5);
        assert!(config.tls.is_none());
    }

    #[test]
    fn tls_section() {
        let config = Config::parse(
            r#"
            [tls]
            cert = "cert.pem"
            key = "key.pem"
            "#,
        )
        .unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.cert, PathBuf::from("cert.pem"));
        assert_eq!(tls.key, PathBuf::from("key.pem"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tutor.toml");
        std::fs::write(&path, "database = \"data/app.db\"\nlog_level = \"debug\"").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database, PathBuf::from("data/app.db"));
        assert_eq!(config.log_level, "debug");
        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }
}
