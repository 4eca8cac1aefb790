//! Configuration loading for ring-master.
//!
//! Configuration is loaded from a TOML file (default:
//! `/etc/swift/ring-master.toml`).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for ring-master.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub master: MasterConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MasterConfig {
    /// Directory holding the rings to serve (default: /etc/swift).
    #[serde(default = "default_swift_dir")]
    pub swift_dir: PathBuf,
    /// Bind address for the HTTP server (default: 0.0.0.0:8090).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// File names served under `/ring/` (default: the account, container
    /// and object rings).
    #[serde(default = "default_ring_files")]
    pub ring_files: Vec<String>,
}

// Default value functions
fn default_swift_dir() -> PathBuf {
    PathBuf::from("/etc/swift")
}

fn default_bind_address() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_ring_files() -> Vec<String> {
    ["account.ring.gz", "container.ring.gz", "object.ring.gz"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            swift_dir: default_swift_dir(),
            bind_address: default_bind_address(),
            ring_files: default_ring_files(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject ring file names that could escape `swift_dir`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.master.ring_files {
            let plain = Path::new(name)
                .file_name()
                .is_some_and(|f| f == std::ffi::OsStr::new(name));
            if !plain {
                return Err(ConfigError::InvalidRingFile(name.clone()));
            }
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A ring file entry is not a plain file name.
    #[error("ring_files entry {0:?} must be a plain file name")]
    InvalidRingFile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.master.bind_address, "0.0.0.0:8090");
        assert_eq!(config.master.swift_dir, PathBuf::from("/etc/swift"));
        assert_eq!(config.master.ring_files.len(), 3);
        config.validate().unwrap();
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[master]
swift_dir = "/srv/swift"
bind_address = "127.0.0.1:9000"
ring_files = ["object.ring.gz", "object-1.ring.gz"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.master.swift_dir, PathBuf::from("/srv/swift"));
        assert_eq!(config.master.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.master.ring_files,
            vec!["object.ring.gz", "object-1.ring.gz"]
        );
    }

    #[test]
    fn path_like_ring_files_are_rejected() {
        let mut config = Config::default();
        config.master.ring_files = vec!["../passwd".into()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRingFile(_))
        ));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring-master.toml");
        std::fs::write(&path, "[master]\nbind_address = \"127.0.0.1:0\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.master.bind_address, "127.0.0.1:0");
    }
}
