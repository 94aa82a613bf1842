//! Persisted server configuration.
//!
//! The only durable state a server carries is its identity: a UUID minted on
//! first start and reused ever after, so clients can recognize the same
//! server across restarts. The config lives in a small JSON file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServerError};

/// On-disk server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Stable server identity, minted on first start.
    pub uuid: Uuid,
}

impl ServerConfig {
    /// Fresh configuration with a newly minted identity.
    pub fn generate() -> Self {
        Self {
            uuid: Uuid::new_v4(),
        }
    }

    /// Load the configuration from `path`, or mint and persist a new one if
    /// the file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = serde_json::from_str(&contents)?;
                debug!(path = %path.display(), uuid = %config.uuid, "loaded server config");
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::generate();
                config.store(path)?;
                info!(path = %path.display(), uuid = %config.uuid, "created server config");
                Ok(config)
            }
            Err(source) => Err(ServerError::Config {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write the configuration to `path` as pretty-printed JSON.
    pub fn store(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ServerError::Config {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ServerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("labwire-config-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn creates_config_when_missing() {
        let path = temp_path("create.json");
        let _ = fs::remove_file(&path);

        let config = ServerConfig::load_or_create(&path).unwrap();
        assert!(path.exists());

        let reloaded = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config, reloaded);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn identity_survives_reload() {
        let path = temp_path("reload.json");
        let _ = fs::remove_file(&path);

        let first = ServerConfig::load_or_create(&path).unwrap();
        let second = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(first.uuid, second.uuid);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_config_is_an_error() {
        let path = temp_path("broken.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            ServerConfig::load_or_create(&path),
            Err(ServerError::Json(_))
        ));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn creates_missing_parent_directories() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("labwire-config-dir-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("server.json");

        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config, ServerConfig::load_or_create(&path).unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }
}
