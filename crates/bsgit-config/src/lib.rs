//! User configuration.
//!
//! bsgit reads a small TOML file holding the default API base URL and
//! per-host credentials:
//!
//! ```toml
//! apiurl = "https://api.opensuse.org"
//!
//! [hosts."api.opensuse.org"]
//! username = "jane"
//! password = "secret"
//! ```
//!
//! The location is `$BSGIT_CONFIG` when set, otherwise
//! `~/.config/bsgit/config.toml`. A missing file is not an error; it
//! behaves like an empty one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors reading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Credentials and overrides for one API host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Full API base URL when it is not simply `https://<host>`.
    pub apiurl: Option<String>,
}

/// The parsed configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default API base URL used when nothing else determines one.
    pub apiurl: Option<String>,
    #[serde(default)]
    pub hosts: BTreeMap<String, HostConfig>,
}

impl Config {
    /// Load from the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        match std::env::var_os("BSGIT_CONFIG") {
            Some(path) => Self::load(Path::new(&path)),
            None => match std::env::var_os("HOME") {
                Some(home) => Self::load(&Path::new(&home).join(".config/bsgit/config.toml")),
                None => Ok(Self::default()),
            },
        }
    }

    /// Load from an explicit path; a missing file yields the default.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };
        toml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            source: err,
        })
    }

    /// Credentials for an API host, if configured.
    pub fn credentials(&self, host: &str) -> Option<(&str, &str)> {
        let entry = self.hosts.get(host)?;
        Some((entry.username.as_deref()?, entry.password.as_deref()?))
    }

    /// API base URL for a host: the host entry's override, or https.
    pub fn apiurl_for_host(&self, host: &str) -> String {
        self.hosts
            .get(host)
            .and_then(|h| h.apiurl.clone())
            .unwrap_or_else(|| format!("https://{host}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(text: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, text).unwrap();
        let config = Config::load(&path).unwrap();
        (dir, config)
    }

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert!(config.apiurl.is_none());
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let (_dir, config) = write_config(
            r#"
apiurl = "https://api.opensuse.org"

[hosts."api.opensuse.org"]
username = "jane"
password = "secret"

[hosts."api.internal.example"]
username = "ci"
password = "hunter2"
apiurl = "http://api.internal.example:8080"
"#,
        );
        assert_eq!(config.apiurl.as_deref(), Some("https://api.opensuse.org"));
        assert_eq!(
            config.credentials("api.opensuse.org"),
            Some(("jane", "secret"))
        );
        assert_eq!(config.credentials("unknown.example"), None);
        assert_eq!(
            config.apiurl_for_host("api.internal.example"),
            "http://api.internal.example:8080"
        );
        assert_eq!(
            config.apiurl_for_host("api.opensuse.org"),
            "https://api.opensuse.org"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "apiurl = \"x\"\ntypo = 1\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
