//! Loading configuration files and environment overrides

use crate::config::GobConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variables that override file values
pub const ENV_DATABASE: &str = "GOB_DATABASE";
pub const ENV_MODEL: &str = "GOB_MODEL";
pub const ENV_AUTH_SCHEME: &str = "GOB_AUTH_SCHEME";
pub const ENV_HOST: &str = "GOB_HOST";
pub const ENV_PORT: &str = "GOB_PORT";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Parse a config file, choosing the format by extension
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<GobConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let config = Self::parse(&content, &extension).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise; then apply environment
    /// overrides and validate
    pub fn load(path: Option<&Path>) -> ConfigResult<GobConfig> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                debug!("No config file, using defaults");
                GobConfig::default()
            }
        };
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str, extension: &str) -> ConfigResult<GobConfig> {
        let parse_error = |error: String| ConfigError::Parse {
            path: PathBuf::new(),
            error,
        };
        match extension {
            #[cfg(feature = "toml")]
            "toml" => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
            "json" => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Override file values from the environment
    ///
    /// `lookup` resolves a variable name; tests pass a map lookup instead of
    /// the process environment.
    pub fn apply_env(
        config: &mut GobConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<()> {
        if let Some(path) = lookup(ENV_DATABASE) {
            config.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_MODEL) {
            config.model.path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_AUTH_SCHEME) {
            config.auth.scheme_path = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup(ENV_HOST) {
            config.server.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                field: "server.port",
                reason: format!("'{port}' is not a port number"),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn write(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test_case(".toml", "[server]\nport = 9100\n[streaming]\nchannel_capacity = 8\n"; "toml")]
    #[test_case(".yaml", "server:\n  port: 9100\nstreaming:\n  channel_capacity: 8\n"; "yaml")]
    #[test_case(".json", r#"{"server": {"port": 9100}, "streaming": {"channel_capacity": 8}}"#; "json")]
    fn test_load_by_extension(suffix: &str, content: &str) {
        let file = write(suffix, content);
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.streaming.channel_capacity, 8);
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_unknown_extension() {
        let file = write(".ini", "port=1");
        assert!(matches!(
            ConfigLoader::load_from_file(file.path()),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn test_parse_error_names_file() {
        let file = write(".toml", "[server\n");
        match ConfigLoader::load_from_file(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            (ENV_DATABASE, "/data/gob.db"),
            (ENV_PORT, "9200"),
            (ENV_AUTH_SCHEME, "/etc/gob/auth.yaml"),
        ]);
        let mut config = GobConfig::default();
        ConfigLoader::apply_env(&mut config, |key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.database.path, PathBuf::from("/data/gob.db"));
        assert_eq!(config.server.port, 9200);
        assert_eq!(
            config.auth.scheme_path,
            Some(PathBuf::from("/etc/gob/auth.yaml"))
        );
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = GobConfig::default();
        let result = ConfigLoader::apply_env(&mut config, |key| {
            (key == ENV_PORT).then(|| "http".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid { field: "server.port", .. })));
    }
}
