//! Logonorm configuration. Defaults live here as named constants; a TOML file
//! and `LOGONORM_*` environment variables can override any of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest-edge pixel cap applied during resize
pub const MAX_DIMENSION: u32 = 800;

/// JPEG quality as a fraction in (0, 1]
pub const JPEG_QUALITY: f32 = 0.7;

/// Default tracing filter when `RUST_LOG` is unset
pub const RUST_LOG: &str = "info,actix_web=info";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "logonorm.toml";

/// Prefix of the environment variables that override the file
pub const ENV_PREFIX: &str = "LOGONORM";

/// The tunable behavior of the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub max_dimension: u32,
    pub jpeg_quality: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            max_dimension: MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl NormalizerConfig {
    /// Check the recognized ranges: `max_dimension >= 1` and
    /// `jpeg_quality` in (0, 1]
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_dimension == 0 {
            return Err("max_dimension must be at least 1".into());
        }
        if !(self.jpeg_quality > 0.0 && self.jpeg_quality <= 1.0) {
            return Err(format!(
                "jpeg_quality must be in (0, 1], got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }

    /// The quality on the encoder's 1..=100 scale
    pub fn encoder_quality(&self) -> u8 {
        (self.jpeg_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// HTTP front end settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Upper bound on request bodies, JSON or raw
    pub max_payload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".into(),
            port: 8080,
            max_payload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Everything the binaries read at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: String,
    pub server: ServerSettings,
    pub normalizer: NormalizerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log: RUST_LOG.into(),
            server: ServerSettings::default(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl Settings {
    /// Load defaults, then `path` (or `logonorm.toml` if it exists), then the
    /// environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::from_sources(file, Some(Self::environment()))
    }

    fn environment() -> ::config::Environment {
        ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn from_sources(
        file: ::config::File<::config::FileSourceFile, ::config::FileFormat>,
        env: Option<::config::Environment>,
    ) -> Result<Self> {
        let mut builder = ::config::Config::builder().add_source(file);
        if let Some(env) = env {
            builder = builder.add_source(env);
        }
        let settings: Settings = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("failed to parse configuration")?;

        settings
            .normalizer
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid normalizer configuration: {e}"))?;
        Ok(settings)
    }

    /// The address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn load_file(path: &Path, env: Option<::config::Environment>) -> Result<Settings> {
        Settings::from_sources(::config::File::from(path).required(true), env)
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.normalizer.max_dimension, 800);
        assert_eq!(settings.normalizer.jpeg_quality, 0.7);
        assert_eq!(settings.normalizer.encoder_quality(), 70);
        assert_eq!(settings.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_toml("[normalizer]\nmax_dimension = 640\n");
        let settings = load_file(file.path(), None).unwrap();
        assert_eq!(settings.normalizer.max_dimension, 640);
        assert_eq!(settings.normalizer.jpeg_quality, JPEG_QUALITY);
        assert_eq!(settings.server, ServerSettings::default());
    }

    #[test]
    fn test_full_file() {
        let file = write_toml(
            r#"
log = "debug"

[server]
host = "127.0.0.1"
port = 9000
max_payload_bytes = 1024

[normalizer]
max_dimension = 256
jpeg_quality = 0.9
"#,
        );
        let settings = load_file(file.path(), None).unwrap();
        assert_eq!(settings.log, "debug");
        assert_eq!(settings.bind_addr(), "127.0.0.1:9000");
        assert_eq!(settings.server.max_payload_bytes, 1024);
        assert_eq!(settings.normalizer.encoder_quality(), 90);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_toml("[normalizer]\nmax_dimension = 640\n");
        let vars = HashMap::from([
            (
                "LOGONORM_NORMALIZER__MAX_DIMENSION".to_string(),
                "320".to_string(),
            ),
            ("LOGONORM_SERVER__PORT".to_string(), "9999".to_string()),
        ]);
        let env = Settings::environment().source(Some(vars));
        let settings = load_file(file.path(), Some(env)).unwrap();
        assert_eq!(settings.normalizer.max_dimension, 320);
        assert_eq!(settings.server.port, 9999);
    }

    #[test]
    fn test_rejects_invalid_quality() {
        let file = write_toml("[normalizer]\njpeg_quality = 1.5\n");
        assert!(load_file(file.path(), None).is_err());

        let file = write_toml("[normalizer]\njpeg_quality = 0.0\n");
        assert!(load_file(file.path(), None).is_err());
    }

    #[test]
    fn test_rejects_zero_dimension() {
        let config = NormalizerConfig {
            max_dimension: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/logonorm.toml"))).is_err());
    }

    #[test]
    fn test_encoder_quality_bounds() {
        let low = NormalizerConfig {
            jpeg_quality: 0.001,
            ..Default::default()
        };
        assert_eq!(low.encoder_quality(), 1);

        let high = NormalizerConfig {
            jpeg_quality: 1.0,
            ..Default::default()
        };
        assert_eq!(high.encoder_quality(), 100);
    }
}
