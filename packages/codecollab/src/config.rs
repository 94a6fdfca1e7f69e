use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [server]
//                    port = 5000
//
//   env var:         CODECOLLAB_SERVER__PORT=5000   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
}

/// Server tuning knobs (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Auth-related tunables (lives under `[auth]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthFileConfig {
    /// Validity window for tokens minted by `codecollab issue-token`.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
        }
    }
}

fn default_token_ttl() -> i64 {
    86400
}

/// Build a figment that layers: defaults → config.toml → CODECOLLAB_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CODECOLLAB_SERVER__PORT=5000`      →  `server.port = 5000`
///   `CODECOLLAB_AUTH__TOKEN_TTL_SECS=60` →  `auth.token_ttl_secs = 60`
pub fn load_file_config(data_dir: &Path) -> Result<FileConfig> {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("CODECOLLAB_").split("__"))
        .extract()
        .context("Failed to load configuration")
}

// =============================================================================
// Directory layout config (not tunable via figment — derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct CollabConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Ed25519 seed used to sign and verify access tokens.
    pub key_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_secs: i64,
}

impl CollabConfig {
    /// Resolve the full runtime config. CLI overrides beat config.toml/env,
    /// which beat defaults.
    pub fn new(
        custom_dir: Option<PathBuf>,
        cli_host: Option<String>,
        cli_port: Option<u16>,
    ) -> Result<Self> {
        let data_dir = custom_dir.unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".codecollab")
        });

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let file = load_file_config(&data_dir)?;

        let host = cli_host
            .or(file.server.host)
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = cli_port.or(file.server.port).unwrap_or(5000);

        let db_path = data_dir.join("codecollab.db");
        let key_path = data_dir.join("token.key");

        info!("Data directory: {}", data_dir.display());

        Ok(Self {
            data_dir,
            db_path,
            key_path,
            host,
            port,
            token_ttl_secs: file.auth.token_ttl_secs,
        })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.db_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CollabConfig::new(Some(tmp.path().to_path_buf()), None, None).unwrap();
        assert_eq!(config.data_dir, tmp.path());
        assert_eq!(config.db_path, tmp.path().join("codecollab.db"));
        assert_eq!(config.key_path, tmp.path().join("token.key"));
    }

    #[test]
    fn defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CollabConfig::new(Some(tmp.path().to_path_buf()), None, None).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.token_ttl_secs, 86400);
    }

    #[test]
    fn cli_overrides_win() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CollabConfig::new(
            Some(tmp.path().to_path_buf()),
            Some("0.0.0.0".to_string()),
            Some(9999),
        )
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9999);
    }

    #[test]
    fn config_toml_layer() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "[server]\nport = 4242\n\n[auth]\ntoken_ttl_secs = 120\n",
        )
        .unwrap();

        let config = CollabConfig::new(Some(tmp.path().to_path_buf()), None, None).unwrap();
        assert_eq!(config.port, 4242);
        assert_eq!(config.token_ttl_secs, 120);
    }

    #[test]
    fn db_url_format() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CollabConfig::new(Some(tmp.path().to_path_buf()), None, None).unwrap();
        let url = config.db_url();
        assert!(url.starts_with("sqlite:"));
        assert!(url.ends_with("codecollab.db?mode=rwc"));
    }
}
