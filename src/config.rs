use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MatrixConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub layout: LayoutConfig,
    pub chat: ChatConfig,
    pub proxy: ProxyConfig,
    pub roles: RolesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LayoutConfig {
    pub target_row_height: f64,
    pub gap: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub default_model: String,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    /// Name of the env var holding the OpenAI-compatible API key.
    pub openai_key_env: String,
    /// Name of the env var holding the Anthropic API key.
    pub anthropic_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Serve the demo transcript when a live provider call fails.
    pub demo_fallback: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// Host suffixes the image proxy may fetch from.
    pub allowed_image_hosts: Vec<String>,
    /// Hosts accepted as shared-album links.
    pub allowed_album_hosts: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RolesConfig {
    pub dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7420,
            log_level: "info".into(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_matrix_dir()
            .join("matrix.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            target_row_height: 220.0,
            gap: 16.0,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            anthropic_base_url: "https://api.anthropic.com/v1".into(),
            openai_key_env: "OPENAI_API_KEY".into(),
            anthropic_key_env: "ANTHROPIC_API_KEY".into(),
            timeout_secs: 60,
            max_tokens: 512,
            demo_fallback: true,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allowed_image_hosts: vec!["googleusercontent.com".into(), "ggpht.com".into()],
            allowed_album_hosts: vec![
                "photos.app.goo.gl".into(),
                "photos.google.com".into(),
                "goo.gl".into(),
            ],
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        let dir = default_matrix_dir()
            .join("roles")
            .to_string_lossy()
            .into_owned();
        Self { dir }
    }
}

/// Returns `~/.matrix/`
pub fn default_matrix_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".matrix")
}

/// Returns the default config file path: `~/.matrix/config.toml`
pub fn default_config_path() -> PathBuf {
    default_matrix_dir().join("config.toml")
}

impl MatrixConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MatrixConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MATRIX_DB, MATRIX_LOG_LEVEL,
    /// MATRIX_PORT, MATRIX_ROLES_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MATRIX_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MATRIX_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MATRIX_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid MATRIX_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MATRIX_ROLES_DIR") {
            self.roles.dir = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_roles_dir(&self) -> PathBuf {
        expand_tilde(&self.roles.dir)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
