use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Nominal scheduler poll interval (seconds).
pub const DEFAULT_POLL_SECS: u64 = 30;
/// Backoff sleep after a scan-cycle error (seconds).
pub const DEFAULT_ERROR_BACKOFF_SECS: u64 = 60;
/// Bound on every call marshaled onto the client actor (seconds).
pub const CLIENT_CALL_TIMEOUT_SECS: u64 = 30;

/// Top-level config (courier.toml + COURIER_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HMAC key for bearer tokens. Must be at least 32 bytes in production.
    #[serde(default = "default_secret")]
    pub token_secret: String,
    /// Origins allowed by the CORS layer.
    #[serde(default = "default_cors")]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            token_secret: default_secret(),
            cors_origins: default_cors(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Filesystem area holding one platform session artifact per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_sessions_dir")]
    pub dir: String,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_dir")]
    pub dir: String,
    /// Per-file upload cap in bytes (default 10 MB).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Lowercase extensions accepted for upload.
    #[serde(default = "default_allowed_ext")]
    pub allowed_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            max_file_bytes: default_max_file_bytes(),
            allowed_extensions: default_allowed_ext(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

/// Inter-recipient cooldowns exist to respect platform rate limits; removing
/// them gets the whole batch throttled remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_text_cooldown_ms")]
    pub text_cooldown_ms: u64,
    #[serde(default = "default_media_cooldown_ms")]
    pub media_cooldown_ms: u64,
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            text_cooldown_ms: default_text_cooldown_ms(),
            media_cooldown_ms: default_media_cooldown_ms(),
            max_recipients: default_max_recipients(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Which connector backs the client actor. `sandbox` is the in-process
    /// development driver; production deployments plug an MTProto connector
    /// through `PlatformConnector`.
    #[serde(default = "default_driver")]
    pub driver: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
        }
    }
}

impl CourierConfig {
    /// Load order: explicit path > `COURIER_CONFIG` env > `~/.courier/courier.toml`,
    /// then `COURIER_*` env overrides on top.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CourierConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COURIER_").split("_"))
            .extract()
            .map_err(|e| crate::error::CourierError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.courier/courier.toml")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_secret() -> String {
    "change-this-in-production-use-32-plus-chars".to_string()
}

fn default_cors() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_db_path() -> String {
    "courier.db".to_string()
}

fn default_sessions_dir() -> String {
    "sessions".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_ext() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_poll_secs() -> u64 {
    DEFAULT_POLL_SECS
}

fn default_error_backoff_secs() -> u64 {
    DEFAULT_ERROR_BACKOFF_SECS
}

fn default_text_cooldown_ms() -> u64 {
    1000
}

fn default_media_cooldown_ms() -> u64 {
    2000
}

fn default_max_recipients() -> usize {
    50
}

fn default_driver() -> String {
    "sandbox".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.scheduler.poll_secs, 30);
        assert_eq!(cfg.scheduler.error_backoff_secs, 60);
        assert_eq!(cfg.dispatch.text_cooldown_ms, 1000);
        assert_eq!(cfg.dispatch.media_cooldown_ms, 2000);
        assert_eq!(cfg.dispatch.max_recipients, 50);
        assert_eq!(cfg.media.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.platform.driver, "sandbox");
    }

    #[test]
    fn media_cooldown_exceeds_text_cooldown() {
        let cfg = DispatchConfig::default();
        assert!(cfg.media_cooldown_ms > cfg.text_cooldown_ms);
    }
}
