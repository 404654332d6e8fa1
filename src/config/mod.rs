use serde::{Deserialize, Serialize};

/// Deployment environment; selects log format among other defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn from_env_var(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Parameters handed to the external SFU's media plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SfuConfig {
    pub udp_port_min: u16,
    pub udp_port_max: u16,
    pub stun_server: String,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            udp_port_min: 10_000,
            udp_port_max: 10_100,
            stun_server: "stun:stun.l.google.com:19302".to_string(),
        }
    }
}

/// Server configuration, loaded from the environment with code defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub env: Environment,
    pub sfu: SfuConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "./static".to_string(),
            env: Environment::Development,
            sfu: SfuConfig::default(),
        }
    }
}

/// Load configuration from `PORT`, `HOST`, `STATIC_DIR`, `ENV`, and the
/// `SFU_*` variables, falling back to defaults for anything unset or
/// unparseable.
pub fn load() -> AppConfig {
    let defaults = AppConfig::default();

    AppConfig {
        host: env_string("HOST").unwrap_or(defaults.host),
        port: env_parsed("PORT").unwrap_or(defaults.port),
        static_dir: env_string("STATIC_DIR").unwrap_or(defaults.static_dir),
        env: env_string("ENV")
            .map(|raw| Environment::from_env_var(&raw))
            .unwrap_or(defaults.env),
        sfu: SfuConfig {
            udp_port_min: env_parsed("SFU_UDP_PORT_MIN").unwrap_or(defaults.sfu.udp_port_min),
            udp_port_max: env_parsed("SFU_UDP_PORT_MAX").unwrap_or(defaults.sfu.udp_port_max),
            stun_server: env_string("SFU_STUN_SERVER").unwrap_or(defaults.sfu.stun_server),
        },
    }
}

/// Sanity checks run at startup and by `--validate-config`.
pub fn validate(config: &AppConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("PORT must be non-zero".to_string());
    }
    if config.sfu.udp_port_min > config.sfu.udp_port_max {
        return Err(format!(
            "SFU_UDP_PORT_MIN ({}) must not exceed SFU_UDP_PORT_MAX ({})",
            config.sfu.udp_port_min, config.sfu.udp_port_max
        ));
    }
    if config.sfu.stun_server.is_empty() {
        return Err("SFU_STUN_SERVER must not be empty".to_string());
    }
    Ok(())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            eprintln!("Ignoring unparseable {key}={raw}");
            None
        }
    }
}
