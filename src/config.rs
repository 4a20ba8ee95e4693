//! Session configuration for tn3270r
//!
//! A [`SessionConfig`] is a plain serde struct persisted as JSON. Missing keys
//! take their defaults, so an empty object is a valid file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::lib3270::display::ScreenSize;
use crate::lib3270::tn3270e::Tn3270eFunction;
use crate::telnet_negotiation::NegotiatorConfig;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TN3270R_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// PEM file of extra trusted CAs
    pub ca_bundle_path: Option<String>,
    /// LU to request with DEVICE-TYPE CONNECT
    pub lu_name: Option<String>,
    pub terminal_type: String,
    pub model: ScreenSize,
    pub refuse_tn3270e: bool,
    /// TN3270E functions to request, by RFC name
    pub tn3270e_functions: Vec<String>,
    pub always_skip_to_unprotected: bool,
    pub numeric_lock: bool,
    /// Make waits that expire with the keyboard locked fail instead of
    /// returning false
    pub throw_on_locked_screen_timeout: bool,
    pub default_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
            use_tls: false,
            ca_bundle_path: None,
            lu_name: None,
            terminal_type: "IBM-3278-2-E".to_string(),
            model: ScreenSize::Model2,
            refuse_tn3270e: false,
            tn3270e_functions: vec![
                "BIND-IMAGE".to_string(),
                "DATA-STREAM-CTL".to_string(),
                "RESPONSES".to_string(),
                "SYSREQ".to_string(),
            ],
            always_skip_to_unprotected: true,
            numeric_lock: false,
            throw_on_locked_screen_timeout: false,
            default_timeout_ms: 3000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: port == 992,
            ..Self::default()
        }
    }

    /// Check the values a connection depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.terminal_type.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "terminal_type",
                reason: "must not be empty".to_string(),
            });
        }
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "connect_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.functions()?;
        Ok(())
    }

    /// Requested TN3270E functions, parsed from their names.
    pub fn functions(&self) -> ConfigResult<Vec<Tn3270eFunction>> {
        self.tn3270e_functions
            .iter()
            .map(|name| {
                Tn3270eFunction::from_name(name).ok_or_else(|| ConfigError::InvalidValue {
                    key: "tn3270e_functions",
                    reason: format!("unknown function {}", name),
                })
            })
            .collect()
    }

    /// Negotiation parameters. The stock type is replaced by the one matching
    /// `model`, so a Model 5 session announces `IBM-3278-5-E`.
    pub fn negotiator_config(&self) -> ConfigResult<NegotiatorConfig> {
        let configured = if self.terminal_type == SessionConfig::default().terminal_type {
            self.model.terminal_type(false)
        } else {
            self.terminal_type.clone()
        };
        let base = configured.trim_end_matches("-E").to_string();
        Ok(NegotiatorConfig {
            terminal_type: base,
            lu_name: self.lu_name.clone().filter(|lu| !lu.is_empty()),
            refuse_tn3270e: self.refuse_tn3270e,
            functions: self.functions()?,
        })
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Resolve the config file location.
///
/// `TN3270R_CONFIG` wins; otherwise `<config dir>/tn3270r/session.json`,
/// falling back to the working directory.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join("tn3270r").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("session.json"))
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> ConfigResult<SessionConfig> {
    let text = fs::read_to_string(path)?;
    let config = SessionConfig::from_json(&text)?;
    config.validate()?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Load from the default path, or defaults when there is no file yet.
pub fn load_or_default() -> ConfigResult<SessionConfig> {
    let path = default_config_path();
    if path.exists() {
        load_config(&path)
    } else {
        Ok(SessionConfig::default())
    }
}

/// Write a config file, creating parent directories.
pub fn save_config(config: &SessionConfig, path: &Path) -> ConfigResult<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, config.to_json()?)?;
    log::debug!("saved config to {}", path.display());
    Ok(())
}
