//! Configuration surface.
//!
//! Field names on the wire keep the historical camelCase spelling, so a
//! settings blob from an embedding application deserializes unchanged.
//! Loaded from an explicit path, .signal-dbus.yml in the current directory,
//! or ~/.config/signal-dbus/config.yml.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bus::BusScope;
use crate::error::{Result, SignalDbusError};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Bus session settings.
    pub dbus: DbusConfig,

    /// Account identifier: digits only, no leading `+`.
    pub phone_number: String,

    /// Verbose per-event logging.
    pub debug: bool,
}

/// Bus session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DbusConfig {
    /// Liveness probe period in milliseconds.
    pub connection_check_interval: u64,

    /// Daemon bus name.
    pub destination: String,

    /// Which bus to open the session on.
    #[serde(rename = "type")]
    pub bus_type: BusScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dbus: DbusConfig::default(),
            phone_number: String::new(),
            debug: false,
        }
    }
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            connection_check_interval: 60_000,
            destination: "org.asamk.Signal".to_string(),
            bus_type: BusScope::Session,
        }
    }
}

impl Config {
    /// Build from a settings value handed over by an embedding application.
    /// Type mismatches (a string where a number belongs, an unknown bus
    /// type) are configuration errors, raised before any transport call.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| SignalDbusError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .signal-dbus.yml in current directory
    /// 3. ~/.config/signal-dbus/config.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let project_config = PathBuf::from(".signal-dbus.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .signal-dbus.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .signal-dbus.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("signal-dbus").join("config.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&content).map_err(|e| SignalDbusError::Configuration(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.dbus.connection_check_interval == 0 {
            return Err(SignalDbusError::Configuration(
                "dbus.connectionCheckInterval must be a positive number of milliseconds".to_string(),
            ));
        }
        if self.dbus.destination.is_empty() || self.dbus.destination.contains(char::is_whitespace) {
            return Err(SignalDbusError::Configuration(format!(
                "dbus.destination is not a well-formed bus name: {:?}",
                self.dbus.destination
            )));
        }
        if self.phone_number.is_empty() {
            return Err(SignalDbusError::Configuration(
                "phoneNumber is required".to_string(),
            ));
        }
        if self.phone_number.starts_with('+') {
            return Err(SignalDbusError::Configuration(
                "phoneNumber must not carry a leading +".to_string(),
            ));
        }
        if !self.phone_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(SignalDbusError::Configuration(format!(
                "phoneNumber must be numeric: {:?}",
                self.phone_number
            )));
        }
        Ok(())
    }

    /// Object path of the daemon interface for this account, derived from the
    /// destination bus name.
    pub fn object_path(&self) -> String {
        format!(
            "/{}/_{}",
            self.dbus.destination.replace('.', "/"),
            self.phone_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Config {
        Config {
            phone_number: "15551234567".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.dbus.connection_check_interval, 60_000);
        assert_eq!(config.dbus.destination, "org.asamk.Signal");
        assert_eq!(config.dbus.bus_type, BusScope::Session);
        assert!(!config.debug);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_from_value_camel_case() {
        let config = Config::from_value(json!({
            "dbus": {
                "connectionCheckInterval": 5000,
                "destination": "org.asamk.Signal",
                "type": "system"
            },
            "phoneNumber": "15551234567",
            "debug": true
        }))
        .unwrap();
        assert_eq!(config.dbus.connection_check_interval, 5000);
        assert_eq!(config.dbus.bus_type, BusScope::System);
        assert!(config.debug);
    }

    #[test]
    fn test_from_value_string_interval_is_configuration_error() {
        let result = Config::from_value(json!({
            "dbus": { "connectionCheckInterval": "5000" },
            "phoneNumber": "15551234567"
        }));
        assert!(matches!(result, Err(SignalDbusError::Configuration(_))));
    }

    #[test]
    fn test_from_value_unknown_bus_type() {
        let result = Config::from_value(json!({
            "dbus": { "type": "p2p" },
            "phoneNumber": "15551234567"
        }));
        assert!(matches!(result, Err(SignalDbusError::Configuration(_))));
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = valid();
        config.dbus.connection_check_interval = 0;
        assert!(matches!(config.validate(), Err(SignalDbusError::Configuration(_))));
    }

    #[test]
    fn test_validate_bad_destination() {
        let mut config = valid();
        config.dbus.destination = String::new();
        assert!(config.validate().is_err());

        config.dbus.destination = "org asamk".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_phone_number() {
        let mut config = valid();
        config.phone_number = String::new();
        assert!(config.validate().is_err());

        config.phone_number = "+15551234567".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("leading +"));

        config.phone_number = "555-1234".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_object_path() {
        let config = valid();
        assert_eq!(config.object_path(), "/org/asamk/Signal/_15551234567");
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "dbus:\n  connectionCheckInterval: 1500\n  type: system\nphoneNumber: \"15551234567\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.dbus.connection_check_interval, 1500);
        assert_eq!(config.dbus.bus_type, BusScope::System);
        assert_eq!(config.phone_number, "15551234567");
        // Unset fields fall back to defaults.
        assert_eq!(config.dbus.destination, "org.asamk.Signal");
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "dbus: [not, a, mapping]\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(SignalDbusError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let path = PathBuf::from("/nonexistent/signal-dbus.yml");
        assert!(matches!(Config::load(Some(&path)), Err(SignalDbusError::Io(_))));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = valid();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("connectionCheckInterval"));
        assert!(json.contains("phoneNumber"));
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.phone_number, config.phone_number);
    }
}
