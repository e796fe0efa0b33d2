use crate::domain::models::Coordinates;
use crate::infrastructure::bluetooth::protocol::{self, GattIdentifiers};
use crate::infrastructure::bluetooth::service::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "sundial_host".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // Session Settings
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound for every transport call; unset means wait indefinitely.
    #[serde(default)]
    pub transport_timeout_ms: Option<u64>,

    /// Fixed observer position fed to the session when no live source exists.
    #[serde(default)]
    pub observer_location: Option<Coordinates>,

    // Advanced BLE Settings
    #[serde(default = "default_sundial_service_uuid")]
    pub ble_sundial_service_uuid: String,
    #[serde(default = "default_location_service_uuid")]
    pub ble_location_service_uuid: String,
    #[serde(default = "default_azimuth_uuid")]
    pub ble_azimuth_char_uuid: String,
    #[serde(default = "default_altitude_uuid")]
    pub ble_altitude_char_uuid: String,
    #[serde(default = "default_north_uuid")]
    pub ble_north_char_uuid: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            poll_interval_ms: default_poll_interval_ms(),
            transport_timeout_ms: None,
            observer_location: None,
            ble_sundial_service_uuid: default_sundial_service_uuid(),
            ble_location_service_uuid: default_location_service_uuid(),
            ble_azimuth_char_uuid: default_azimuth_uuid(),
            ble_altitude_char_uuid: default_altitude_uuid(),
            ble_north_char_uuid: default_north_uuid(),
        }
    }
}

impl Settings {
    /// Build the session configuration, parsing the identifier overrides.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let identifiers = GattIdentifiers {
            sundial_service: parse_uuid(&self.ble_sundial_service_uuid)?,
            location_service: parse_uuid(&self.ble_location_service_uuid)?,
            azimuth: parse_uuid(&self.ble_azimuth_char_uuid)?,
            altitude: parse_uuid(&self.ble_altitude_char_uuid)?,
            magnetic_north: parse_uuid(&self.ble_north_char_uuid)?,
        };

        Ok(SessionConfig {
            identifiers,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            call_timeout: self.transport_timeout_ms.map(Duration::from_millis),
        })
    }
}

fn parse_uuid(value: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| anyhow::anyhow!("Invalid UUID '{}': {}", value, e))
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_sundial_service_uuid() -> String {
    protocol::SUNDIAL_SERVICE_UUID.to_string()
}
fn default_location_service_uuid() -> String {
    protocol::LOCATION_SERVICE_UUID.to_string()
}
fn default_azimuth_uuid() -> String {
    protocol::AZIMUTH_CHAR_UUID.to_string()
}
fn default_altitude_uuid() -> String {
    protocol::ALTITUDE_CHAR_UUID.to_string()
}
fn default_north_uuid() -> String {
    protocol::NORTH_CHAR_UUID.to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when missing or unreadable.
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("Using default settings ({}): {}", settings_path.display(), e);
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("SundialHost");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}
