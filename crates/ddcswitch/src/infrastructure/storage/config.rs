//! TOML-based configuration persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\DdcSwitch\config.toml`
//! - Linux:    `~/.config/ddcswitch/config.toml`
//! - macOS:    `~/Library/Application Support/DdcSwitch/config.toml`
//!
//! A different file can be used with `ddcswitch --config <path>` (or the
//! `DDCSWITCH_CONFIG` environment variable); see [`load_config_from`].
//!
//! # File layout
//!
//! ```toml
//! cycle_order = ["DisplayPort", "USB-C", "HDMI1", "HDMI2"]
//!
//! [general]
//! log_level = "info"
//!
//! [ddc]
//! i2c_source_addr = "0x50"
//! debounce_ms = 750
//! settle_ms = 700
//!
//! [hotkeys]
//! cycle = "CTRL+ALT+1"
//!
//! [hotkeys.direct]
//! HDMI1 = "CTRL+ALT+4"
//!
//! [[targets]]
//! adapter = 5
//! display = 0
//!
//! [[inputs]]
//! label = "HDMI1"
//! code = "0x90"
//! ```
//!
//! Input codes and the sub-address are strings so they can be written in
//! hex.  They are read with C `strtoul` rules: `0x` prefix for hex, a leading
//! `0` for octal, decimal otherwise.
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]` helper, so a partial file
//! (or an old file missing newer fields) loads with the remaining values at
//! their defaults.  A missing file loads as [`AppConfig::default()`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ddcswitch_core::{
    parse_code, parse_number, HotkeyError, HotkeySpec, InputDefinition, InputSet, InputSetError,
    SettlePolicy, Target,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::switch_input::SwitchSettings;

/// Target used when the file lists none.
const FALLBACK_TARGET: Target = Target::new(5, 0);

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Two `[[inputs]]` entries share a label.
    #[error("duplicate input label in config: {0}")]
    DuplicateInputLabel(String),

    /// An input code is not a number.
    #[error("input {label:?} has invalid code {code:?}")]
    InvalidCode { label: String, code: String },

    /// `i2c_source_addr` is not a number in `0..=0xFF`.
    #[error("invalid i2c_source_addr {0:?}: expected a byte such as \"0x50\"")]
    InvalidSubaddress(String),

    /// A hotkey string does not parse.
    #[error("invalid hotkey for {name}: {source}")]
    InvalidHotkey {
        name: String,
        #[source]
        source: HotkeyError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Labels in the order the cycle action visits them.
    #[serde(default = "default_cycle_order")]
    pub cycle_order: Vec<String>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ddc: DdcConfig,
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    /// Monitors as `(adapter, display)`.  Only the first is driven.
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetEntry>,
    #[serde(default = "default_inputs")]
    pub inputs: Vec<InputEntry>,
}

/// General behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Kept for front ends that show a notification after each switch.
    #[serde(default = "default_true")]
    pub show_notifications: bool,
    /// Kept for front ends that register themselves to start at login.
    #[serde(default)]
    pub start_with_windows: bool,
}

/// DDC/CI addressing and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DdcConfig {
    /// Sub-address byte.  `"0x50"` for LG monitors, `"0x51"` for standard DDC/CI.
    #[serde(default = "default_i2c_source_addr")]
    pub i2c_source_addr: String,
    /// Requests closer together than this are dropped.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Pause after each switch while the monitor re-syncs.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Also pause after a failed write.
    #[serde(default = "default_true")]
    pub settle_after_failure: bool,
}

/// Hotkey strings such as `"CTRL+ALT+1"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotkeyConfig {
    #[serde(default = "default_cycle_hotkey")]
    pub cycle: String,
    /// Input label → hotkey.
    #[serde(default = "default_direct_hotkeys")]
    pub direct: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetEntry {
    pub adapter: i32,
    pub display: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputEntry {
    pub label: String,
    /// Numeric code as written, e.g. `"0xD0"`.
    pub code: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

const DEFAULT_INPUTS: [(&str, &str); 4] = [
    ("DisplayPort", "0xD0"),
    ("USB-C", "0xD1"),
    ("HDMI1", "0x90"),
    ("HDMI2", "0x91"),
];

fn default_cycle_order() -> Vec<String> {
    DEFAULT_INPUTS.iter().map(|(l, _)| l.to_string()).collect()
}
fn default_targets() -> Vec<TargetEntry> {
    vec![TargetEntry {
        adapter: FALLBACK_TARGET.adapter_index,
        display: FALLBACK_TARGET.display_index,
    }]
}
fn default_inputs() -> Vec<InputEntry> {
    DEFAULT_INPUTS
        .iter()
        .map(|(label, code)| InputEntry {
            label: label.to_string(),
            code: code.to_string(),
        })
        .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_i2c_source_addr() -> String {
    "0x50".to_string()
}
fn default_debounce_ms() -> u64 {
    750
}
fn default_settle_ms() -> u64 {
    700
}
fn default_cycle_hotkey() -> String {
    "CTRL+ALT+1".to_string()
}
fn default_direct_hotkeys() -> BTreeMap<String, String> {
    DEFAULT_INPUTS
        .iter()
        .zip(2..)
        .map(|((label, _), n)| (label.to_string(), format!("CTRL+ALT+{n}")))
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cycle_order: default_cycle_order(),
            general: GeneralConfig::default(),
            ddc: DdcConfig::default(),
            hotkeys: HotkeyConfig::default(),
            targets: default_targets(),
            inputs: default_inputs(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            show_notifications: default_true(),
            start_with_windows: false,
        }
    }
}

impl Default for DdcConfig {
    fn default() -> Self {
        Self {
            i2c_source_addr: default_i2c_source_addr(),
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
            settle_after_failure: default_true(),
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            cycle: default_cycle_hotkey(),
            direct: default_direct_hotkeys(),
        }
    }
}

// ── Validation and conversion ─────────────────────────────────────────────────

impl AppConfig {
    /// The monitor to drive: the first `[[targets]]` entry, or `5:0`.
    pub fn primary_target(&self) -> Target {
        match self.targets.first() {
            Some(entry) => Target::new(entry.adapter, entry.display),
            None => {
                warn!("no targets configured; falling back to {FALLBACK_TARGET}");
                FALLBACK_TARGET
            }
        }
    }

    /// Parses `ddc.i2c_source_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSubaddress`] unless the value is a
    /// number in `0..=0xFF`.
    pub fn subaddress(&self) -> Result<u8, ConfigError> {
        parse_subaddress(&self.ddc.i2c_source_addr)
    }

    /// Parses every `[[inputs]]` entry and orders them by `cycle_order`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCode`] or
    /// [`ConfigError::DuplicateInputLabel`].
    pub fn input_set(&self) -> Result<InputSet, ConfigError> {
        let definitions = self
            .inputs
            .iter()
            .map(|entry| {
                parse_code(&entry.code)
                    .map(|code| InputDefinition::new(entry.label.clone(), code))
                    .map_err(|_| ConfigError::InvalidCode {
                        label: entry.label.clone(),
                        code: entry.code.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for label in &self.cycle_order {
            if !definitions.iter().any(|d| &d.label == label) {
                warn!("cycle_order names unknown input {label:?}; skipping it");
            }
        }

        InputSet::ordered(definitions, &self.cycle_order).map_err(|e| match e {
            InputSetError::DuplicateLabel(label) => ConfigError::DuplicateInputLabel(label),
            InputSetError::InvalidCode(code) => ConfigError::InvalidCode {
                label: String::new(),
                code,
            },
        })
    }

    /// Parses every hotkey string.
    ///
    /// Direct hotkeys naming an input that is not configured are logged and
    /// returned anyway; pressing them reports an unknown input.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHotkey`] for the first string that does
    /// not parse.
    pub fn parsed_hotkeys(&self) -> Result<Vec<(String, HotkeySpec)>, ConfigError> {
        let parse = |name: &str, text: &str| {
            HotkeySpec::parse(text).map_err(|source| ConfigError::InvalidHotkey {
                name: name.to_owned(),
                source,
            })
        };

        let mut parsed = vec![("cycle".to_owned(), parse("cycle", &self.hotkeys.cycle)?)];
        for (label, text) in &self.hotkeys.direct {
            if !self.inputs.iter().any(|i| &i.label == label) {
                warn!("hotkey {text:?} targets unknown input {label:?}");
            }
            parsed.push((label.clone(), parse(label, text)?));
        }
        Ok(parsed)
    }

    /// Runs every check the switcher relies on.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.subaddress()?;
        self.input_set()?;
        self.parsed_hotkeys()?;
        Ok(())
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            delay: Duration::from_millis(self.ddc.settle_ms),
            after_failure: self.ddc.settle_after_failure,
        }
    }

    /// Builds the use-case settings for the primary target.
    ///
    /// # Errors
    ///
    /// Propagates [`subaddress`](Self::subaddress) and
    /// [`input_set`](Self::input_set) failures.
    pub fn switch_settings(&self) -> Result<SwitchSettings, ConfigError> {
        Ok(SwitchSettings {
            target: self.primary_target(),
            subaddress: self.subaddress()?,
            inputs: self.input_set()?,
            debounce: Duration::from_millis(self.ddc.debounce_ms),
            settle: self.settle_policy(),
        })
    }
}

/// Parses a sub-address string such as `"0x50"`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSubaddress`] unless `text` is a number in
/// `0..=0xFF`.  Wider values are rejected, not masked.
pub fn parse_subaddress(text: &str) -> Result<u8, ConfigError> {
    parse_number(text)
        .ok()
        .and_then(|value| u8::try_from(value).ok())
        .ok_or_else(|| ConfigError::InvalidSubaddress(text.to_owned()))
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            debug!("loaded config from {}", path.display());
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}; using defaults", path.display());
            Ok(AppConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform config file.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &AppConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file_path()?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("DdcSwitch"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("ddcswitch"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DdcSwitch")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
