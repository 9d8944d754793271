//! Bridge configuration loading.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::controls::{ControlProfile, ControlValue};
use crate::error::RuntimeError;
use crate::saves::SaveState;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:1337";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = 8;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Emulator speed is a percentage; the emulator caps it here.
pub const MAX_SPEED: u32 = 6399;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub server: ServerSettings,
    pub emulator: EmulatorSettings,
    pub screenshots: ScreenshotSettings,
    pub controls: ControlProfile,
    pub saves: Vec<SaveState>,
    pub actions: Vec<(SmolStr, Vec<ControlValue>)>,
    pub seed: Option<u64>,
    pub log_level: SmolStr,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub address: SmolStr,
    pub read_timeout: Duration,
    pub max_unwrap_depth: usize,
    pub max_body_bytes: usize,
}

/// Values the emulator polls at startup through reserved `GET` names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorSettings {
    /// Frames between two `UPDATE`s.
    pub update_interval: u32,
    pub frameskip: u32,
    pub sound: bool,
    pub speed: u32,
    pub rom: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenshotSettings {
    pub grayscale: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: SmolStr::new(DEFAULT_ADDRESS),
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_unwrap_depth: DEFAULT_MAX_UNWRAP_DEPTH,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            update_interval: 5,
            frameskip: 1,
            sound: false,
            speed: MAX_SPEED,
            rom: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            emulator: EmulatorSettings::default(),
            screenshots: ScreenshotSettings::default(),
            controls: ControlProfile::default(),
            saves: Vec::new(),
            actions: Vec::new(),
            seed: None,
            log_level: SmolStr::new("info"),
        }
    }
}

impl BridgeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| {
                name.to_string_lossy().into_owned()
            });
        let text = std::fs::read_to_string(path)
            .map_err(|err| RuntimeError::InvalidConfig(format!("{file_name}: {err}").into()))?;
        parse_bridge_toml_from_text(&text, &file_name)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RuntimeError> {
        parse_bridge_toml_from_text(text, "emubridge.toml")
    }
}

fn parse_bridge_toml_from_text(
    text: &str,
    file_name: &str,
) -> Result<BridgeConfig, RuntimeError> {
    let raw: BridgeToml = toml::from_str(text)
        .map_err(|err| RuntimeError::InvalidConfig(format!("{file_name}: {err}").into()))?;
    raw.into_config().map_err(|err| prefix_invalid_config(file_name, err))
}

fn prefix_invalid_config(file_name: &str, err: RuntimeError) -> RuntimeError {
    match err {
        RuntimeError::InvalidConfig(message) => {
            RuntimeError::InvalidConfig(format!("{file_name}: {message}").into())
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BridgeToml {
    seed: Option<u64>,
    server: Option<ServerSection>,
    emulator: Option<EmulatorSection>,
    screenshots: Option<ScreenshotSection>,
    log: Option<LogSection>,
    #[serde(default)]
    saves: Vec<SaveSection>,
    #[serde(default)]
    actions: Vec<ActionSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    address: Option<String>,
    read_timeout_ms: Option<u64>,
    max_unwrap_depth: Option<usize>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmulatorSection {
    update_interval: Option<u32>,
    frameskip: Option<u32>,
    sound: Option<bool>,
    speed: Option<u32>,
    rom: Option<String>,
    controls: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScreenshotSection {
    grayscale: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LogSection {
    level: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveSection {
    path: String,
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActionSection {
    control: String,
    values: Vec<toml::Value>,
}

impl BridgeToml {
    fn into_config(self) -> Result<BridgeConfig, RuntimeError> {
        let defaults = BridgeConfig::default();

        let server = match self.server {
            Some(section) => section.into_settings()?,
            None => defaults.server,
        };

        let (emulator, controls) = match self.emulator {
            Some(section) => section.into_settings()?,
            None => (defaults.emulator, defaults.controls),
        };

        let screenshots = ScreenshotSettings {
            grayscale: self
                .screenshots
                .and_then(|section| section.grayscale)
                .unwrap_or(defaults.screenshots.grayscale),
        };

        let log_level = match self.log {
            Some(section) => {
                if section.level.trim().is_empty() {
                    return Err(RuntimeError::InvalidConfig(
                        "log.level must not be empty".into(),
                    ));
                }
                SmolStr::new(section.level.trim())
            }
            None => defaults.log_level,
        };

        let saves = self
            .saves
            .into_iter()
            .map(SaveSection::into_save)
            .collect::<Result<Vec<_>, _>>()?;

        let actions = self
            .actions
            .into_iter()
            .map(ActionSection::into_candidates)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BridgeConfig {
            server,
            emulator,
            screenshots,
            controls,
            saves,
            actions,
            seed: self.seed,
            log_level,
        })
    }
}

impl ServerSection {
    fn into_settings(self) -> Result<ServerSettings, RuntimeError> {
        let defaults = ServerSettings::default();
        let address = match self.address {
            Some(address) if address.trim().is_empty() => {
                return Err(RuntimeError::InvalidConfig(
                    "server.address must not be empty".into(),
                ));
            }
            Some(address) => SmolStr::new(address.trim()),
            None => defaults.address,
        };
        let read_timeout = match self.read_timeout_ms {
            Some(0) => {
                return Err(RuntimeError::InvalidConfig(
                    "server.read_timeout_ms must be >= 1".into(),
                ));
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.read_timeout,
        };
        let max_unwrap_depth = match self.max_unwrap_depth {
            Some(0) => {
                return Err(RuntimeError::InvalidConfig(
                    "server.max_unwrap_depth must be >= 1".into(),
                ));
            }
            Some(depth) => depth,
            None => defaults.max_unwrap_depth,
        };
        let max_body_bytes = match self.max_body_bytes {
            Some(0) => {
                return Err(RuntimeError::InvalidConfig(
                    "server.max_body_bytes must be >= 1".into(),
                ));
            }
            Some(bytes) => bytes,
            None => defaults.max_body_bytes,
        };
        Ok(ServerSettings {
            address,
            read_timeout,
            max_unwrap_depth,
            max_body_bytes,
        })
    }
}

impl EmulatorSection {
    fn into_settings(self) -> Result<(EmulatorSettings, ControlProfile), RuntimeError> {
        let defaults = EmulatorSettings::default();
        let update_interval = self.update_interval.unwrap_or(defaults.update_interval);
        if update_interval == 0 {
            return Err(RuntimeError::InvalidConfig(
                "emulator.update_interval must be >= 1".into(),
            ));
        }
        let speed = self.speed.unwrap_or(defaults.speed);
        if !(1..=MAX_SPEED).contains(&speed) {
            return Err(RuntimeError::InvalidConfig(
                format!("emulator.speed must be within 1..={MAX_SPEED}, got {speed}").into(),
            ));
        }
        let controls = match self.controls.as_deref() {
            Some(name) => ControlProfile::parse(name).ok_or_else(|| {
                RuntimeError::InvalidConfig(
                    format!("invalid emulator.controls '{name}' (expected n64, nes, none)").into(),
                )
            })?,
            None => ControlProfile::default(),
        };
        let rom = self
            .rom
            .filter(|rom| !rom.trim().is_empty())
            .map(PathBuf::from);
        Ok((
            EmulatorSettings {
                update_interval,
                frameskip: self.frameskip.unwrap_or(defaults.frameskip),
                sound: self.sound.unwrap_or(defaults.sound),
                speed,
                rom,
            },
            controls,
        ))
    }
}

impl SaveSection {
    fn into_save(self) -> Result<SaveState, RuntimeError> {
        if self.path.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "saves.path must not be empty".into(),
            ));
        }
        let weight = self.weight.unwrap_or(1.0);
        if !weight.is_finite() || weight <= 0.0 {
            return Err(RuntimeError::InvalidConfig(
                format!("saves.weight for '{}' must be > 0", self.path).into(),
            ));
        }
        Ok(SaveState {
            path: PathBuf::from(self.path),
            weight,
        })
    }
}

impl ActionSection {
    fn into_candidates(self) -> Result<(SmolStr, Vec<ControlValue>), RuntimeError> {
        if self.control.trim().is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "actions.control must not be empty".into(),
            ));
        }
        if self.values.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                format!("actions.values for '{}' must not be empty", self.control).into(),
            ));
        }
        let values = self
            .values
            .iter()
            .map(|value| match value {
                toml::Value::Boolean(pressed) => Ok(ControlValue::Button(*pressed)),
                toml::Value::Integer(axis) => i32::try_from(*axis)
                    .map(ControlValue::Axis)
                    .map_err(|_| {
                        RuntimeError::InvalidConfig(
                            format!("actions.values for '{}': {axis} out of range", self.control)
                                .into(),
                        )
                    }),
                other => Err(RuntimeError::InvalidConfig(
                    format!(
                        "actions.values for '{}' must be booleans or integers, got {}",
                        self.control,
                        other.type_str()
                    )
                    .into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let buttons = values
            .iter()
            .filter(|value| matches!(value, ControlValue::Button(_)))
            .count();
        if buttons != 0 && buttons != values.len() {
            return Err(RuntimeError::InvalidConfig(
                format!(
                    "actions.values for '{}' mixes booleans and integers",
                    self.control
                )
                .into(),
            ));
        }
        Ok((SmolStr::new(self.control.trim()), values))
    }
}
