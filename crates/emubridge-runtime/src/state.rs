//! Server-owned state shared by every connection and the decision callback.

use std::path::{Path, PathBuf};

use emubridge_syntax::SetTarget;
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::config::{BridgeConfig, EmulatorSettings, ScreenshotSettings};
use crate::controls::Controls;
use crate::error::RuntimeError;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::saves::SaveStates;
use crate::screenshot::{Frame, ScreenshotStore};
use crate::store::VariableStore;
use crate::value::{parse_bool, render_bool, VarType};

/// Names served from bridge fields rather than the variable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserved {
    Controls,
    Rom,
    Save,
    UpdateInterval,
    Speed,
    Frameskip,
    Sound,
    Guessed,
    Actions,
    Exit,
    Restart,
}

/// Write-protected without being served by `GET`; reads fall through to the store.
const SCREENSHOTS: &str = "screenshots";

impl Reserved {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "controls" => Self::Controls,
            "rom" => Self::Rom,
            "save" => Self::Save,
            "update_interval" => Self::UpdateInterval,
            "speed" => Self::Speed,
            "frameskip" => Self::Frameskip,
            "sound" => Self::Sound,
            "guessed" => Self::Guessed,
            "actions" => Self::Actions,
            "exit" => Self::Exit,
            "restart" => Self::Restart,
            _ => return None,
        })
    }
}

#[derive(Debug)]
pub struct BridgeState {
    emulator: EmulatorSettings,
    screenshot_settings: ScreenshotSettings,
    lifecycle: Lifecycle,
    guessed: bool,
    save: Option<PathBuf>,
    saves: SaveStates,
    controls: Controls,
    variables: VariableStore,
    screenshots: ScreenshotStore,
}

impl BridgeState {
    pub fn from_config(config: &BridgeConfig) -> Result<Self, RuntimeError> {
        let saves = SaveStates::new(config.saves.clone(), config.seed)?;
        Ok(Self::new(
            config.emulator.clone(),
            config.screenshots,
            config.controls.controls(),
            saves,
        ))
    }

    #[must_use]
    pub fn new(
        emulator: EmulatorSettings,
        screenshot_settings: ScreenshotSettings,
        controls: Controls,
        saves: SaveStates,
    ) -> Self {
        let mut state = Self {
            emulator,
            screenshot_settings,
            lifecycle: Lifecycle::default(),
            guessed: true,
            save: None,
            saves,
            controls,
            variables: VariableStore::new(),
            screenshots: ScreenshotStore::new(),
        };
        state.load_save();
        state
    }

    /// Resolves `GET name[ idx]`. Misses are `UnknownVariable`, rendered as `None` on the wire.
    ///
    /// `restart` and `exit` are read-and-clear.
    pub fn get(&mut self, name: &str, index: Option<usize>) -> Result<String, RuntimeError> {
        let Some(reserved) = Reserved::parse(name) else {
            return self.variables.render(name, index);
        };
        if let Some(index) = index {
            return Err(RuntimeError::UnknownVariable(
                format!("{name}[{index}]").into(),
            ));
        }
        Ok(match reserved {
            Reserved::Controls => self.controls.render(),
            Reserved::Rom => self
                .emulator
                .rom
                .as_deref()
                .map(|rom| rom.display().to_string())
                .unwrap_or_default(),
            Reserved::Save => self
                .save
                .as_deref()
                .map(|save| save.display().to_string())
                .unwrap_or_default(),
            Reserved::UpdateInterval => self.emulator.update_interval.to_string(),
            Reserved::Speed => self.emulator.speed.to_string(),
            Reserved::Frameskip => self.emulator.frameskip.to_string(),
            Reserved::Sound => render_bool(self.emulator.sound).to_string(),
            Reserved::Guessed => render_bool(self.guessed).to_string(),
            Reserved::Actions => self.lifecycle.actions().to_string(),
            Reserved::Exit => render_bool(self.lifecycle.take_exit()).to_string(),
            Reserved::Restart => render_bool(self.lifecycle.take_restart()).to_string(),
        })
    }

    /// Applies `SET name <target> <value>`.
    pub fn set(
        &mut self,
        name: &str,
        target: SetTarget<'_>,
        value: &str,
    ) -> Result<(), RuntimeError> {
        match Reserved::parse(name) {
            Some(Reserved::Restart) => {
                let restart = match target {
                    SetTarget::Bare => parse_bool(value)?,
                    SetTarget::Tag(tag) if VarType::parse(tag) == Some(VarType::Bool) => {
                        parse_bool(value)?
                    }
                    SetTarget::Tag(tag) => {
                        return Err(RuntimeError::TypeMismatch(
                            format!("restart is a Bool, not {tag}").into(),
                        ));
                    }
                    SetTarget::Index(_) => {
                        return Err(RuntimeError::TypeMismatch("restart is not a list".into()));
                    }
                };
                self.set_restart(restart);
                Ok(())
            }
            Some(_) => Err(RuntimeError::ReadOnly(SmolStr::new(name))),
            None if name == SCREENSHOTS => Err(RuntimeError::ReadOnly(SmolStr::new(name))),
            None => match target {
                SetTarget::Tag(tag) => self.variables.declare(name, tag, value),
                SetTarget::Index(index) => self.variables.set_element(name, index, value),
                SetTarget::Bare => Err(RuntimeError::MalformedStatement(
                    format!("SET {name} needs a type tag or list index").into(),
                )),
            },
        }
    }

    /// One `UPDATE` tick. Returns the new action count.
    pub fn tick(&mut self) -> u64 {
        self.lifecycle.tick()
    }

    /// Stores a frame at the current action counter, replacing any earlier frame there.
    pub fn store_screenshot(&mut self, frame: Frame) -> u64 {
        let action = self.lifecycle.actions();
        if self.screenshots.insert(action, frame).is_some() {
            debug!("bridge screenshot at action {action} overwritten");
        }
        action
    }

    /// Wire `RESET`: clears variables, screenshots, counters and flags.
    pub fn reset_data(&mut self) {
        self.variables.clear();
        self.screenshots.clear();
        self.lifecycle.reset();
        info!("bridge state reset");
    }

    /// Starts a new episode and picks the save state the emulator should load next.
    pub fn new_episode(&mut self) {
        if self.lifecycle.new_episode() {
            self.load_save();
            info!(
                "bridge episode {} requested, save={:?}",
                self.lifecycle.episodes(),
                self.save
            );
        } else {
            debug!("bridge new episode ignored: client is exiting");
        }
    }

    pub fn exit_client(&mut self) {
        self.lifecycle.exit_client();
        info!(
            "bridge client exit requested after {} episodes",
            self.lifecycle.episodes()
        );
    }

    pub fn set_restart(&mut self, restart: bool) {
        self.lifecycle.set_restart(restart);
    }

    pub fn set_guessed(&mut self, guessed: bool) {
        self.guessed = guessed;
    }

    fn load_save(&mut self) {
        self.save = self.saves.pick().map(Path::to_path_buf);
    }

    #[must_use]
    pub fn actions(&self) -> u64 {
        self.lifecycle.actions()
    }

    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.lifecycle.episodes()
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    #[must_use]
    pub fn restart_pending(&self) -> bool {
        self.lifecycle.restart()
    }

    #[must_use]
    pub fn exiting(&self) -> bool {
        self.lifecycle.state() == LifecycleState::Exiting
    }

    #[must_use]
    pub fn guessed(&self) -> bool {
        self.guessed
    }

    #[must_use]
    pub fn save(&self) -> Option<&Path> {
        self.save.as_deref()
    }

    #[must_use]
    pub fn emulator(&self) -> &EmulatorSettings {
        &self.emulator
    }

    #[must_use]
    pub fn grayscale(&self) -> bool {
        self.screenshot_settings.grayscale
    }

    #[must_use]
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    #[must_use]
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    #[must_use]
    pub fn screenshots(&self) -> &ScreenshotStore {
        &self.screenshots
    }
}
