//! Shared bridge: state, decision callback, and the configured action map.

use parking_lot::Mutex;

use crate::action_map::{build_action_map, ActionMap};
use crate::config::{BridgeConfig, ServerSettings};
use crate::error::RuntimeError;
use crate::state::BridgeState;

/// Invoked on every `UPDATE`, after the action counter advanced.
pub type UpdateCallback = Box<dyn FnMut(&mut BridgeState) + Send>;

/// Everything a connection handler needs. Share it as `Arc<Bridge>`.
///
/// Lock order is state, then callback. Neither lock is held across a socket read.
pub struct Bridge {
    settings: ServerSettings,
    action_map: ActionMap,
    state: Mutex<BridgeState>,
    callback: Mutex<Option<UpdateCallback>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("settings", &self.settings)
            .field("actions", &self.action_map.len())
            .field(
                "callback",
                &self.callback.try_lock().map(|callback| callback.is_some()),
            )
            .finish_non_exhaustive()
    }
}

impl Bridge {
    pub fn configure(config: &BridgeConfig) -> Result<Self, RuntimeError> {
        let state = BridgeState::from_config(config)?;
        let action_map = build_action_map(&config.actions);
        Ok(Self::new(config.server.clone(), state, action_map))
    }

    #[must_use]
    pub fn new(settings: ServerSettings, state: BridgeState, action_map: ActionMap) -> Self {
        Self {
            settings,
            action_map,
            state: Mutex::new(state),
            callback: Mutex::new(None),
        }
    }

    /// Installs the decision callback, replacing any previous one.
    pub fn on_update<F>(&self, callback: F)
    where
        F: FnMut(&mut BridgeState) + Send + 'static,
    {
        *self.callback.lock() = Some(Box::new(callback));
    }

    pub fn clear_update(&self) {
        self.callback.lock().take();
    }

    /// Runs `f` with exclusive access to the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut BridgeState) -> R) -> R {
        f(&mut self.state.lock())
    }

    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    #[must_use]
    pub fn action_map(&self) -> &ActionMap {
        &self.action_map
    }

    /// One `UPDATE`: advance the counter, then let the callback decide.
    pub(crate) fn update(&self) -> u64 {
        let mut state = self.state.lock();
        let actions = state.tick();
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(&mut state);
        }
        actions
    }
}
