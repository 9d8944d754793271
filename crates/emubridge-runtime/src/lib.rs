//! Runtime for the emubridge emulator protocol.
//!
//! An emulator script connects over TCP and drives the bridge with `UPDATE`, `RESET`,
//! `GET`, `SET` and `POST` statements. The bridge keeps typed variables, per-action
//! screenshots, controller state and the episode lifecycle, and calls a user-supplied
//! callback on every `UPDATE` so a policy can decide the next controller input.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use emubridge_runtime::{Bridge, BridgeConfig, BridgeServer};
//!
//! # fn main() -> Result<(), emubridge_runtime::error::RuntimeError> {
//! let config = BridgeConfig::load("emubridge.toml")?;
//! let bridge = Arc::new(Bridge::configure(&config)?);
//! bridge.on_update(|state| {
//!     if state.actions() >= 600 {
//!         state.new_episode();
//!     }
//! });
//! let _server = BridgeServer::start(Arc::clone(&bridge))?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod action_map;
pub mod bridge;
pub mod config;
pub mod controls;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod saves;
pub mod screenshot;
pub mod server;
pub mod state;
pub mod store;
pub mod transport;
pub mod value;

pub use action_map::{action_space, action_space_size, build_action_map, ActionId, ActionMap};
pub use bridge::{Bridge, UpdateCallback};
pub use config::BridgeConfig;
pub use controls::{ControlAssignment, ControlProfile, ControlValue, Controls};
pub use error::RuntimeError;
pub use lifecycle::LifecycleState;
pub use screenshot::{Frame, ScreenshotStore};
pub use server::BridgeServer;
pub use state::BridgeState;
pub use value::{Value, VarType};
