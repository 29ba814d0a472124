//! Room lifecycle management for padrelay.
//!
//! A room binds one UDP socket and one TCP listener to the same port and
//! runs as an isolated Tokio task (actor model) that owns the room's
//! [`InputSyncServer`](padrelay_sync::InputSyncServer) and
//! [`Registry`](padrelay_registry::Registry). Rooms share nothing; a
//! failure in one never touches another.
//!
//! # Key types
//!
//! - [`RoomManager`]: creates rooms by port, routes lobby commands
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomState`]: lifecycle state machine
//! - [`RoomConfig`]: timers, limits and engine tuning
//! - [`LobbyEvent`] / [`LobbyCommand`]: the boundary with the lobby

mod config;
mod error;
mod event;
mod manager;
mod room;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use event::{LobbyCommand, LobbyEvent};
pub use manager::RoomManager;
pub use room::{RoomHandle, RoomInfo};
