//! # padrelay
//!
//! Relay server for emulator netplay. Each game session is a *room*: one
//! UDP socket that keeps up to four players' controller input in sync, and
//! one TCP listener on the same port where clients register for a slot and
//! exchange settings and save files before play starts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use padrelay::prelude::*;
//!
//! # async fn run() -> Result<(), PadrelayError> {
//! let server = RelayServer::builder()
//!     .port(45000)
//!     .expected_clients(2)
//!     .build()
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

mod error;
mod server;

pub use error::PadrelayError;
pub use server::{RelayServer, RelayServerBuilder};

pub use padrelay_protocol as protocol;
pub use padrelay_registry as registry;
pub use padrelay_room as room;
pub use padrelay_sync as sync;
pub use padrelay_tick as tick;
pub use padrelay_transport as transport;

/// The types most embedders need.
pub mod prelude {
    pub use crate::{PadrelayError, RelayServer, RelayServerBuilder};
    pub use padrelay_protocol::{PlayerSlot, PluginKind, RoomStatus};
    pub use padrelay_room::{
        LobbyCommand, LobbyEvent, RoomConfig, RoomError, RoomInfo, RoomManager, RoomState,
    };
    pub use padrelay_sync::SyncConfig;
    pub use padrelay_tick::TickConfig;
}
