//! Registration and asset exchange for padrelay rooms.
//!
//! This is the TCP half of a room, minus the sockets. Clients use it once,
//! before play starts, to:
//!
//! 1. **Register** for a controller slot ([`RegistrationTable`])
//! 2. **Share blobs**: named files, controller and graphics settings, and
//!    64 custom data slots ([`BlobStore`])
//! 3. **Wait** for each other: downloads of anything not uploaded yet are
//!    parked and answered as soon as the value appears
//!
//! # How it fits in the stack
//!
//! ```text
//! Room actor (above)      ← feeds requests in, drains RegistryEvents out
//!     ↕
//! Registry (this crate)   ← shared room state, parked downloads, replies
//!     ↕
//! Transport (below)       ← ConnectionId, per-connection OutboundTx
//! ```

mod registry;
mod store;
mod table;

pub use registry::{Registry, RegistryEvent};
pub use store::{BlobKey, BlobStore};
pub use table::{RegisterOutcome, RegistrationTable};
