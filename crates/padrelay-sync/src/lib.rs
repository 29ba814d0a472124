//! Real-time input synchronization for padrelay rooms.
//!
//! This crate is the UDP half of a room, minus the socket: it decides what
//! every input request is answered with.
//!
//! # Key types
//!
//! - [`InputSyncServer`]: per-room state machine fed with decoded datagrams
//!   and control ticks
//! - [`SyncEvent`]: desync, disconnect and "room is empty" notifications
//!   for the room coordinator
//! - [`SyncConfig`]: history capacity, window target/floor, liveness
//!   threshold
//! - [`InputHistory`], [`PendingInputs`], [`BufferControl`], [`SyncRecords`]:
//!   the building blocks, usable on their own

mod config;
mod desync;
mod flow;
mod frame;
mod history;
mod server;

pub use config::SyncConfig;
pub use desync::{SyncCheck, SyncRecords};
pub use flow::BufferControl;
pub use history::{FrameInput, InputHistory, PendingInputs};
pub use server::{DisconnectReason, InputSyncServer, SyncEvent};
