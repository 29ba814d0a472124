//! Tunables for the input sync engine.

use serde::{Deserialize, Serialize};

/// Configuration for one room's [`InputSyncServer`](crate::InputSyncServer).
///
/// Every threshold is a tunable rather than a protocol constant, the
/// defaults match what current clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Frames of input history kept per player before the oldest is evicted.
    pub history_capacity: usize,

    /// Fresh input reports held per player until a frame claims them.
    pub pending_capacity: usize,

    /// Send-ahead window a player starts with.
    pub initial_buffer_size: u32,

    /// Client-side queue depth the window controller steers toward.
    pub buffer_target: u8,

    /// The window never shrinks below this. Also sent to clients on
    /// registration so they can size their own buffers.
    pub buffer_floor: u8,

    /// Control ticks without an input request before a player is dropped.
    pub liveness_threshold_ticks: u32,

    /// Distinct VI counts remembered for desync detection before the table
    /// is flushed.
    pub sync_record_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            history_capacity: 5000,
            pending_capacity: 2,
            initial_buffer_size: 3,
            buffer_target: 2,
            buffer_floor: 1,
            liveness_threshold_ticks: 40,
            sync_record_capacity: 500,
        }
    }
}
