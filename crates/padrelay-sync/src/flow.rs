//! The adaptive send-ahead window.
//!
//! A bang-bang controller: once per control tick the window moves one frame
//! toward whatever keeps the client's reported queue depth at the target.

/// Send-ahead state for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferControl {
    size: u32,
    health: Option<u8>,
}

impl BufferControl {
    pub fn new(initial_size: u32) -> Self {
        Self {
            size: initial_size,
            health: None,
        }
    }

    /// Frames to stream ahead of a request.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Last queue depth the client reported, if any.
    pub fn health(&self) -> Option<u8> {
        self.health
    }

    pub fn report_health(&mut self, health: u8) {
        self.health = Some(health);
    }

    /// Nudges the window by at most one frame.
    ///
    /// Returns the new size if it changed. Players that never reported
    /// health are left alone.
    pub fn adjust(&mut self, target: u8, floor: u8, ceiling: u32) -> Option<u32> {
        let health = self.health?;
        let before = self.size;
        if health > target && self.size > u32::from(floor) {
            self.size -= 1;
        } else if health < target && self.size < ceiling {
            self.size += 1;
        }
        (self.size != before).then_some(self.size)
    }
}
