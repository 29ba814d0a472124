//! Per-player input storage: the bounded frame history and the small queue
//! of reports that have not been assigned to a frame yet.

use std::collections::{HashMap, VecDeque};

use padrelay_protocol::PluginKind;

/// The input for one frame of one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInput {
    pub buttons: u32,
    pub plugin: PluginKind,
}

impl FrameInput {
    /// What a frame holds when nothing was ever known about it.
    pub const ABSENT: Self = Self {
        buttons: 0,
        plugin: PluginKind::ABSENT,
    };
}

// ---------------------------------------------------------------------------
// InputHistory
// ---------------------------------------------------------------------------

/// Frame inputs keyed by frame counter, evicting in insertion order.
///
/// Frame counters only grow for the lifetime of a session, so the first
/// inserted frame is also the one least likely to be asked for again.
#[derive(Debug)]
pub struct InputHistory {
    frames: HashMap<u32, FrameInput>,
    order: VecDeque<u32>,
    capacity: usize,
}

impl InputHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, frame: u32) -> Option<FrameInput> {
        self.frames.get(&frame).copied()
    }

    pub fn contains(&self, frame: u32) -> bool {
        self.frames.contains_key(&frame)
    }

    /// Stores `input` for `frame`, replacing any previous value in place.
    pub fn insert(&mut self, frame: u32, input: FrameInput) {
        if let Some(existing) = self.frames.get_mut(&frame) {
            *existing = input;
            return;
        }
        self.frames.insert(frame, input);
        self.order.push_back(frame);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.frames.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// PendingInputs
// ---------------------------------------------------------------------------

/// FIFO of fresh input reports waiting for a frame to claim them.
///
/// When full, new reports are dropped and the older ones kept.
#[derive(Debug)]
pub struct PendingInputs {
    queue: VecDeque<FrameInput>,
    capacity: usize,
}

impl PendingInputs {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queues a report. Returns `false` if the queue was full.
    pub fn push(&mut self, input: FrameInput) -> bool {
        if self.queue.len() >= self.capacity {
            return false;
        }
        self.queue.push_back(input);
        true
    }

    pub fn pop(&mut self) -> Option<FrameInput> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
