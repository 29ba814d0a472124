//! The input sync engine for one room.
//!
//! [`InputSyncServer`] is a plain state machine: it never touches a socket
//! or a clock. The room actor feeds it decoded datagrams and control ticks,
//! sends back whatever response it returns, and drains its event queue
//! after every call.

use std::collections::{HashMap, VecDeque};
use std::collections::vec_deque::Drain;

use padrelay_protocol::{
    FrameEntry, InputReport, InputRequest, InputResponse, MAX_PLAYERS, PlayerSlot, PluginKind,
    RoomStatus, StateHashReport,
};

use crate::desync::{SyncCheck, SyncRecords};
use crate::flow::BufferControl;
use crate::frame;
use crate::history::{FrameInput, InputHistory, PendingInputs};
use crate::SyncConfig;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a player was dropped from the liveness table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No input request for longer than the liveness threshold.
    TimedOut,
    /// The client announced it is leaving.
    Notice,
}

/// Something the room coordinator has to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Two players reported different machine states for the same VI count.
    /// Emitted at most once per room.
    Desynced { vi_count: u32 },
    /// A registered player is gone. Its status bit is already set.
    PlayerDisconnected {
        reg_id: u32,
        slot: PlayerSlot,
        reason: DisconnectReason,
    },
    /// The last registered player is gone; the room should close.
    RoomEmpty,
}

// ---------------------------------------------------------------------------
// Per-player state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct PlayerInputs {
    history: InputHistory,
    pending: PendingInputs,
    buffer: BufferControl,
    /// Highest frame a non-spectator has requested for this slot.
    lead_count: u32,
}

impl PlayerInputs {
    fn new(config: &SyncConfig) -> Self {
        Self {
            history: InputHistory::new(config.history_capacity),
            pending: PendingInputs::new(config.pending_capacity),
            buffer: BufferControl::new(config.initial_buffer_size),
            lead_count: 0,
        }
    }

    /// Returns the input for `frame`, assigning one first if the frame has
    /// never been seen: the oldest pending report, else a repeat of the
    /// previous frame, else the absent sentinel.
    fn resolve(&mut self, frame: u32) -> FrameInput {
        if let Some(input) = self.history.get(frame) {
            return input;
        }
        let input = self
            .pending
            .pop()
            .or_else(|| self.history.get(frame.wrapping_sub(1)))
            .unwrap_or(FrameInput::ABSENT);
        self.history.insert(frame, input);
        input
    }
}

#[derive(Debug, Clone, Copy)]
struct Liveness {
    slot: PlayerSlot,
    missed_ticks: u32,
}

// ---------------------------------------------------------------------------
// InputSyncServer
// ---------------------------------------------------------------------------

/// UDP-side state of one room: input histories, send-ahead windows,
/// liveness and desync detection.
#[derive(Debug)]
pub struct InputSyncServer {
    config: SyncConfig,
    players: [PlayerInputs; MAX_PLAYERS],
    /// Registered players keyed by registration id.
    liveness: HashMap<u32, Liveness>,
    records: SyncRecords,
    status: RoomStatus,
    events: VecDeque<SyncEvent>,
}

impl InputSyncServer {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            players: std::array::from_fn(|_| PlayerInputs::new(&config)),
            liveness: HashMap::new(),
            records: SyncRecords::new(config.sync_record_capacity),
            status: RoomStatus::default(),
            events: VecDeque::new(),
            config,
        }
    }

    /// Takes a player registered over TCP into the liveness table and seeds
    /// its history with frame 0.
    pub fn register_player(&mut self, reg_id: u32, slot: PlayerSlot, plugin: PluginKind) {
        self.liveness.insert(
            reg_id,
            Liveness {
                slot,
                missed_ticks: 0,
            },
        );
        self.players[slot.index()]
            .history
            .insert(0, FrameInput { buttons: 0, plugin });
        tracing::info!(%slot, reg_id, %plugin, "player registered");
    }

    /// Queues a fresh controller sample. Never answered.
    pub fn handle_input_report(&mut self, report: InputReport) {
        let accepted = self.players[report.slot.index()].pending.push(FrameInput {
            buttons: report.buttons,
            plugin: report.plugin,
        });
        if !accepted {
            tracing::trace!(slot = %report.slot, frame = report.frame, "pending queue full, report dropped");
        }
    }

    /// Answers an input request with a window of consecutive frames.
    ///
    /// Returns `None` when not a single frame qualifies; nothing is sent then.
    pub fn handle_input_request(&mut self, request: InputRequest) -> Option<InputResponse> {
        if let Some(liveness) = self.liveness.get_mut(&request.reg_id) {
            liveness.missed_ticks = 0;
        }

        let player = &mut self.players[request.slot.index()];
        if !request.spectator && frame::is_at_or_after(request.frame, player.lead_count) {
            player.lead_count = request.frame;
            player.buffer.report_health(request.buffer_health);
        }

        let lag = frame::lag_behind(player.lead_count, request.frame);
        let stream_ahead = !request.spectator && lag == 0;
        let window_end = request.frame.wrapping_add(player.buffer.size());

        let mut entries = Vec::new();
        let mut current = request.frame;
        while entries.len() < InputResponse::MAX_ENTRIES {
            let in_window = stream_ahead && frame::is_before(current, window_end);
            if !in_window && !player.history.contains(current) {
                break;
            }
            let input = player.resolve(current);
            entries.push(FrameEntry {
                frame: current,
                buttons: input.buttons,
                plugin: input.plugin,
            });
            current = current.wrapping_add(1);
        }

        if entries.is_empty() {
            return None;
        }
        Some(InputResponse {
            slot: request.slot,
            status: self.status,
            lag: u8::try_from(lag).unwrap_or(u8::MAX),
            entries,
        })
    }

    /// Compares a machine-state snapshot against the first one seen for the
    /// same VI count. Ignored once the room is desynced.
    pub fn handle_state_hash(&mut self, report: &StateHashReport) {
        if self.status.is_desynced() {
            return;
        }
        if let SyncCheck::Mismatch { expected, actual } =
            self.records.check(report.vi_count, &report.snapshot)
        {
            self.status.mark_desynced();
            tracing::warn!(
                vi_count = report.vi_count,
                expected,
                actual,
                "machine states diverged"
            );
            self.events.push_back(SyncEvent::Desynced {
                vi_count: report.vi_count,
            });
        }
    }

    /// One control-loop step: adjusts every send-ahead window, then ages
    /// every liveness counter and drops the players that ran out.
    pub fn on_control_tick(&mut self) {
        let ceiling = InputResponse::MAX_ENTRIES as u32;
        for (index, player) in self.players.iter_mut().enumerate() {
            if let Some(size) =
                player
                    .buffer
                    .adjust(self.config.buffer_target, self.config.buffer_floor, ceiling)
            {
                tracing::trace!(slot = index, size, "send-ahead window adjusted");
            }
        }

        let threshold = self.config.liveness_threshold_ticks;
        let mut expired: Vec<u32> = self
            .liveness
            .iter_mut()
            .filter_map(|(reg_id, liveness)| {
                liveness.missed_ticks += 1;
                (liveness.missed_ticks > threshold).then_some(*reg_id)
            })
            .collect();
        expired.sort_unstable();

        for reg_id in expired {
            self.disconnect(reg_id, DisconnectReason::TimedOut);
        }
    }

    /// Drops a player after an explicit disconnect notice.
    ///
    /// Returns `false` if `reg_id` was not registered (or already dropped).
    pub fn disconnect_player(&mut self, reg_id: u32) -> bool {
        self.disconnect(reg_id, DisconnectReason::Notice)
    }

    fn disconnect(&mut self, reg_id: u32, reason: DisconnectReason) -> bool {
        let Some(liveness) = self.liveness.remove(&reg_id) else {
            return false;
        };
        self.status.mark_disconnected(liveness.slot);
        tracing::info!(slot = %liveness.slot, reg_id, ?reason, "player disconnected");
        self.events.push_back(SyncEvent::PlayerDisconnected {
            reg_id,
            slot: liveness.slot,
            reason,
        });
        if self.liveness.is_empty() {
            self.events.push_back(SyncEvent::RoomEmpty);
        }
        true
    }

    /// Drains the events produced since the last call.
    pub fn drain_events(&mut self) -> Drain<'_, SyncEvent> {
        self.events.drain(..)
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn is_desynced(&self) -> bool {
        self.status.is_desynced()
    }

    pub fn registered_count(&self) -> usize {
        self.liveness.len()
    }

    pub fn is_registered(&self, reg_id: u32) -> bool {
        self.liveness.contains_key(&reg_id)
    }

    pub fn lead_count(&self, slot: PlayerSlot) -> u32 {
        self.players[slot.index()].lead_count
    }

    pub fn buffer_size(&self, slot: PlayerSlot) -> u32 {
        self.players[slot.index()].buffer.size()
    }

    pub fn history_len(&self, slot: PlayerSlot) -> usize {
        self.players[slot.index()].history.len()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
