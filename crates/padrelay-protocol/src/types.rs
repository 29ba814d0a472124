//! Core value types shared by the UDP and TCP wire formats.
//!
//! Everything here is small and `Copy`: slot numbers, plugin kinds and the
//! room status bitmask. They travel on the wire as single bytes; the serde
//! impls exist for room info and configuration, never for packets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of controller slots in a room. Spectators are unlimited and do
/// not occupy a slot.
pub const MAX_PLAYERS: usize = 4;

// ---------------------------------------------------------------------------
// PlayerSlot
// ---------------------------------------------------------------------------

/// A controller slot index, guaranteed to be in `0..MAX_PLAYERS`.
///
/// Newtype wrapper so a raw `u8` off the wire can never index the per-player
/// arrays without going through [`PlayerSlot::new`] first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerSlot(u8);

impl PlayerSlot {
    /// Validates a raw slot byte.
    pub fn new(raw: u8) -> Option<Self> {
        ((raw as usize) < MAX_PLAYERS).then_some(Self(raw))
    }

    /// All four slots in wire order.
    pub fn all() -> impl Iterator<Item = PlayerSlot> {
        (0..MAX_PLAYERS as u8).map(PlayerSlot)
    }

    /// The slot as an array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The slot as it appears on the wire.
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PlayerSlot {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or_else(|| format!("player slot {raw} out of range"))
    }
}

impl From<PlayerSlot> for u8 {
    fn from(slot: PlayerSlot) -> u8 {
        slot.0
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Players talk about "player 1..4", logs should match.
        write!(f, "P{}", self.0 + 1)
    }
}

// ---------------------------------------------------------------------------
// PluginKind
// ---------------------------------------------------------------------------

/// Which controller accessory a player's input device emulates.
///
/// Kept as an open byte: clients may send values this server does not know
/// about and they are relayed untouched. Only the mempak restriction needs
/// to understand the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginKind(pub u8);

impl PluginKind {
    /// Controller not plugged in. Also the sentinel for never-seen frames.
    pub const ABSENT: Self = Self(0);
    pub const NONE: Self = Self(1);
    pub const MEMPAK: Self = Self(2);
    pub const RUMBLE_PAK: Self = Self(3);
    pub const TRANSFER_PAK: Self = Self(4);
    pub const RAW: Self = Self(5);

    /// Applies the slot restriction: only the first slot may own a mempak,
    /// every other slot asking for one is downgraded to [`PluginKind::NONE`].
    pub fn restricted_for(self, slot: PlayerSlot) -> Self {
        if slot.index() > 0 && self == Self::MEMPAK {
            Self::NONE
        } else {
            self
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ABSENT => write!(f, "absent"),
            Self::NONE => write!(f, "none"),
            Self::MEMPAK => write!(f, "mempak"),
            Self::RUMBLE_PAK => write!(f, "rumble-pak"),
            Self::TRANSFER_PAK => write!(f, "transfer-pak"),
            Self::RAW => write!(f, "raw"),
            Self(other) => write!(f, "plugin-{other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The status byte broadcast in every input response.
///
/// Bit 0 is the sticky desync flag, bits 1..=4 mark slots whose player has
/// disconnected. Bits are only ever set, never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomStatus(u8);

impl RoomStatus {
    const DESYNC: u8 = 0x01;

    pub fn from_byte(raw: u8) -> Self {
        Self(raw)
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn mark_desynced(&mut self) {
        self.0 |= Self::DESYNC;
    }

    pub fn is_desynced(self) -> bool {
        self.0 & Self::DESYNC != 0
    }

    pub fn mark_disconnected(&mut self, slot: PlayerSlot) {
        self.0 |= Self::disconnect_bit(slot);
    }

    pub fn is_disconnected(self, slot: PlayerSlot) -> bool {
        self.0 & Self::disconnect_bit(slot) != 0
    }

    fn disconnect_bit(slot: PlayerSlot) -> u8 {
        1 << (slot.as_byte() + 1)
    }
}
