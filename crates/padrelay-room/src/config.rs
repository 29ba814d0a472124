//! Room configuration and state machine.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use padrelay_sync::SyncConfig;
use padrelay_tick::TickConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
///
/// Missing fields deserialize to their defaults, so a config file only
/// needs to name what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Address both sockets bind to.
    pub bind_ip: IpAddr,

    /// Input sync tuning: history size, window target, liveness threshold.
    pub sync: SyncConfig,

    /// The control loop driving window adjustment and liveness.
    pub tick: TickConfig,

    /// How long a room whose expected client count is known may wait for
    /// its first registration before closing itself.
    pub registration_grace: Duration,

    /// How long a parked TCP download waits for its value.
    pub download_timeout: Duration,

    /// How often parked downloads are checked against `download_timeout`.
    pub housekeeping_interval: Duration,

    /// Largest file or custom blob a client may upload.
    pub max_blob_size: usize,

    /// Capacity of the room's command channel.
    pub command_channel_size: usize,

    /// Capacity of the channel between the sockets and the room task.
    pub inbound_channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            sync: SyncConfig::default(),
            tick: TickConfig::default(),
            registration_grace: Duration::from_secs(5 * 60),
            download_timeout: Duration::from_secs(5 * 60),
            housekeeping_interval: Duration::from_secs(1),
            max_blob_size: 16 * 1024 * 1024,
            command_channel_size: 64,
            inbound_channel_size: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// Starting → WaitingForFirstRegistration → Active → Closing → Closed
///                      │                              ▲
///                      └──────────────────────────────┘
/// ```
///
/// - **Starting**: sockets are being bound.
/// - **WaitingForFirstRegistration**: accepting traffic, nobody registered
///   yet. The zombie timer runs here once the expected count is known.
/// - **Active**: at least one player registered.
/// - **Closing**: all players gone, zombie timer fired, or shutdown
///   requested. Sockets are being closed.
/// - **Closed**: terminal. The port is free again.
///
/// Closing can be entered from any live state; everything else moves
/// strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Starting,
    WaitingForFirstRegistration,
    Active,
    Closing,
    Closed,
}

impl RoomState {
    /// The next state on the normal path, `None` once closed.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Starting => Some(Self::WaitingForFirstRegistration),
            Self::WaitingForFirstRegistration => Some(Self::Active),
            Self::Active => Some(Self::Closing),
            Self::Closing => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == Self::Closing && self.is_live())
    }

    /// Still serving traffic.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Closing | Self::Closed)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::WaitingForFirstRegistration => write!(f, "WaitingForFirstRegistration"),
            Self::Active => write!(f, "Active"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
