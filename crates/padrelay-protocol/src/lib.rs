//! Wire protocol for padrelay.
//!
//! This crate defines the two protocols a netplay client speaks to a room:
//!
//! - **UDP** ([`UdpMessage`], [`InputResponse`]): per-frame controller input,
//!   input requests and state-hash reports. One datagram is one message.
//! - **TCP** ([`TcpRequest`], [`RequestCodec`], [`TcpResponse`]): one-time
//!   registration and shared blob distribution over a byte stream.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets or rooms. It turns bytes
//! into typed messages and back:
//!
//! ```text
//! Transport (bytes) → Protocol (UdpMessage / TcpRequest) → Room (state)
//! ```

mod error;
mod tcp;
mod types;
mod udp;

pub use error::ProtocolError;
pub use tcp::{
    CONTROLLER_SETTINGS_LEN, CUSTOM_SLOTS, GFX_SETTINGS_LEN, RegisterRequest, Registration,
    RequestCodec, TcpRequest, TcpResponse,
};
pub use types::{MAX_PLAYERS, PlayerSlot, PluginKind, RoomStatus};
pub use udp::{
    FrameEntry, InputReport, InputRequest, InputResponse, SNAPSHOT_LEN, StateHashReport,
    UdpMessage,
};
