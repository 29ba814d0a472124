//! The UDP input protocol.
//!
//! Every datagram starts with a type byte. Multi-byte integers are
//! big-endian, which is also what `bytes::Buf::get_u32` reads by default.
//!
//! ```text
//! 0  client → server  [0][player][frame:4][buttons:4][plugin]              11 bytes
//! 2  client → server  [2][player][reg_id:4][frame:4][spectator][health]    12 bytes
//! 4  client → server  [4][vi_count:4][snapshot:128]                       133 bytes
//! 1  server → client  [1][player][status][lag][tally] + tally × 9 bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{PlayerSlot, PluginKind, ProtocolError, RoomStatus};

/// Size of the machine-state snapshot carried by a state-hash report.
pub const SNAPSHOT_LEN: usize = 128;

const KIND_INPUT_REPORT: u8 = 0;
const KIND_INPUT_RESPONSE: u8 = 1;
const KIND_INPUT_REQUEST: u8 = 2;
const KIND_STATE_HASH: u8 = 4;

// ---------------------------------------------------------------------------
// Client messages
// ---------------------------------------------------------------------------

/// A controller sample a player reports for one of its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReport {
    pub slot: PlayerSlot,
    pub frame: u32,
    pub buttons: u32,
    pub plugin: PluginKind,
}

/// A request for the input stream of `slot`, starting at `frame`.
///
/// `reg_id` identifies the requester for liveness tracking. It is
/// unrelated to `slot`: every client requests every slot's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRequest {
    pub slot: PlayerSlot,
    pub reg_id: u32,
    pub frame: u32,
    pub spectator: bool,
    pub buffer_health: u8,
}

/// A client's hash input: its emulated machine state at one VI count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateHashReport {
    pub vi_count: u32,
    pub snapshot: [u8; SNAPSHOT_LEN],
}

/// Any datagram a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdpMessage {
    InputReport(InputReport),
    InputRequest(InputRequest),
    StateHash(StateHashReport),
}

impl UdpMessage {
    const INPUT_REPORT_LEN: usize = 11;
    const INPUT_REQUEST_LEN: usize = 12;
    const STATE_HASH_LEN: usize = 5 + SNAPSHOT_LEN;

    /// Parses one datagram.
    ///
    /// Trailing bytes past the fixed layout are ignored, older clients pad
    /// their datagrams.
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        let Some(&kind) = datagram.first() else {
            return Err(ProtocolError::Truncated {
                kind: "empty",
                needed: 1,
                got: 0,
            });
        };

        match kind {
            KIND_INPUT_REPORT => {
                let mut buf = check_len(datagram, Self::INPUT_REPORT_LEN, "input report")?;
                let slot = read_slot(&mut buf)?;
                Ok(Self::InputReport(InputReport {
                    slot,
                    frame: buf.get_u32(),
                    buttons: buf.get_u32(),
                    plugin: PluginKind(buf.get_u8()),
                }))
            }
            KIND_INPUT_REQUEST => {
                let mut buf = check_len(datagram, Self::INPUT_REQUEST_LEN, "input request")?;
                let slot = read_slot(&mut buf)?;
                Ok(Self::InputRequest(InputRequest {
                    slot,
                    reg_id: buf.get_u32(),
                    frame: buf.get_u32(),
                    spectator: buf.get_u8() != 0,
                    buffer_health: buf.get_u8(),
                }))
            }
            KIND_STATE_HASH => {
                let mut buf = check_len(datagram, Self::STATE_HASH_LEN, "state hash")?;
                let vi_count = buf.get_u32();
                let mut snapshot = [0u8; SNAPSHOT_LEN];
                buf.copy_to_slice(&mut snapshot);
                Ok(Self::StateHash(StateHashReport { vi_count, snapshot }))
            }
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }

    /// Serializes the message the way a client would send it.
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::STATE_HASH_LEN);
        match self {
            Self::InputReport(report) => {
                out.put_u8(KIND_INPUT_REPORT);
                out.put_u8(report.slot.as_byte());
                out.put_u32(report.frame);
                out.put_u32(report.buttons);
                out.put_u8(report.plugin.0);
            }
            Self::InputRequest(request) => {
                out.put_u8(KIND_INPUT_REQUEST);
                out.put_u8(request.slot.as_byte());
                out.put_u32(request.reg_id);
                out.put_u32(request.frame);
                out.put_u8(u8::from(request.spectator));
                out.put_u8(request.buffer_health);
            }
            Self::StateHash(report) => {
                out.put_u8(KIND_STATE_HASH);
                out.put_u32(report.vi_count);
                out.put_slice(&report.snapshot);
            }
        }
        out.freeze()
    }
}

/// Checks the fixed length and returns a cursor positioned after the type byte.
fn check_len<'a>(
    datagram: &'a [u8],
    needed: usize,
    kind: &'static str,
) -> Result<&'a [u8], ProtocolError> {
    if datagram.len() < needed {
        return Err(ProtocolError::Truncated {
            kind,
            needed,
            got: datagram.len(),
        });
    }
    Ok(&datagram[1..needed])
}

fn read_slot(buf: &mut &[u8]) -> Result<PlayerSlot, ProtocolError> {
    let raw = buf.get_u8();
    PlayerSlot::new(raw).ok_or(ProtocolError::InvalidPlayer(raw))
}

// ---------------------------------------------------------------------------
// Server response
// ---------------------------------------------------------------------------

/// One frame of input in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEntry {
    pub frame: u32,
    pub buttons: u32,
    pub plugin: PluginKind,
}

/// The server's answer to an [`InputRequest`]: a window of consecutive frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputResponse {
    pub slot: PlayerSlot,
    pub status: RoomStatus,
    /// How far the requested frame trails the slot's lead count.
    pub lag: u8,
    pub entries: Vec<FrameEntry>,
}

impl InputResponse {
    pub const HEADER_LEN: usize = 5;
    pub const ENTRY_LEN: usize = 9;
    /// Entries are appended while the write cursor is below this offset.
    pub const CURSOR_LIMIT: usize = 500;
    /// The most entries a single response can carry.
    pub const MAX_ENTRIES: usize = (Self::CURSOR_LIMIT - Self::HEADER_LEN).div_ceil(Self::ENTRY_LEN);

    pub fn encode(&self) -> Bytes {
        let count = self.entries.len().min(Self::MAX_ENTRIES);
        let mut out = BytesMut::with_capacity(Self::HEADER_LEN + count * Self::ENTRY_LEN);
        out.put_u8(KIND_INPUT_RESPONSE);
        out.put_u8(self.slot.as_byte());
        out.put_u8(self.status.as_byte());
        out.put_u8(self.lag);
        out.put_u8(count as u8);
        for entry in &self.entries[..count] {
            out.put_u32(entry.frame);
            out.put_u32(entry.buttons);
            out.put_u8(entry.plugin.0);
        }
        out.freeze()
    }

    /// Parses a response datagram, as a client would.
    pub fn decode(datagram: &[u8]) -> Result<Self, ProtocolError> {
        if datagram.first() != Some(&KIND_INPUT_RESPONSE) {
            return Err(ProtocolError::UnknownKind(
                datagram.first().copied().unwrap_or_default(),
            ));
        }
        let mut buf = check_len(datagram, Self::HEADER_LEN, "input response")?;
        let slot = read_slot(&mut buf)?;
        let status = RoomStatus::from_byte(buf.get_u8());
        let lag = buf.get_u8();
        let tally = buf.get_u8() as usize;

        let needed = Self::HEADER_LEN + tally * Self::ENTRY_LEN;
        let mut buf = check_len(datagram, needed, "input response")?;
        buf.advance(Self::HEADER_LEN - 1);
        let entries = (0..tally)
            .map(|_| FrameEntry {
                frame: buf.get_u32(),
                buttons: buf.get_u32(),
                plugin: PluginKind(buf.get_u8()),
            })
            .collect();

        Ok(Self {
            slot,
            status,
            lag,
            entries,
        })
    }
}
