//! The TCP registration and asset protocol.
//!
//! TCP gives us a byte stream, not messages, so requests are decoded with a
//! [`tokio_util::codec::Decoder`]: the framed reader keeps unconsumed bytes
//! in its buffer and calls [`RequestCodec::decode`] again once more arrive.
//! `Ok(None)` means "not enough bytes yet".
//!
//! ```text
//! tag  payload                                      answer
//!   1  name\0 size:4 bytes                          none
//!   2  name\0                                       raw file bytes
//!   3  20-byte controller settings                  none
//!   4  -                                            20 bytes
//!   5  player plugin raw reg_id:4                   accepted floor
//!   6  -                                            4 × [reg_id:4 plugin raw]
//!   7  reg_id:4                                     none
//!   8  92-byte graphics settings                    none
//!   9  -                                            92 bytes
//!  64..=127   size:4 bytes    (custom slot tag-64)  none
//! 128..=191   -               (custom slot tag-128) raw slot bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{MAX_PLAYERS, PlayerSlot, PluginKind, ProtocolError};

pub const CONTROLLER_SETTINGS_LEN: usize = 20;
pub const GFX_SETTINGS_LEN: usize = 92;
/// Number of custom data slots.
pub const CUSTOM_SLOTS: u8 = 64;

const TAG_UPLOAD_FILE: u8 = 1;
const TAG_DOWNLOAD_FILE: u8 = 2;
const TAG_UPLOAD_CONTROLLER_SETTINGS: u8 = 3;
const TAG_DOWNLOAD_CONTROLLER_SETTINGS: u8 = 4;
const TAG_REGISTER: u8 = 5;
const TAG_DOWNLOAD_REGISTRATIONS: u8 = 6;
const TAG_DISCONNECT_NOTICE: u8 = 7;
const TAG_UPLOAD_GFX_SETTINGS: u8 = 8;
const TAG_DOWNLOAD_GFX_SETTINGS: u8 = 9;
const TAG_UPLOAD_CUSTOM: u8 = 64;
const TAG_DOWNLOAD_CUSTOM: u8 = TAG_UPLOAD_CUSTOM + CUSTOM_SLOTS;

const REGISTER_LEN: usize = 7;
const REG_ID_LEN: usize = 4;
const SIZE_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A registration request as it arrives on the wire.
///
/// `player` is left unvalidated: an out-of-range slot is answered with a
/// rejection rather than tearing the connection down. `raw` is relayed to
/// the other clients byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest {
    pub player: u8,
    pub plugin: PluginKind,
    pub raw: u8,
    pub reg_id: u32,
}

/// Every request a client can make over TCP.
///
/// File names are opaque bytes. Clients derive them from ROM header text,
/// which is not necessarily UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpRequest {
    UploadFile { name: Bytes, data: Bytes },
    DownloadFile { name: Bytes },
    UploadControllerSettings(Bytes),
    DownloadControllerSettings,
    Register(RegisterRequest),
    DownloadRegistrations,
    DisconnectNotice { reg_id: u32 },
    UploadGfxSettings(Bytes),
    DownloadGfxSettings,
    UploadCustom { slot: u8, data: Bytes },
    DownloadCustom { slot: u8 },
    /// A tag this server does not understand. Only the tag byte is consumed.
    Unknown(u8),
}

impl TcpRequest {
    /// Appends the request's wire form to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        match self {
            Self::UploadFile { name, data } => {
                dst.put_u8(TAG_UPLOAD_FILE);
                put_filename(dst, name);
                dst.put_u32(data.len() as u32);
                dst.put_slice(data);
            }
            Self::DownloadFile { name } => {
                dst.put_u8(TAG_DOWNLOAD_FILE);
                put_filename(dst, name);
            }
            Self::UploadControllerSettings(data) => {
                dst.put_u8(TAG_UPLOAD_CONTROLLER_SETTINGS);
                put_fixed(dst, data, CONTROLLER_SETTINGS_LEN);
            }
            Self::DownloadControllerSettings => dst.put_u8(TAG_DOWNLOAD_CONTROLLER_SETTINGS),
            Self::Register(req) => {
                dst.put_u8(TAG_REGISTER);
                dst.put_u8(req.player);
                dst.put_u8(req.plugin.0);
                dst.put_u8(req.raw);
                dst.put_u32(req.reg_id);
            }
            Self::DownloadRegistrations => dst.put_u8(TAG_DOWNLOAD_REGISTRATIONS),
            Self::DisconnectNotice { reg_id } => {
                dst.put_u8(TAG_DISCONNECT_NOTICE);
                dst.put_u32(*reg_id);
            }
            Self::UploadGfxSettings(data) => {
                dst.put_u8(TAG_UPLOAD_GFX_SETTINGS);
                put_fixed(dst, data, GFX_SETTINGS_LEN);
            }
            Self::DownloadGfxSettings => dst.put_u8(TAG_DOWNLOAD_GFX_SETTINGS),
            Self::UploadCustom { slot, data } => {
                dst.put_u8(TAG_UPLOAD_CUSTOM + slot % CUSTOM_SLOTS);
                dst.put_u32(data.len() as u32);
                dst.put_slice(data);
            }
            Self::DownloadCustom { slot } => {
                dst.put_u8(TAG_DOWNLOAD_CUSTOM + slot % CUSTOM_SLOTS);
            }
            Self::Unknown(tag) => dst.put_u8(*tag),
        }
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadFile { .. } => "upload-file",
            Self::DownloadFile { .. } => "download-file",
            Self::UploadControllerSettings(_) => "upload-controller-settings",
            Self::DownloadControllerSettings => "download-controller-settings",
            Self::Register(_) => "register",
            Self::DownloadRegistrations => "download-registrations",
            Self::DisconnectNotice { .. } => "disconnect-notice",
            Self::UploadGfxSettings(_) => "upload-gfx-settings",
            Self::DownloadGfxSettings => "download-gfx-settings",
            Self::UploadCustom { .. } => "upload-custom",
            Self::DownloadCustom { .. } => "download-custom",
            Self::Unknown(_) => "unknown",
        }
    }
}

fn put_filename(dst: &mut BytesMut, name: &[u8]) {
    dst.put_slice(name);
    dst.put_u8(0);
}

/// Writes exactly `len` bytes, zero-padding or truncating `data`.
fn put_fixed(dst: &mut BytesMut, data: &[u8], len: usize) {
    let n = data.len().min(len);
    dst.put_slice(&data[..n]);
    dst.put_bytes(0, len - n);
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Incremental decoder for [`TcpRequest`]s.
///
/// Also implements `Encoder<TcpRequest>` so a client can drive the same
/// protocol through a `FramedWrite`.
#[derive(Debug, Clone)]
pub struct RequestCodec {
    max_blob_size: usize,
    max_filename_len: usize,
}

impl RequestCodec {
    pub const DEFAULT_MAX_FILENAME_LEN: usize = 1024;

    pub fn new(max_blob_size: usize) -> Self {
        Self {
            max_blob_size,
            max_filename_len: Self::DEFAULT_MAX_FILENAME_LEN,
        }
    }

    /// Looks for a complete NUL-terminated filename at the start of `buf`.
    ///
    /// Returns the name's length without the terminator.
    fn peek_filename(&self, buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
        match buf.iter().position(|b| *b == 0) {
            Some(len) if len > self.max_filename_len => {
                Err(ProtocolError::FilenameTooLong(self.max_filename_len))
            }
            Some(len) => Ok(Some(len)),
            None if buf.len() > self.max_filename_len => {
                Err(ProtocolError::FilenameTooLong(self.max_filename_len))
            }
            None => Ok(None),
        }
    }

    /// Decodes a `size:4` + bytes body starting at `offset`.
    ///
    /// On success the whole frame (`offset + 4 + size` bytes) is consumed
    /// and the body is returned.
    fn take_sized_body(
        &self,
        src: &mut BytesMut,
        offset: usize,
    ) -> Result<Option<Bytes>, ProtocolError> {
        if src.len() < offset + SIZE_LEN {
            return Ok(None);
        }
        let mut size_bytes = &src[offset..offset + SIZE_LEN];
        let size = size_bytes.get_u32() as usize;
        if size > self.max_blob_size {
            return Err(ProtocolError::BlobTooLarge {
                size,
                limit: self.max_blob_size,
            });
        }

        let total = offset + SIZE_LEN + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(offset + SIZE_LEN);
        Ok(Some(src.split_to(size).freeze()))
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new(16 * 1024 * 1024)
    }
}

/// Consumes the tag byte plus `len` payload bytes once they are all buffered.
fn take_fixed(src: &mut BytesMut, len: usize) -> Option<Bytes> {
    if src.len() < 1 + len {
        return None;
    }
    src.advance(1);
    Some(src.split_to(len).freeze())
}

impl Decoder for RequestCodec {
    type Item = TcpRequest;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TcpRequest>, ProtocolError> {
        let Some(&tag) = src.first() else {
            return Ok(None);
        };

        let request = match tag {
            TAG_UPLOAD_FILE => {
                let Some(len) = self.peek_filename(&src[1..])? else {
                    return Ok(None);
                };
                let name = Bytes::copy_from_slice(&src[1..1 + len]);
                let Some(data) = self.take_sized_body(src, 1 + len + 1)? else {
                    return Ok(None);
                };
                TcpRequest::UploadFile { name, data }
            }
            TAG_DOWNLOAD_FILE => {
                let Some(len) = self.peek_filename(&src[1..])? else {
                    return Ok(None);
                };
                src.advance(1);
                let name = src.split_to(len).freeze();
                src.advance(1);
                TcpRequest::DownloadFile { name }
            }
            TAG_UPLOAD_CONTROLLER_SETTINGS => match take_fixed(src, CONTROLLER_SETTINGS_LEN) {
                Some(data) => TcpRequest::UploadControllerSettings(data),
                None => return Ok(None),
            },
            TAG_UPLOAD_GFX_SETTINGS => match take_fixed(src, GFX_SETTINGS_LEN) {
                Some(data) => TcpRequest::UploadGfxSettings(data),
                None => return Ok(None),
            },
            TAG_REGISTER => {
                let Some(mut body) = take_fixed(src, REGISTER_LEN) else {
                    return Ok(None);
                };
                TcpRequest::Register(RegisterRequest {
                    player: body.get_u8(),
                    plugin: PluginKind(body.get_u8()),
                    raw: body.get_u8(),
                    reg_id: body.get_u32(),
                })
            }
            TAG_DISCONNECT_NOTICE => {
                let Some(mut body) = take_fixed(src, REG_ID_LEN) else {
                    return Ok(None);
                };
                TcpRequest::DisconnectNotice {
                    reg_id: body.get_u32(),
                }
            }
            TAG_UPLOAD_CUSTOM..TAG_DOWNLOAD_CUSTOM => {
                let Some(data) = self.take_sized_body(src, 1)? else {
                    return Ok(None);
                };
                TcpRequest::UploadCustom {
                    slot: tag - TAG_UPLOAD_CUSTOM,
                    data,
                }
            }
            _ => {
                src.advance(1);
                match tag {
                    TAG_DOWNLOAD_CONTROLLER_SETTINGS => TcpRequest::DownloadControllerSettings,
                    TAG_DOWNLOAD_REGISTRATIONS => TcpRequest::DownloadRegistrations,
                    TAG_DOWNLOAD_GFX_SETTINGS => TcpRequest::DownloadGfxSettings,
                    t if (TAG_DOWNLOAD_CUSTOM..TAG_DOWNLOAD_CUSTOM + CUSTOM_SLOTS).contains(&t) => {
                        TcpRequest::DownloadCustom {
                            slot: t - TAG_DOWNLOAD_CUSTOM,
                        }
                    }
                    other => TcpRequest::Unknown(other),
                }
            }
        };

        Ok(Some(request))
    }
}

impl Encoder<TcpRequest> for RequestCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: TcpRequest, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        item.encode_into(dst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// One slot of the registration table as it is sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub reg_id: u32,
    pub plugin: PluginKind,
    pub raw: u8,
}

/// Everything the server ever writes back over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpResponse {
    Registered { accepted: bool, buffer_floor: u8 },
    Registrations([Option<Registration>; MAX_PLAYERS]),
    /// File, settings and custom downloads: the stored bytes, unframed.
    Blob(Bytes),
}

impl TcpResponse {
    pub const REGISTRATIONS_LEN: usize = MAX_PLAYERS * 6;

    pub fn encode(&self) -> Bytes {
        match self {
            Self::Registered {
                accepted,
                buffer_floor,
            } => Bytes::copy_from_slice(&[u8::from(*accepted), *buffer_floor]),
            Self::Registrations(table) => {
                let mut out = BytesMut::with_capacity(Self::REGISTRATIONS_LEN);
                for slot in PlayerSlot::all() {
                    match &table[slot.index()] {
                        Some(reg) => {
                            out.put_u32(reg.reg_id);
                            out.put_u8(reg.plugin.0);
                            out.put_u8(reg.raw);
                        }
                        None => out.put_bytes(0, 6),
                    }
                }
                out.freeze()
            }
            Self::Blob(data) => data.clone(),
        }
    }
}
