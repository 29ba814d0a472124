//! The registry: everything a room shares over TCP.
//!
//! `Registry` is owned by the room actor and touched only from its task,
//! so it is a plain struct with no locking. Requests come in tagged with
//! the [`ConnectionId`] they arrived on; answers go out through that
//! connection's [`OutboundTx`].
//!
//! # Parked downloads
//!
//! A download for something that does not exist yet is not an error. The
//! request is parked and every later mutation (upload, registration,
//! expected-count change) retries all parked requests in arrival order:
//!
//! ```text
//! download("rom") ──→ missing ──→ parked ─┐
//!                                         │  upload("rom")
//!                                         ▼
//!                                  answered, unparked
//! ```
//!
//! Parked requests die with their connection, or after the download
//! timeout via [`Registry::expire_parked`].

use std::collections::{HashMap, VecDeque};
use std::collections::vec_deque::Drain;
use std::time::{Duration, Instant};

use bytes::Bytes;
use padrelay_protocol::{PlayerSlot, PluginKind, Registration, TcpRequest, TcpResponse};
use padrelay_transport::{ConnectionId, OutboundTx};

use crate::{BlobKey, BlobStore, RegisterOutcome, RegistrationTable};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something the room actor has to forward to the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A slot was registered for the first time.
    PlayerRegistered {
        slot: PlayerSlot,
        reg_id: u32,
        plugin: PluginKind,
        raw: u8,
    },
    /// A client announced it is leaving. The table is not touched; the
    /// room vacates the slot once the sync engine has dropped the player.
    DisconnectNotice { reg_id: u32 },
}

// ---------------------------------------------------------------------------
// Parked requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Awaited {
    Blob(BlobKey),
    /// Every expected client has registered.
    Registrations,
}

#[derive(Debug)]
struct Parked {
    conn: ConnectionId,
    awaited: Awaited,
    since: Instant,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct Registry {
    store: BlobStore,
    table: RegistrationTable,
    expected_clients: Option<usize>,
    /// Sent back with every registration answer.
    buffer_floor: u8,
    connections: HashMap<ConnectionId, OutboundTx>,
    parked: Vec<Parked>,
    events: VecDeque<RegistryEvent>,
}

impl Registry {
    pub fn new(buffer_floor: u8) -> Self {
        Self {
            store: BlobStore::new(),
            table: RegistrationTable::new(),
            expected_clients: None,
            buffer_floor,
            connections: HashMap::new(),
            parked: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Starts answering requests from `conn` through `outbound`.
    pub fn connect(&mut self, conn: ConnectionId, outbound: OutboundTx) {
        self.connections.insert(conn, outbound);
    }

    /// Forgets `conn` along with everything it still had parked.
    ///
    /// Returns how many parked requests were dropped.
    pub fn disconnect(&mut self, conn: ConnectionId) -> usize {
        self.connections.remove(&conn);
        let before = self.parked.len();
        self.parked.retain(|p| p.conn != conn);
        let dropped = before - self.parked.len();
        if dropped > 0 {
            tracing::debug!(%conn, dropped, "dropped parked requests of closed connection");
        }
        dropped
    }

    /// Applies one decoded request from `conn`.
    pub fn handle(&mut self, conn: ConnectionId, request: TcpRequest, now: Instant) {
        match request {
            TcpRequest::UploadFile { name, data } => self.upload(BlobKey::File(name), data),
            TcpRequest::UploadControllerSettings(data) => {
                self.upload(BlobKey::ControllerSettings, data)
            }
            TcpRequest::UploadGfxSettings(data) => self.upload(BlobKey::GfxSettings, data),
            TcpRequest::UploadCustom { slot, data } => self.upload(BlobKey::Custom(slot), data),

            TcpRequest::DownloadFile { name } => {
                self.download(conn, Awaited::Blob(BlobKey::File(name)), now)
            }
            TcpRequest::DownloadControllerSettings => {
                self.download(conn, Awaited::Blob(BlobKey::ControllerSettings), now)
            }
            TcpRequest::DownloadGfxSettings => {
                self.download(conn, Awaited::Blob(BlobKey::GfxSettings), now)
            }
            TcpRequest::DownloadCustom { slot } => {
                self.download(conn, Awaited::Blob(BlobKey::Custom(slot)), now)
            }
            TcpRequest::DownloadRegistrations => self.download(conn, Awaited::Registrations, now),

            TcpRequest::Register(request) => {
                let outcome = self.table.register(&request);
                match outcome {
                    RegisterOutcome::Accepted { slot, registration } => {
                        tracing::info!(
                            %slot,
                            reg_id = registration.reg_id,
                            plugin = %registration.plugin,
                            raw = registration.raw,
                            "slot registered"
                        );
                        self.events.push_back(RegistryEvent::PlayerRegistered {
                            slot,
                            reg_id: registration.reg_id,
                            plugin: registration.plugin,
                            raw: registration.raw,
                        });
                    }
                    RegisterOutcome::AlreadyRegistered => {
                        tracing::debug!(player = request.player, reg_id = request.reg_id, "re-registration");
                    }
                    RegisterOutcome::Rejected => {
                        tracing::warn!(
                            player = request.player,
                            reg_id = request.reg_id,
                            "registration rejected"
                        );
                    }
                }
                self.send(
                    conn,
                    TcpResponse::Registered {
                        accepted: outcome.is_accepted(),
                        buffer_floor: self.buffer_floor,
                    },
                );
                if matches!(outcome, RegisterOutcome::Accepted { .. }) {
                    self.retry_parked();
                }
            }

            TcpRequest::DisconnectNotice { reg_id } => {
                tracing::debug!(%conn, reg_id, "disconnect notice");
                self.events.push_back(RegistryEvent::DisconnectNotice { reg_id });
            }

            TcpRequest::Unknown(tag) => {
                tracing::debug!(%conn, tag, "ignoring unknown request tag");
            }
        }
    }

    /// Sets how many registrations a registration download waits for.
    pub fn set_expected_clients(&mut self, count: usize) {
        self.expected_clients = Some(count);
        self.retry_parked();
    }

    pub fn expected_clients(&self) -> Option<usize> {
        self.expected_clients
    }

    /// Frees a slot after its player was dropped, if `reg_id` still holds it.
    pub fn vacate(&mut self, slot: PlayerSlot, reg_id: u32) -> bool {
        let vacated = self.table.vacate(slot, reg_id).is_some();
        if vacated {
            tracing::info!(%slot, reg_id, "slot vacated");
            self.retry_parked();
        }
        vacated
    }

    /// Drops parked requests that have waited longer than `timeout`.
    ///
    /// The connections stay open. Returns how many were dropped.
    pub fn expire_parked(&mut self, now: Instant, timeout: Duration) -> usize {
        let before = self.parked.len();
        self.parked.retain(|p| {
            let keep = now.saturating_duration_since(p.since) < timeout;
            if !keep {
                tracing::info!(conn = %p.conn, awaited = ?p.awaited, "download timed out");
            }
            keep
        });
        before - self.parked.len()
    }

    pub fn drain_events(&mut self) -> Drain<'_, RegistryEvent> {
        self.events.drain(..)
    }

    pub fn registered_count(&self) -> usize {
        self.table.count()
    }

    pub fn registration(&self, slot: PlayerSlot) -> Option<Registration> {
        self.table.get(slot)
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn buffer_floor(&self) -> u8 {
        self.buffer_floor
    }

    // -- internals ---------------------------------------------------------

    fn upload(&mut self, key: BlobKey, data: Bytes) {
        let size = data.len();
        let replaced = self.store.put(key.clone(), data);
        tracing::info!(%key, size, replaced, "upload received");
        self.retry_parked();
    }

    fn download(&mut self, conn: ConnectionId, awaited: Awaited, now: Instant) {
        match self.resolve(&awaited) {
            Some(response) => self.send(conn, response),
            None => {
                tracing::debug!(%conn, ?awaited, "download parked");
                self.parked.push(Parked {
                    conn,
                    awaited,
                    since: now,
                });
            }
        }
    }

    fn resolve(&self, awaited: &Awaited) -> Option<TcpResponse> {
        match awaited {
            Awaited::Blob(key) => self.store.get(key).map(TcpResponse::Blob),
            Awaited::Registrations => self
                .expected_clients
                .is_some_and(|n| self.table.count() == n)
                .then(|| TcpResponse::Registrations(self.table.snapshot())),
        }
    }

    fn retry_parked(&mut self) {
        if self.parked.is_empty() {
            return;
        }
        for parked in std::mem::take(&mut self.parked) {
            match self.resolve(&parked.awaited) {
                Some(response) => {
                    tracing::debug!(conn = %parked.conn, awaited = ?parked.awaited, "parked download answered");
                    self.send(parked.conn, response);
                }
                None => self.parked.push(parked),
            }
        }
    }

    fn send(&self, conn: ConnectionId, response: TcpResponse) {
        let Some(outbound) = self.connections.get(&conn) else {
            tracing::debug!(%conn, "answer for unknown connection dropped");
            return;
        };
        if outbound.send(response.encode()).is_err() {
            tracing::debug!(%conn, "connection writer gone, answer dropped");
        }
    }
}
