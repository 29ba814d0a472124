//! Room actor: one Tokio task per room that owns both protocol engines.
//!
//! The UDP receiver and the TCP accept loop run as separate tasks but only
//! decode; everything they receive is funnelled into this actor over one
//! channel, next to the lobby's commands, the control tick and the timers.
//! All room state is therefore touched from a single task.

use std::sync::Arc;

use padrelay_protocol::{RequestCodec, RoomStatus, UdpMessage};
use padrelay_registry::{Registry, RegistryEvent};
use padrelay_sync::{InputSyncServer, SyncEvent};
use padrelay_tick::TickScheduler;
use padrelay_transport::{
    InboundEvent, RoomEndpoint, run_tcp_acceptor, run_udp_receiver, send_datagram,
};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{LobbyEvent, RoomConfig, RoomError, RoomState};

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    SetExpectedClients(usize),
    GetInfo { reply: oneshot::Sender<RoomInfo> },
    Shutdown,
}

/// A snapshot of a room's bookkeeping.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub port: u16,
    pub state: RoomState,
    /// Players the sync engine currently tracks.
    pub registered_players: usize,
    pub expected_clients: Option<usize>,
    pub status: RoomStatus,
}

/// Handle to a running room actor.
///
/// Cheap to clone. The [`RoomManager`](crate::RoomManager) holds one per
/// room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    port: u16,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Tells the room how many clients to expect. Arms the zombie timer if
    /// nobody has registered yet.
    pub async fn set_expected_clients(&self, count: usize) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::SetExpectedClients(count))
            .await
            .map_err(|_| RoomError::Unavailable(self.port))
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.port))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.port))
    }

    /// Asks the room to close. Returns once the request is queued; watch for
    /// [`LobbyEvent::RoomDestroyed`] to know when the port is free.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.port))
    }

    /// `true` once the room has released its sockets.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor {
    port: u16,
    state: RoomState,
    config: RoomConfig,
    sync: InputSyncServer,
    registry: Registry,
    ticker: TickScheduler,
    /// Armed while waiting for the first registration with a known
    /// expected count.
    zombie_deadline: Option<Instant>,
    udp: Arc<UdpSocket>,
    commands: mpsc::Receiver<RoomCommand>,
    inbound: mpsc::Receiver<InboundEvent>,
    events: mpsc::UnboundedSender<LobbyEvent>,
    cancel: CancellationToken,
    io_tasks: JoinSet<()>,
}

impl RoomActor {
    async fn run(mut self, expected_clients: Option<usize>) {
        self.set_state(RoomState::WaitingForFirstRegistration);
        if let Some(count) = expected_clients {
            self.set_expected_clients(count);
        }

        let mut housekeeping = time::interval(self.config.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.state.is_live() {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => self.begin_closing("every room handle dropped"),
                },
                Some(event) = self.inbound.recv() => self.handle_inbound(event).await,
                tick = self.ticker.wait_for_tick() => {
                    tracing::trace!(port = self.port, tick = tick.tick, "control tick");
                    self.sync.on_control_tick();
                }
                _ = sleep_until(self.zombie_deadline) => {
                    self.zombie_deadline = None;
                    if self.state == RoomState::WaitingForFirstRegistration {
                        self.begin_closing("no player registered in time");
                    }
                }
                _ = housekeeping.tick() => {
                    self.registry.expire_parked(
                        std::time::Instant::now(),
                        self.config.download_timeout,
                    );
                }
            }
            self.pump_events();
        }

        self.close().await;
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::SetExpectedClients(count) => self.set_expected_clients(count),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => self.begin_closing("shutdown requested"),
        }
    }

    async fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Datagram { peer, message } => match message {
                UdpMessage::InputReport(report) => self.sync.handle_input_report(report),
                UdpMessage::InputRequest(request) => {
                    self.start_control_loop();
                    if let Some(response) = self.sync.handle_input_request(request) {
                        if let Err(e) = send_datagram(&self.udp, peer, &response.encode()).await {
                            tracing::warn!(port = self.port, %peer, error = %e, "input response not sent");
                        }
                    }
                }
                UdpMessage::StateHash(report) => self.sync.handle_state_hash(&report),
            },
            InboundEvent::Connected {
                conn,
                peer,
                outbound,
            } => {
                tracing::debug!(port = self.port, %conn, %peer, "client connected");
                self.registry.connect(conn, outbound);
            }
            InboundEvent::Request { conn, request } => {
                self.registry
                    .handle(conn, request, std::time::Instant::now());
            }
            InboundEvent::Disconnected { conn, reason } => {
                tracing::debug!(port = self.port, %conn, %reason, "client disconnected");
                self.registry.disconnect(conn);
            }
        }
    }

    /// Relays events between the two engines until both queues are empty.
    fn pump_events(&mut self) {
        loop {
            let registry_events: Vec<_> = self.registry.drain_events().collect();
            let sync_events: Vec<_> = self.sync.drain_events().collect();
            if registry_events.is_empty() && sync_events.is_empty() {
                break;
            }

            for event in registry_events {
                match event {
                    RegistryEvent::PlayerRegistered {
                        slot,
                        reg_id,
                        plugin,
                        raw,
                    } => {
                        self.sync.register_player(reg_id, slot, plugin);
                        // Liveness has to age even if this player never
                        // sends a datagram.
                        self.start_control_loop();
                        self.emit(LobbyEvent::PlayerRegistered {
                            port: self.port,
                            slot,
                        });
                        self.log_line(format!(
                            "registered player {slot} (reg id {reg_id}, plugin {plugin}, raw {raw})"
                        ));
                        if self.state == RoomState::WaitingForFirstRegistration {
                            self.zombie_deadline = None;
                            self.set_state(RoomState::Active);
                        }
                    }
                    RegistryEvent::DisconnectNotice { reg_id } => {
                        if !self.sync.disconnect_player(reg_id) {
                            tracing::debug!(port = self.port, reg_id, "disconnect notice for unknown id");
                        }
                    }
                }
            }

            for event in sync_events {
                match event {
                    SyncEvent::Desynced { vi_count } => {
                        self.emit(LobbyEvent::Desynced { port: self.port });
                        self.log_line(format!("desync detected at VI count {vi_count}"));
                    }
                    SyncEvent::PlayerDisconnected {
                        reg_id,
                        slot,
                        reason,
                    } => {
                        self.registry.vacate(slot, reg_id);
                        self.log_line(format!("player {slot} disconnected ({reason:?})"));
                    }
                    SyncEvent::RoomEmpty => self.begin_closing("all players disconnected"),
                }
            }
        }
    }

    fn start_control_loop(&mut self) {
        if self.ticker.start() {
            tracing::debug!(port = self.port, "control loop started");
        }
    }

    fn set_expected_clients(&mut self, count: usize) {
        tracing::debug!(port = self.port, count, "expected client count set");
        self.registry.set_expected_clients(count);
        if self.state == RoomState::WaitingForFirstRegistration && self.zombie_deadline.is_none() {
            self.zombie_deadline = Some(Instant::now() + self.config.registration_grace);
        }
    }

    fn begin_closing(&mut self, reason: &str) {
        if !self.state.can_transition_to(RoomState::Closing) {
            return;
        }
        tracing::info!(port = self.port, reason, "room closing");
        self.log_line(format!("closing room: {reason}"));
        self.set_state(RoomState::Closing);
    }

    /// Stops every socket task and releases the port, then reports the room
    /// destroyed.
    async fn close(mut self) {
        self.ticker.stop();
        // Closing the inbound queue first unblocks any socket task waiting
        // for capacity, so the joins below cannot hang.
        self.inbound.close();
        self.cancel.cancel();
        while self.io_tasks.join_next().await.is_some() {}
        self.set_state(RoomState::Closed);

        let RoomActor {
            port,
            udp,
            mut commands,
            events,
            ..
        } = self;
        drop(udp);
        commands.close();
        drop(commands);

        tracing::info!(port, "room closed");
        let _ = events.send(LobbyEvent::RoomDestroyed { port });
    }

    fn set_state(&mut self, next: RoomState) {
        if self.state.can_transition_to(next) {
            tracing::debug!(port = self.port, from = %self.state, to = %next, "room state");
            self.state = next;
        }
    }

    fn emit(&self, event: LobbyEvent) {
        let _ = self.events.send(event);
    }

    fn log_line(&self, text: String) {
        self.emit(LobbyEvent::LogLine {
            port: self.port,
            text,
        });
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            port: self.port,
            state: self.state,
            registered_players: self.sync.registered_count(),
            expected_clients: self.registry.expected_clients(),
            status: self.sync.status(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Binds a room's sockets, starts its I/O tasks and actor, and returns a
/// handle to it.
///
/// Port 0 picks a free port; [`RoomHandle::port`] tells which.
pub(crate) async fn spawn_room(
    port: u16,
    expected_clients: Option<usize>,
    config: RoomConfig,
    events: mpsc::UnboundedSender<LobbyEvent>,
) -> Result<RoomHandle, RoomError> {
    let endpoint = RoomEndpoint::bind(config.bind_ip, port)
        .await
        .map_err(|source| RoomError::Bind { port, source })?;
    let port = endpoint.port;

    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_channel_size);
    let cancel = CancellationToken::new();
    let mut io_tasks = JoinSet::new();
    io_tasks.spawn(run_udp_receiver(
        endpoint.udp.clone(),
        inbound_tx.clone(),
        cancel.clone(),
    ));
    io_tasks.spawn(run_tcp_acceptor(
        endpoint.tcp,
        inbound_tx,
        RequestCodec::new(config.max_blob_size),
        cancel.clone(),
    ));

    let (tx, rx) = mpsc::channel(config.command_channel_size);
    let actor = RoomActor {
        port,
        state: RoomState::Starting,
        sync: InputSyncServer::new(config.sync.clone()),
        registry: Registry::new(config.sync.buffer_floor),
        ticker: TickScheduler::new(config.tick.clone()),
        zombie_deadline: None,
        udp: endpoint.udp,
        commands: rx,
        inbound: inbound_rx,
        events: events.clone(),
        cancel,
        io_tasks,
        config,
    };

    tracing::info!(port, "room created");
    let _ = events.send(LobbyEvent::RoomCreated { port });
    tokio::spawn(actor.run(expected_clients));

    Ok(RoomHandle { port, sender: tx })
}
