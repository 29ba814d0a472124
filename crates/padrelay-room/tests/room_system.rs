//! Integration tests for the room system, driven over real loopback sockets.
//!
//! Timers are configured in milliseconds (20 ms control tick, 200 ms
//! registration grace) so whole lifecycles run in well under a second.
//! The liveness threshold is 50 ticks unless a test is about liveness, in
//! which case it drops to 3.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use padrelay_protocol::{
    InputReport, InputRequest, InputResponse, PlayerSlot, PluginKind, SNAPSHOT_LEN,
    StateHashReport, UdpMessage,
};
use padrelay_room::{LobbyCommand, LobbyEvent, RoomConfig, RoomError, RoomManager, RoomState};
use padrelay_sync::SyncConfig;
use padrelay_tick::TickConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(150);

// =========================================================================
// Helpers
// =========================================================================

fn test_config() -> RoomConfig {
    RoomConfig {
        bind_ip: LOCALHOST,
        sync: SyncConfig {
            liveness_threshold_ticks: 50,
            ..SyncConfig::default()
        },
        tick: TickConfig::with_interval(Duration::from_millis(20)),
        registration_grace: Duration::from_millis(200),
        housekeeping_interval: Duration::from_millis(20),
        ..RoomConfig::default()
    }
}

fn manager() -> (RoomManager, mpsc::UnboundedReceiver<LobbyEvent>) {
    manager_with(test_config())
}

/// Players expire after 3 silent ticks.
fn fast_liveness_manager() -> (RoomManager, mpsc::UnboundedReceiver<LobbyEvent>) {
    let mut config = test_config();
    config.sync.liveness_threshold_ticks = 3;
    manager_with(config)
}

fn manager_with(config: RoomConfig) -> (RoomManager, mpsc::UnboundedReceiver<LobbyEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RoomManager::new(config, tx), rx)
}

fn slot(n: u8) -> PlayerSlot {
    PlayerSlot::new(n).unwrap()
}

/// Waits for the first event matching `pred`, skipping everything else.
async fn expect_event(
    events: &mut mpsc::UnboundedReceiver<LobbyEvent>,
    pred: impl Fn(&LobbyEvent) -> bool,
) -> LobbyEvent {
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn tcp_client(port: u16) -> TcpStream {
    TcpStream::connect((LOCALHOST, port)).await.unwrap()
}

/// Sends a registration and returns the two-byte answer.
async fn register(stream: &mut TcpStream, player: u8, plugin: PluginKind, reg_id: u32) -> [u8; 2] {
    let mut request = vec![5, player, plugin.0, 0];
    request.extend_from_slice(&reg_id.to_be_bytes());
    stream.write_all(&request).await.unwrap();
    let mut answer = [0u8; 2];
    timeout(WAIT, stream.read_exact(&mut answer))
        .await
        .unwrap()
        .unwrap();
    answer
}

async fn udp_client() -> UdpSocket {
    UdpSocket::bind((LOCALHOST, 0)).await.unwrap()
}

async fn send_udp(client: &UdpSocket, port: u16, message: UdpMessage) {
    client
        .send_to(&message.encode(), (LOCALHOST, port))
        .await
        .unwrap();
}

/// Sends an input request and waits for the answer.
async fn input_request(
    client: &UdpSocket,
    port: u16,
    player: u8,
    reg_id: u32,
    frame: u32,
) -> InputResponse {
    send_udp(
        client,
        port,
        UdpMessage::InputRequest(InputRequest {
            slot: slot(player),
            reg_id,
            frame,
            spectator: false,
            buffer_health: 2,
        }),
    )
    .await;
    let mut buf = [0u8; 1024];
    let (len, _) = timeout(WAIT, client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    InputResponse::decode(&buf[..len]).unwrap()
}

// =========================================================================
// Creation and shutdown
// =========================================================================

#[tokio::test]
async fn test_create_room_binds_port_and_emits_created() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, Some(2)).await.unwrap();

    assert_eq!(
        expect_event(&mut events, |e| matches!(e, LobbyEvent::RoomCreated { .. })).await,
        LobbyEvent::RoomCreated { port }
    );
    assert_eq!(mgr.room_ports(), vec![port]);
    assert_eq!(mgr.room_count(), 1);

    let info = mgr.room_info(port).await.unwrap();
    assert_eq!(info.state, RoomState::WaitingForFirstRegistration);
    assert_eq!(info.expected_clients, Some(2));
    assert_eq!(info.registered_players, 0);

    // Both protocols answer on the same port.
    tcp_client(port).await;
}

#[tokio::test]
async fn test_create_room_on_taken_port_fails() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let result = mgr.create_room(port, None).await;
    assert!(matches!(result, Err(RoomError::PortInUse(p)) if p == port));
}

#[tokio::test]
async fn test_unknown_port_is_not_found() {
    let (mgr, _events) = manager();
    assert!(matches!(
        mgr.request_shutdown(1).await,
        Err(RoomError::NotFound(1))
    ));
    assert!(mgr.room_info(1).await.is_err());
}

#[tokio::test]
async fn test_shutdown_closes_sockets_and_frees_port() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let mut client = tcp_client(port).await;

    mgr.request_shutdown(port).await.unwrap();
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;

    // The open connection was closed and nobody listens any more.
    let mut buf = [0u8; 1];
    let read = timeout(WAIT, client.read(&mut buf)).await.unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));
    assert!(TcpStream::connect((LOCALHOST, port)).await.is_err());
    assert_eq!(mgr.room_count(), 0);

    // The port can host a new room right away.
    assert_eq!(mgr.create_room(port, None).await.unwrap(), port);
}

#[tokio::test]
async fn test_lobby_commands_dispatch() {
    let (mut mgr, mut events) = manager();
    mgr.handle_command(LobbyCommand::CreateRoom {
        port: 0,
        expected_clients: None,
    })
    .await
    .unwrap();
    let port = expect_event(&mut events, |e| matches!(e, LobbyEvent::RoomCreated { .. }))
        .await
        .port();

    mgr.handle_command(LobbyCommand::SetExpectedClientCount { port, count: 3 })
        .await
        .unwrap();
    assert_eq!(mgr.room_info(port).await.unwrap().expected_clients, Some(3));

    mgr.handle_command(LobbyCommand::RequestShutdown { port })
        .await
        .unwrap();
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;
}

// =========================================================================
// Zombie rooms
// =========================================================================

#[tokio::test]
async fn test_room_without_registration_is_reclaimed() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, Some(2)).await.unwrap();
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;
    assert!(mgr.room_ports().is_empty());
}

#[tokio::test]
async fn test_zombie_timer_waits_for_expected_count() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();

    // Well past the grace period, but the timer was never armed.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        mgr.room_info(port).await.unwrap().state,
        RoomState::WaitingForFirstRegistration
    );

    mgr.set_expected_client_count(port, 2).await.unwrap();
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;
}

#[tokio::test]
async fn test_registration_disarms_zombie_timer() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, Some(2)).await.unwrap();
    let mut client = tcp_client(port).await;
    assert_eq!(register(&mut client, 0, PluginKind::NONE, 5).await, [1, 1]);

    assert_eq!(
        expect_event(&mut events, |e| matches!(e, LobbyEvent::PlayerRegistered { .. })).await,
        LobbyEvent::PlayerRegistered { port, slot: slot(0) }
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    let info = mgr.room_info(port).await.unwrap();
    assert_eq!(info.state, RoomState::Active);
    assert_eq!(info.registered_players, 1);
}

// =========================================================================
// Input sync
// =========================================================================

#[tokio::test]
async fn test_report_then_request_round_trip() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let client = udp_client().await;

    send_udp(
        &client,
        port,
        UdpMessage::InputReport(InputReport {
            slot: slot(0),
            frame: 10,
            buttons: 0x1,
            plugin: PluginKind::ABSENT,
        }),
    )
    .await;
    let response = input_request(&client, port, 0, 5, 10).await;

    assert_eq!(response.slot, slot(0));
    assert!(!response.entries.is_empty());
    let first = response.entries[0];
    assert_eq!(first.frame, 10);
    assert_eq!(first.buttons, 0x1);
    assert_eq!(first.plugin, PluginKind::ABSENT);
}

#[tokio::test]
async fn test_desync_reported_once_and_sticky() {
    let (mut mgr, mut events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let client = udp_client().await;

    let hash = |vi_count, fill| {
        UdpMessage::StateHash(StateHashReport {
            vi_count,
            snapshot: [fill; SNAPSHOT_LEN],
        })
    };
    send_udp(&client, port, hash(60, 1)).await;
    send_udp(&client, port, hash(60, 2)).await;
    expect_event(&mut events, |e| *e == LobbyEvent::Desynced { port }).await;

    send_udp(&client, port, hash(61, 1)).await;
    send_udp(&client, port, hash(61, 3)).await;

    // The response proves the hashes before it were processed.
    let response = input_request(&client, port, 0, 5, 0).await;
    assert!(response.status.is_desynced());
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, LobbyEvent::Desynced { .. }), "second desync event");
    }
}

// =========================================================================
// Registration and assets
// =========================================================================

#[tokio::test]
async fn test_blob_download_waits_for_upload() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let mut uploader = tcp_client(port).await;
    let mut downloader = tcp_client(port).await;

    downloader.write_all(b"\x02rom\0").await.unwrap();
    let mut buf = [0u8; 3];
    assert!(
        timeout(QUIET, downloader.read_exact(&mut buf)).await.is_err(),
        "answered before upload"
    );

    uploader.write_all(b"\x01rom\0\0\0\0\x03abc").await.unwrap();
    timeout(WAIT, downloader.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"abc");

    // Exactly one answer.
    let mut extra = [0u8; 1];
    assert!(timeout(QUIET, downloader.read(&mut extra)).await.is_err());
}

#[tokio::test]
async fn test_non_utf8_file_name_is_stored_and_served() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let mut uploader = tcp_client(port).await;
    let mut downloader = tcp_client(port).await;

    uploader
        .write_all(&[1, 0x83, 0x7d, b'.', b'e', 0, 0, 0, 0, 1, b'x'])
        .await
        .unwrap();
    downloader
        .write_all(&[2, 0x83, 0x7d, b'.', b'e', 0])
        .await
        .unwrap();
    let mut buf = [0u8; 1];
    timeout(WAIT, downloader.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"x");

    // The uploader's connection is still usable.
    uploader.write_all(&[2, 0x83, 0x7d, b'.', b'e', 0]).await.unwrap();
    timeout(WAIT, uploader.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"x");
}

#[tokio::test]
async fn test_registration_download_waits_for_all_clients() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, Some(2)).await.unwrap();
    let mut first = tcp_client(port).await;
    let mut second = tcp_client(port).await;

    assert_eq!(register(&mut first, 0, PluginKind::MEMPAK, 0x0a0b_0c0d).await, [1, 1]);
    first.write_all(&[6]).await.unwrap();
    let mut table = [0u8; 24];
    assert!(timeout(QUIET, first.read_exact(&mut table)).await.is_err());

    assert_eq!(register(&mut second, 2, PluginKind::MEMPAK, 7).await, [1, 1]);
    timeout(WAIT, first.read_exact(&mut table))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        table,
        [
            0x0a, 0x0b, 0x0c, 0x0d, 2, 0, // slot 0 keeps the mempak
            0, 0, 0, 0, 0, 0, //
            0, 0, 0, 7, 1, 0, // slot 2 downgraded
            0, 0, 0, 0, 0, 0,
        ]
    );
}

#[tokio::test]
async fn test_disconnect_notice_frees_slot() {
    let (mut mgr, _events) = manager();
    let port = mgr.create_room(0, None).await.unwrap();
    let mut client = tcp_client(port).await;

    assert_eq!(register(&mut client, 0, PluginKind::NONE, 5).await, [1, 1]);
    assert_eq!(register(&mut client, 1, PluginKind::NONE, 6).await, [1, 1]);
    assert_eq!(register(&mut client, 0, PluginKind::NONE, 9).await, [0, 1]);

    client.write_all(&[7, 0, 0, 0, 5]).await.unwrap();
    assert_eq!(register(&mut client, 0, PluginKind::NONE, 9).await, [1, 1]);

    let info = mgr.room_info(port).await.unwrap();
    assert_eq!(info.registered_players, 2);
    assert!(info.status.is_disconnected(slot(0)));
}

// =========================================================================
// Liveness
// =========================================================================

#[tokio::test]
async fn test_silent_player_is_dropped_and_last_one_closes_room() {
    let (mut mgr, mut events) = fast_liveness_manager();
    let port = mgr.create_room(0, Some(2)).await.unwrap();
    let mut tcp = tcp_client(port).await;
    assert_eq!(register(&mut tcp, 0, PluginKind::NONE, 5).await, [1, 1]);
    assert_eq!(register(&mut tcp, 1, PluginKind::NONE, 6).await, [1, 1]);

    // Player 1 keeps requesting; player 0 never does.
    let udp = udp_client().await;
    let mut frame = 0;
    let dropped = timeout(WAIT, async {
        loop {
            let response = input_request(&udp, port, 1, 6, frame).await;
            if response.status.is_disconnected(slot(0)) {
                return response;
            }
            frame += 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("player 0 never timed out");
    assert!(!dropped.status.is_disconnected(slot(1)));

    // Now player 1 goes quiet too.
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;
    assert!(mgr.room_ports().is_empty());
}

#[tokio::test]
async fn test_player_registered_without_input_still_times_out() {
    let (mut mgr, mut events) = fast_liveness_manager();
    let port = mgr.create_room(0, Some(1)).await.unwrap();
    let mut tcp = tcp_client(port).await;
    assert_eq!(register(&mut tcp, 0, PluginKind::NONE, 7).await, [1, 1]);
    drop(tcp);

    // No datagram is ever sent, yet the room must not outlive its player.
    expect_event(&mut events, |e| *e == LobbyEvent::RoomDestroyed { port }).await;
    assert!(mgr.room_ports().is_empty());
    assert!(matches!(
        mgr.room_info(port).await,
        Err(RoomError::NotFound(p)) if p == port
    ));
}
