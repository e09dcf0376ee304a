//! End-to-end protocol tests over loopback TCP.
//!
//! The test thread plays the owner (rendering) thread; clients run on their
//! own threads whenever an exchange needs the owner to service an export.

use mobile_remote::config::SessionConfig;
use mobile_remote::demo::DemoScene;
use mobile_remote::{CameraState, RemoteClient, RemoteControl};
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_MS: u64 = 20;

fn start_server() -> (RemoteControl, SocketAddr) {
    let mut remote = RemoteControl::with_settings(
        "127.0.0.1",
        SessionConfig {
            poll_timeout_ms: POLL_MS,
            ..SessionConfig::default()
        },
    );
    let addr = remote.create_server(0).expect("bind loopback");
    remote.start().expect("start session thread");
    (remote, addr)
}

fn connect(addr: SocketAddr) -> RemoteClient {
    let mut client = RemoteClient::connect(addr).expect("connect");
    client
        .set_timeout(Some(Duration::from_secs(5)))
        .expect("set timeout");
    client
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

/// Act as the owner thread until the client thread finishes.
fn serve_exports<T>(
    remote: &RemoteControl,
    scene: &mut DemoScene,
    client: JoinHandle<T>,
) -> T {
    while !client.is_finished() {
        if !remote.export_scene(scene) {
            thread::sleep(Duration::from_millis(1));
        }
    }
    client.join().expect("client thread panicked")
}

fn shutdown(mut remote: RemoteControl) {
    remote.should_quit();
    remote.wait().expect("join session thread");
    assert!(!remote.server_is_open());
    assert!(!remote.client_is_connected());
}

#[test]
fn test_camera_update_sets_and_clears_flag() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);
    let state = CameraState::new([1.0, 2.0, 3.0], [0.5, 0.5, 0.5], [0.0, 1.0, 0.0]);

    assert!(!remote.has_new_camera_state());
    client.send_camera_state(&state).unwrap();
    // Commands are handled in order: after the echo the state is stored
    client.heartbeat().unwrap();

    assert!(remote.has_new_camera_state());
    assert_eq!(remote.camera_state(), state);
    assert!(!remote.has_new_camera_state());
    assert_eq!(remote.stats().camera_updates, 1);

    shutdown(remote);
}

#[test]
fn test_camera_updates_last_write_wins() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);
    let first = CameraState::new([1.0; 3], [0.0; 3], [0.0, 1.0, 0.0]);
    let second = CameraState::new([9.0, 8.0, 7.0], [1.0; 3], [1.0, 0.0, 0.0]);

    client.send_camera_state(&first).unwrap();
    client.send_camera_state(&second).unwrap();
    client.heartbeat().unwrap();

    assert_eq!(remote.camera_state(), second);
    assert!(!remote.has_new_camera_state());

    shutdown(remote);
}

#[test]
fn test_apply_camera_update_moves_scene() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);
    let mut scene = DemoScene::with_cube();
    let state = CameraState::new([0.0, 10.0, 0.0], [0.0; 3], [0.0, 0.0, -1.0]);

    assert!(!remote.apply_camera_update(&mut scene));
    client.send_camera_state(&state).unwrap();
    client.heartbeat().unwrap();

    assert!(remote.apply_camera_update(&mut scene));
    assert_eq!(scene.camera, state);
    assert_eq!(scene.redraw_requests, 1);
    assert!(!remote.apply_camera_update(&mut scene));

    shutdown(remote);
}

#[test]
fn test_unknown_command_disconnects_and_relistens() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);
    wait_until("first client", || remote.client_is_connected());

    client.send_raw_command(42).unwrap();
    assert!(client.wait_for_close(Duration::from_secs(5)).unwrap());
    wait_until("disconnect", || !remote.client_is_connected());

    // A fresh connection is served
    let mut fresh = connect(addr);
    fresh.heartbeat().unwrap();
    assert!(remote.client_is_connected());
    assert_eq!(remote.stats().connections, 2);

    shutdown(remote);
}

#[test]
fn test_client_disconnect_returns_to_listening() {
    let (remote, addr) = start_server();
    let client = connect(addr);
    wait_until("client", || remote.client_is_connected());

    drop(client);
    wait_until("disconnect", || !remote.client_is_connected());
    assert!(remote.server_is_open());

    let mut again = connect(addr);
    again.heartbeat().unwrap();

    shutdown(remote);
}

#[test]
fn test_heartbeat_without_ready() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);

    let rtt = client.heartbeat().unwrap();
    assert!(rtt < Duration::from_secs(5));
    // READY produces no reply: the next reply is the heartbeat echo
    client.ready().unwrap();
    client.heartbeat().unwrap();

    shutdown(remote);
}

#[test]
fn test_metadata_is_exported_per_request() {
    let (remote, addr) = start_server();
    let mut scene = DemoScene::with_cube();

    let client = thread::spawn(move || {
        let mut client = connect(addr);
        client.ready().unwrap();
        let first = client.request_metadata().unwrap();
        let second = client.request_metadata().unwrap();
        (first, second)
    });
    let (first, second) = serve_exports(&remote, &mut scene, client);

    let first: serde_json::Value = serde_json::from_slice(&first).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&second).unwrap();
    assert_eq!(first["revision"], 1);
    assert_eq!(second["revision"], 2);
    assert_eq!(first["objects"][0]["name"], "cube");
    assert_eq!(scene.revision, 2);
    assert_eq!(remote.stats().exports, 2);

    shutdown(remote);
}

#[test]
fn test_metadata_waits_for_owner_thread() {
    let (remote, addr) = start_server();
    let mut scene = DemoScene::with_cube();

    let client = thread::spawn(move || {
        let mut client = connect(addr);
        client.ready().unwrap();
        client.request_metadata().unwrap()
    });

    wait_until("export request", || remote.has_pending_export());
    // The request stays pending until the owner exports
    thread::sleep(Duration::from_millis(50));
    assert!(remote.has_pending_export());
    assert!(!client.is_finished());

    // Scene changes before the export reach the client
    scene.objects.truncate(1);
    let metadata = serve_exports(&remote, &mut scene, client);
    let metadata: serde_json::Value = serde_json::from_slice(&metadata).unwrap();
    assert_eq!(metadata["objects"].as_array().unwrap().len(), 1);

    shutdown(remote);
}

#[test]
fn test_objects_export() {
    let (remote, addr) = start_server();
    let mut scene = DemoScene::with_cube();
    let export_requests = remote.export_requests();

    let client = thread::spawn(move || {
        let mut client = connect(addr);
        client.request_objects().unwrap()
    });

    // Owner loop driven by the request signal
    let kind = export_requests
        .recv_timeout(Duration::from_secs(5))
        .expect("export signal");
    assert_eq!(kind, mobile_remote::ExportKind::Objects);
    let objects = serve_exports(&remote, &mut scene, client);

    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].len(), 36 * 12);
    assert_eq!(objects[1].len(), 6 * 12);

    shutdown(remote);
}

#[test]
fn test_new_connection_supersedes_current() {
    let (remote, addr) = start_server();
    let mut first = connect(addr);
    first.heartbeat().unwrap();

    let mut second = connect(addr);
    second.heartbeat().unwrap();
    assert!(first.wait_for_close(Duration::from_secs(5)).unwrap());
    assert!(remote.client_is_connected());
    assert_eq!(remote.stats().connections, 2);

    shutdown(remote);
}

#[test]
fn test_busy_client_is_superseded() {
    let (remote, addr) = start_server();
    let mut first = connect(addr);
    first.heartbeat().unwrap();

    // First client never lets the session go idle
    let busy = thread::spawn(move || {
        while first.heartbeat().is_ok() {
            thread::sleep(Duration::from_millis(5));
        }
    });

    let mut second = connect(addr);
    second.heartbeat().unwrap();
    busy.join().unwrap();
    assert!(remote.client_is_connected());
    assert_eq!(remote.stats().connections, 2);

    shutdown(remote);
}

#[test]
fn test_truncated_camera_state_disconnects() {
    let (remote, addr) = start_server();
    let mut client = connect(addr);
    wait_until("client", || remote.client_is_connected());

    let mut bytes = 4i32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0u8; 20]);
    client.send_raw_bytes(&bytes).unwrap();
    drop(client);

    wait_until("disconnect", || !remote.client_is_connected());
    assert!(!remote.has_new_camera_state());
    assert!(remote.server_is_open());

    let mut fresh = connect(addr);
    fresh.heartbeat().unwrap();
    shutdown(remote);
}

#[test]
fn test_quit_abandons_pending_export() {
    let (mut remote, addr) = start_server();

    let client = thread::spawn(move || {
        let mut client = connect(addr);
        client.request_metadata().is_err()
    });

    wait_until("export request", || remote.has_pending_export());
    let start = Instant::now();
    remote.should_quit();
    remote.wait().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(!remote.server_is_open());
    assert!(client.join().unwrap());
}

#[test]
fn test_quit_while_waiting_for_activity() {
    let (mut remote, addr) = start_server();
    let _client = connect(addr);
    wait_until("client", || remote.client_is_connected());

    // Session is blocked waiting on an idle client
    thread::sleep(Duration::from_millis(3 * POLL_MS));
    let start = Instant::now();
    remote.should_quit();
    remote.wait().unwrap();

    assert!(start.elapsed() < Duration::from_millis(10 * POLL_MS));
    assert!(!remote.client_is_connected());
    assert!(!remote.server_is_open());
}

#[test]
fn test_drop_unblocks_pending_export() {
    let (remote, addr) = start_server();

    let client = thread::spawn(move || {
        let mut client = connect(addr);
        // Dropped without an answer once the server goes away
        client.request_metadata().is_err()
    });

    wait_until("export request", || remote.has_pending_export());
    drop(remote);
    assert!(client.join().unwrap());
}
