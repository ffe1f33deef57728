// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests against a real server on a loopback port.

use k2vr_server::protocol::{encode_message, to_archive_string};
use k2vr_server::{
    DataPacket, DeviceRegistrar, PosePacket, ServerConfig, ServerHandle, TrackerClient,
    TrackerDescriptor, TrackerRole, TrackerServer, Vector3,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every spawn request.
#[derive(Default)]
struct RecordingRegistrar {
    spawned: Mutex<Vec<(usize, String)>>,
}

impl RecordingRegistrar {
    fn spawned(&self) -> Vec<(usize, String)> {
        self.spawned.lock().unwrap().clone()
    }
}

impl DeviceRegistrar for RecordingRegistrar {
    fn register_device(&self, id: usize, descriptor: &TrackerDescriptor) -> bool {
        self.spawned
            .lock()
            .unwrap()
            .push((id, descriptor.serial.clone()));
        true
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        endpoint: "tcp://127.0.0.1:0".into(),
        paused_poll_ms: 10,
        ..Default::default()
    }
}

async fn start_server(config: ServerConfig) -> (ServerHandle, Arc<RecordingRegistrar>) {
    let registrar = Arc::new(RecordingRegistrar::default());
    let server = TrackerServer::bind(config, registrar.clone()).await.unwrap();
    (server.start(), registrar)
}

async fn connect(handle: &ServerHandle) -> TrackerClient {
    TrackerClient::connect(&handle.local_addr().to_string())
        .await
        .unwrap()
}

async fn shutdown(handle: ServerHandle) {
    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_add_activate_and_update_pose() {
    let (handle, registrar) = start_server(test_config()).await;
    let mut client = connect(&handle).await;

    let descriptor = TrackerDescriptor::new("K2-WAIST", TrackerRole::Waist);
    let add = encode_message("ADD_TRACKER", &[to_archive_string(&descriptor).as_str()]).unwrap();
    assert_eq!(client.send_raw(&add, true).await.unwrap().as_deref(), Some("0"));

    let activate = client
        .send_raw("/CSET_STATE/P0/P11/T", true)
        .await
        .unwrap();
    assert_eq!(activate.as_deref(), Some("1"));
    assert_eq!(registrar.spawned(), vec![(0, "K2-WAIST".to_string())]);

    let pose = PosePacket {
        position: Vector3::new(0.1, 1.0, -0.4),
        ..Default::default()
    };
    client.update_pose(0, &pose).await.unwrap();

    // The next reply proves the pose update was processed and left unanswered
    assert!(!client.set_state(5, true).await.unwrap());

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].pose, pose);
    assert!(snapshot[0].added && snapshot[0].active);

    assert_eq!(handle.stats().messages_received, 4);

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_invalid_id_leaves_registry_untouched() {
    let (handle, registrar) = start_server(test_config()).await;
    let mut client = connect(&handle).await;

    let id = client
        .add_tracker(&TrackerDescriptor::new("a", TrackerRole::LeftFoot))
        .await
        .unwrap();
    assert_eq!(id, 0);
    let before = handle.snapshot().await;

    assert!(!client.set_state(5, true).await.unwrap());
    client
        .update_data(
            9,
            &DataPacket {
                serial: "ghost".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(client.set_state(0, false).await.unwrap());

    let after = handle.snapshot().await;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].data, before[0].data);
    assert!(registrar.spawned().is_empty());

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_malformed_messages_are_ignored() {
    let (handle, _) = start_server(test_config()).await;
    let mut client = connect(&handle).await;

    // No terminator, no command marker, unknown command: none get a reply
    for message in ["/CSET_STATE_ALL/P1", "/P1/T", "/CRESET/P1/T"] {
        assert_eq!(client.send_raw(message, false).await.unwrap(), None);
    }

    let reply = client
        .send_raw("noise/CSET_STATE_ALL/P1/Ttrailing", true)
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("1"));

    let stats = handle.stats();
    assert_eq!(stats.messages_ignored, 3);
    assert_eq!(stats.commands_dispatched, 1);

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_bad_payloads_get_failure_replies() {
    let (handle, _) = start_server(test_config()).await;
    let mut client = connect(&handle).await;

    let add = client
        .send_raw("/CADD_TRACKER/Pnot an archive/T", true)
        .await
        .unwrap();
    assert_eq!(add.as_deref(), Some("-1"));

    let state = client.send_raw("/CSET_STATE/Pzero/P11/T", true).await.unwrap();
    assert_eq!(state.as_deref(), Some("0"));

    let state_all = client.send_raw("/CSET_STATE_ALL/Pyes/T", true).await.unwrap();
    assert_eq!(state_all.as_deref(), Some("0"));

    // Garbage pose for an unknown tracker: no reply, loop keeps going
    client
        .send_raw("/CUPDATE_POSE/P0/P1garbage/T", false)
        .await
        .unwrap();
    assert!(client.set_state_all(true).await.unwrap());

    assert_eq!(handle.tracker_count().await, 0);
    assert_eq!(handle.stats().payload_errors, 4);

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_set_state_all_spawns_every_tracker() {
    let (handle, registrar) = start_server(test_config()).await;
    let mut client = connect(&handle).await;

    for serial in ["a", "b", "c"] {
        client
            .add_tracker(&TrackerDescriptor::new(serial, TrackerRole::Chest))
            .await
            .unwrap();
    }
    assert!(client.set_state(1, true).await.unwrap());
    assert!(client.set_state_all(false).await.unwrap());
    assert!(client.set_state_all(false).await.unwrap());

    let ids: Vec<usize> = registrar.spawned().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 0, 2]);
    assert!(handle
        .snapshot()
        .await
        .iter()
        .all(|tracker| tracker.added && !tracker.active));

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_pause_and_resume() {
    let config = ServerConfig {
        start_active: false,
        ..test_config()
    };
    let (handle, _) = start_server(config).await;
    let mut client = connect(&handle).await;

    let request = tokio::spawn(async move {
        let reply = client.set_state_all(true).await.unwrap();
        (client, reply)
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!request.is_finished());
    assert_eq!(handle.stats().messages_received, 0);

    handle.set_active(true);
    let (client, reply) = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("request not served after resume")
        .unwrap();
    assert!(reply);

    drop(client);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_client_reconnect() {
    let (handle, _) = start_server(test_config()).await;

    let mut first = connect(&handle).await;
    assert_eq!(
        first
            .add_tracker(&TrackerDescriptor::new("a", TrackerRole::Waist))
            .await
            .unwrap(),
        0
    );
    drop(first);

    let mut second = connect(&handle).await;
    assert_eq!(
        second
            .add_tracker(&TrackerDescriptor::new("b", TrackerRole::Waist))
            .await
            .unwrap(),
        1
    );
    assert_eq!(handle.tracker_count().await, 2);

    drop(second);
    shutdown(handle).await;
}

#[tokio::test]
async fn test_stop_with_idle_client() {
    let (handle, _) = start_server(test_config()).await;
    let client = connect(&handle).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown(handle.clone()).await;
    assert!(!handle.is_running());
    drop(client);
}
