//! End-to-end relay tests
//!
//! Drives a full relay over the in-process transport: authentication
//! handshakes, directory events, telemetry fan-out, command routing,
//! terminal proxying, and disconnect propagation.

use std::time::Duration;

use vantage_core::{ClientStatus, ControlAction, Inbound, Outbound, Role};
use vantage_relay::RelayConfig;
use vantage_store::EventLog;
use vantage_test_utils::{wait_for, TestRelay, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT};

/// Short timeout for asserting that nothing arrives
const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_client_auth_flow() {
    let relay = TestRelay::start().await;

    let mut peer = relay.connect();
    peer.send(&Inbound::AuthenticateClient {
        credential_token: "dev-A".into(),
        client_info: serde_json::json!({"hostname": "lab-pc"}),
    });

    match peer.recv().await {
        Some(Outbound::AuthSuccess {
            role, client_id, ..
        }) => {
            assert_eq!(role, Some(Role::Client));
            assert!(client_id.is_some(), "client auth must return its connection id");
        }
        other => panic!("expected auth-success, got {other:?}"),
    }
    assert_eq!(relay.registry().client_count(), 1);
}

#[tokio::test]
async fn test_auth_error_closes_connection() {
    let relay = TestRelay::start().await;

    let mut peer = relay.connect();
    peer.send(&Inbound::AuthenticateClient {
        credential_token: "".into(),
        client_info: serde_json::json!({}),
    });

    match peer.recv().await {
        Some(Outbound::AuthError { message }) => {
            assert!(message.contains("credential"));
        }
        other => panic!("expected auth-error, got {other:?}"),
    }
    assert!(peer.wait_closed(DEFAULT_TIMEOUT).await);
    assert_eq!(relay.registry().client_count(), 0);
}

#[tokio::test]
async fn test_bad_admin_token_rejected() {
    let relay = TestRelay::start().await;

    let mut peer = relay.connect();
    peer.send(&Inbound::AuthenticateAdmin {
        session_token: "garbage".into(),
    });

    assert!(matches!(
        peer.recv().await,
        Some(Outbound::AuthError { .. })
    ));
    assert!(peer.wait_closed(DEFAULT_TIMEOUT).await);
    assert_eq!(relay.registry().admin_count(), 0);
}

#[tokio::test]
async fn test_admin_receives_directory_on_auth() {
    let relay = TestRelay::start().await;
    let _client = relay.connect_client("dev-A", "lab-pc").await;

    let (_admin, clients) = relay.connect_admin("ops").await;

    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].device, "dev-A");
    assert_eq!(clients[0].name, "lab-pc");
    assert_eq!(clients[0].status, ClientStatus::Connected);
}

#[tokio::test]
async fn test_admin_notified_of_new_client() {
    let relay = TestRelay::start().await;
    let (mut admin, clients) = relay.connect_admin("ops").await;
    assert!(clients.is_empty());

    let _client = relay.connect_client("dev-A", "lab-pc").await;

    match admin.recv().await {
        Some(Outbound::ClientConnected(snap)) => {
            assert_eq!(snap.device, "dev-A");
            assert_eq!(snap.name, "lab-pc");
        }
        other => panic!("expected client-connected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_screen_data_fans_out_to_all_admins() {
    let relay = TestRelay::start().await;
    let client = relay.connect_client("dev-A", "lab-pc").await;
    let (mut admin_a, _) = relay.connect_admin("ops-a").await;
    let (mut admin_b, _) = relay.connect_admin("ops-b").await;

    client.send(&Inbound::ScreenData {
        screenshot: "b64-frame".into(),
        stats: serde_json::json!({"cpu": 42}),
        timestamp: 1_700_000_000_000,
        quality: Some(60),
    });

    for admin in [&mut admin_a, &mut admin_b] {
        match admin.recv().await {
            Some(Outbound::ScreenUpdate {
                name,
                screenshot,
                stats,
                timestamp,
                quality,
                ..
            }) => {
                assert_eq!(name, "lab-pc");
                assert_eq!(screenshot, "b64-frame");
                assert_eq!(stats["cpu"], 42);
                assert_eq!(timestamp, 1_700_000_000_000);
                assert_eq!(quality, Some(60));
            }
            other => panic!("expected screen-update, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_screen_data_from_unidentified_connection_dropped() {
    let relay = TestRelay::start().await;
    let (mut admin, _) = relay.connect_admin("ops").await;

    let anon = relay.connect();
    anon.send(&Inbound::ScreenData {
        screenshot: "sneaky".into(),
        stats: serde_json::json!({}),
        timestamp: 1,
        quality: None,
    });

    assert!(admin.recv_timeout(QUIET).await.is_none());
}

#[tokio::test]
async fn test_late_admin_gets_snapshot_but_no_replay() {
    let relay = TestRelay::start().await;
    let client = relay.connect_client("dev-A", "lab-pc").await;

    client.send(&Inbound::ScreenData {
        screenshot: "frame-1".into(),
        stats: serde_json::json!({}),
        timestamp: 1,
        quality: None,
    });

    // Wait until the telemetry has been processed.
    let registry = relay.registry().clone();
    let seen = wait_for(
        || async {
            registry
                .list_clients()
                .first()
                .is_some_and(|c| c.last_telemetry.is_some())
        },
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(seen);

    let (mut admin, clients) = relay.connect_admin("ops").await;
    assert!(clients[0].last_telemetry.is_some());

    // Past frames are not replayed to a newly arrived admin.
    assert!(admin.recv_timeout(QUIET).await.is_none());
}

#[tokio::test]
async fn test_request_client_info() {
    let relay = TestRelay::start().await;
    let _client = relay.connect_client("dev-A", "lab-pc").await;
    let (mut admin, clients) = relay.connect_admin("ops").await;

    admin.send(&Inbound::RequestClientInfo {
        target: clients[0].connection.clone(),
    });

    match admin.recv().await {
        Some(Outbound::ClientInfo(snap)) => assert_eq!(snap.device, "dev-A"),
        other => panic!("expected client-info, got {other:?}"),
    }

    // Unknown targets are silently ignored.
    admin.send(&Inbound::RequestClientInfo {
        target: "no-such-connection".into(),
    });
    assert!(admin.recv_timeout(QUIET).await.is_none());
}

#[tokio::test]
async fn test_control_command_routed_to_client() {
    let relay = TestRelay::start().await;
    let mut client = relay.connect_client("dev-A", "lab-pc").await;
    let (admin, clients) = relay.connect_admin("ops").await;

    admin.send(&Inbound::ControlClient {
        target: clients[0].connection.clone(),
        action: ControlAction::Pause,
    });

    assert!(matches!(
        client.recv().await,
        Some(Outbound::ControlCommand {
            action: ControlAction::Pause
        })
    ));
}

#[tokio::test]
async fn test_control_disconnect_is_forward_only() {
    let relay = TestRelay::start().await;
    let mut client = relay.connect_client("dev-A", "lab-pc").await;
    let (mut admin, clients) = relay.connect_admin("ops").await;

    admin.send(&Inbound::ControlClient {
        target: clients[0].connection.clone(),
        action: ControlAction::Disconnect,
    });

    assert!(matches!(
        client.recv().await,
        Some(Outbound::ControlCommand {
            action: ControlAction::Disconnect
        })
    ));

    // The relay only forwards the command; it is the endpoint's job to
    // hang up. The session stays registered until it does.
    assert!(client.recv_timeout(QUIET).await.is_none());
    assert!(client.is_connected());
    assert_eq!(relay.registry().client_count(), 1);

    client.close();
    match admin.recv().await {
        Some(Outbound::ClientDisconnected { name, .. }) => assert_eq!(name, "lab-pc"),
        other => panic!("expected client-disconnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_control_from_non_admin_dropped() {
    let relay = TestRelay::start().await;
    let mut victim = relay.connect_client("dev-A", "lab-pc").await;
    let rogue = relay.connect_client("dev-B", "rogue-pc").await;
    let (_admin, clients) = relay.connect_admin("ops").await;

    let target = clients
        .iter()
        .find(|c| c.device == "dev-A")
        .unwrap()
        .connection
        .clone();
    rogue.send(&Inbound::ControlClient {
        target,
        action: ControlAction::Disconnect,
    });

    assert!(victim.recv_timeout(QUIET).await.is_none());
    assert!(victim.is_connected());
}

#[tokio::test]
async fn test_terminal_round_trip() {
    let relay = TestRelay::start().await;
    let mut client = relay.connect_client("dev-A", "lab-pc").await;
    let (mut admin, clients) = relay.connect_admin("ops").await;
    let client_conn = clients[0].connection.clone();

    admin.send(&Inbound::TerminalCommand {
        target: client_conn.clone(),
        command: "uptime".into(),
    });

    let admin_return = match client.recv().await {
        Some(Outbound::TerminalCommand { command, admin }) => {
            assert_eq!(command, "uptime");
            admin
        }
        other => panic!("expected terminal-command, got {other:?}"),
    };

    client.send(&Inbound::TerminalOutput {
        admin: admin_return,
        output: "up 3 days".into(),
        command: "uptime".into(),
    });

    match admin.recv().await {
        Some(Outbound::TerminalOutput {
            output,
            command,
            client,
        }) => {
            assert_eq!(output, "up 3 days");
            assert_eq!(command, "uptime");
            assert_eq!(client, client_conn);
        }
        other => panic!("expected terminal-output, got {other:?}"),
    }
}

#[tokio::test]
async fn test_terminal_command_logged_only_on_delivery() {
    let relay = TestRelay::start().await;
    let mut client = relay.connect_client("dev-A", "lab-pc").await;
    let (admin, clients) = relay.connect_admin("ops").await;

    // Command to an absent target: nothing delivered, nothing logged.
    admin.send(&Inbound::TerminalCommand {
        target: "no-such-connection".into(),
        command: "rm -rf /".into(),
    });
    assert!(client.recv_timeout(QUIET).await.is_none());

    admin.send(&Inbound::TerminalCommand {
        target: clients[0].connection.clone(),
        command: "uptime".into(),
    });
    assert!(matches!(
        client.recv().await,
        Some(Outbound::TerminalCommand { .. })
    ));

    let store = relay.store().clone();
    let logged = wait_for(
        || async {
            store
                .recent(20)
                .unwrap()
                .iter()
                .any(|l| l.message.contains("Terminal command"))
        },
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(logged, "delivered terminal command should be audited");

    let terminal_entries = relay
        .store()
        .recent(20)
        .unwrap()
        .into_iter()
        .filter(|l| l.message.contains("Terminal command"))
        .count();
    assert_eq!(terminal_entries, 1, "undelivered command must not be logged");
}

#[tokio::test]
async fn test_terminal_output_from_admin_dropped() {
    let relay = TestRelay::start().await;
    let (mut admin_a, _) = relay.connect_admin("ops-a").await;
    let (rogue, _) = relay.connect_admin("ops-b").await;

    // Only clients may emit terminal output; an admin impersonating one
    // gets its message dropped.
    let admin_a_conn = relay.registry().admins()[0].id.clone();
    rogue.send(&Inbound::TerminalOutput {
        admin: admin_a_conn,
        output: "forged".into(),
        command: "whoami".into(),
    });

    assert!(admin_a.recv_timeout(QUIET).await.is_none());
}

#[tokio::test]
async fn test_full_admin_queue_drops_only_that_admin() {
    let relay = TestRelay::start().await;
    let client = relay.connect_client("dev-A", "lab-pc").await;

    // Slow admin: queue holds two undelivered events.
    let mut slow = relay.connect_with_capacity(2);
    slow.send(&Inbound::AuthenticateAdmin {
        session_token: vantage_test_utils::issue_admin_token("slow"),
    });
    assert!(matches!(
        slow.recv().await,
        Some(Outbound::AuthSuccess { .. })
    ));
    assert!(matches!(
        slow.recv().await,
        Some(Outbound::ClientsList { .. })
    ));

    let (mut fast, _) = relay.connect_admin("fast").await;

    for i in 0..3 {
        client.send(&Inbound::ScreenData {
            screenshot: format!("frame-{i}"),
            stats: serde_json::json!({}),
            timestamp: i,
            quality: None,
        });
    }

    // The fast admin sees every frame.
    for i in 0..3 {
        match fast.recv().await {
            Some(Outbound::ScreenUpdate { screenshot, .. }) => {
                assert_eq!(screenshot, format!("frame-{i}"));
            }
            other => panic!("expected screen-update, got {other:?}"),
        }
    }

    // The slow admin's queue capped out at two; the third was dropped,
    // never queued behind a stalled consumer.
    assert!(matches!(
        slow.recv().await,
        Some(Outbound::ScreenUpdate { .. })
    ));
    assert!(matches!(
        slow.recv().await,
        Some(Outbound::ScreenUpdate { .. })
    ));
    assert!(slow.recv_timeout(QUIET).await.is_none());
}

#[tokio::test]
async fn test_client_disconnect_broadcasts() {
    let relay = TestRelay::start().await;
    let client = relay.connect_client("dev-A", "lab-pc").await;
    let (mut admin, _) = relay.connect_admin("ops").await;

    client.close();

    match admin.recv().await {
        Some(Outbound::ClientDisconnected { name, .. }) => assert_eq!(name, "lab-pc"),
        other => panic!("expected client-disconnected, got {other:?}"),
    }

    let registry = relay.registry().clone();
    let removed = wait_for(
        || async { registry.client_count() == 0 },
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await;
    assert!(removed);
}

#[tokio::test]
async fn test_malformed_frame_does_not_kill_connection() {
    let relay = TestRelay::start().await;

    let mut peer = relay.connect();
    peer.send_raw(&[0xDE, 0xAD, 0xBE, 0xEF]);

    // The connection survives garbage and can still authenticate.
    peer.send(&Inbound::AuthenticateClient {
        credential_token: "dev-A".into(),
        client_info: serde_json::json!({"hostname": "lab-pc"}),
    });
    assert!(matches!(
        peer.recv().await,
        Some(Outbound::AuthSuccess { .. })
    ));
}

#[tokio::test]
async fn test_session_limit_enforced() {
    let relay = TestRelay::start_with_config(RelayConfig {
        name: "Tiny Relay".into(),
        max_sessions: 1,
    })
    .await;

    let _first = relay.connect_client("dev-A", "lab-pc").await;

    let mut second = relay.connect();
    second.send(&Inbound::AuthenticateClient {
        credential_token: "dev-B".into(),
        client_info: serde_json::json!({"hostname": "other-pc"}),
    });

    match second.recv().await {
        Some(Outbound::AuthError { message }) => {
            assert!(message.contains("limit"));
        }
        other => panic!("expected auth-error, got {other:?}"),
    }
    assert!(second.wait_closed(DEFAULT_TIMEOUT).await);
    assert_eq!(relay.registry().client_count(), 1);
}

#[tokio::test]
async fn test_reauthentication_is_ignored() {
    let relay = TestRelay::start().await;
    let mut client = relay.connect_client("dev-A", "lab-pc").await;

    client.send(&Inbound::AuthenticateClient {
        credential_token: "dev-B".into(),
        client_info: serde_json::json!({"hostname": "other"}),
    });

    // No second auth-success, no second session.
    assert!(client.recv_timeout(QUIET).await.is_none());
    assert_eq!(relay.registry().client_count(), 1);
}
