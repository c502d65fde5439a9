mod support;

use battle_client::interface_adapters::net::{
    ConnectionEvent, ConnectionManager, ConnectionPhase, ConnectionSettings, ReconnectPolicy,
    WsConnector,
};
use battle_client::use_cases::{DashboardEvent, DashboardSession, DashboardSettings};
use battle_client::{ClientConfig, watch};
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn when_server_streams_battle_then_dashboard_follows_to_the_end() {
    let (mut manager, conn_rx) =
        ConnectionManager::new(WsConnector, ConnectionSettings::new(support::ws_url()));
    let (session, mut outputs, handle) = DashboardSession::new(DashboardSettings::default());
    let session_task = tokio::spawn(session.run(conn_rx));

    assert!(manager.open());

    let mut seen = Vec::new();
    timeout(Duration::from_secs(5), async {
        while let Some(event) = outputs.events.recv().await {
            let ended = matches!(event, DashboardEvent::BattleEnded { .. });
            seen.push(event);
            if ended {
                break;
            }
        }
    })
    .await
    .expect("battle should end within the timeout");

    assert_eq!(seen[0], DashboardEvent::Connectivity { connected: true });
    match &seen[1] {
        DashboardEvent::TopTierGift(gift) => {
            assert_eq!(gift.gift_name, "Lion");
            assert_eq!(gift.target_entity, "Egypt");
        }
        other => panic!("expected top-tier gift, got {other:?}"),
    }
    match &seen[2] {
        DashboardEvent::BattleEnded {
            winner,
            final_rankings,
        } => {
            assert_eq!(winner, "Egypt");
            assert_eq!(final_rankings.len(), 2);
        }
        other => panic!("expected battle end, got {other:?}"),
    }

    let view = outputs.view.borrow().clone();
    assert!(view.connected);
    assert!(view.finished);
    assert_eq!(view.rankings[0].entity.name, "Egypt");
    assert!(view.rankings[0].is_winner);
    assert_eq!(view.battle_id.as_deref(), Some("b-1"));
    assert!(support::heartbeats_received() >= 1);

    manager.close().await;
    assert_eq!(manager.phase(), ConnectionPhase::Idle);
    handle.stop();
    session_task.await.expect("session task");
}

#[tokio::test]
async fn when_server_refuses_then_reconnects_keep_being_scheduled() {
    // Bind and release a port so nothing is listening on it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let mut settings = ConnectionSettings::new(format!("ws://{addr}/ws"));
    settings.reconnect = ReconnectPolicy::Fixed(Duration::from_millis(20));
    settings.connect_timeout = Duration::from_secs(1);
    let (mut manager, mut conn_rx) = ConnectionManager::new(WsConnector, settings);
    manager.open();

    let mut scheduled = Vec::new();
    timeout(Duration::from_secs(5), async {
        while scheduled.len() < 3 {
            match conn_rx.recv().await {
                Some(ConnectionEvent::ReconnectScheduled { attempt, .. }) => {
                    scheduled.push(attempt)
                }
                Some(ConnectionEvent::Connected) => panic!("nothing should accept"),
                Some(_) => {}
                None => break,
            }
        }
    })
    .await
    .expect("reconnects should be scheduled");

    assert_eq!(scheduled, vec![2, 3, 4]);
    assert!(!manager.is_connected());

    manager.close().await;
    assert_eq!(manager.phase(), ConnectionPhase::Idle);
}

#[tokio::test]
async fn when_watch_shutdown_resolves_then_it_returns_cleanly() {
    let config = ClientConfig {
        ws_url: support::ws_url(),
        api_url: support::api_url(),
        reconnect: ReconnectPolicy::default(),
        connect_timeout: Duration::from_secs(1),
        highlight_window: Duration::from_millis(200),
        admin_timeout: Duration::from_secs(1),
    };

    let result = timeout(
        Duration::from_secs(5),
        watch(config, tokio::time::sleep(Duration::from_millis(300))),
    )
    .await
    .expect("watch should stop after shutdown");
    assert!(result.is_ok());
}
