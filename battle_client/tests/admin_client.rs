mod support;

use battle_client::interface_adapters::clients::{AdminClient, AdminError};
use reqwest::StatusCode;
use std::time::Duration;

fn client() -> AdminClient {
    AdminClient::new(support::api_url(), Duration::from_secs(2)).expect("admin client")
}

#[tokio::test]
async fn when_gift_is_named_then_catalog_points_are_sent() {
    let response = client()
        .manual_score("Egypt", 1, Some("Lion"))
        .await
        .expect("manual score should succeed");

    assert_eq!(response.message.as_deref(), Some("Score updated"));
    assert_eq!(response.summary(), "+500 pts -> Egypt (Lion)");
}

#[tokio::test]
async fn when_server_rejects_then_detail_is_surfaced() {
    let err = client()
        .manual_score("Atlantis", 5, None)
        .await
        .expect_err("unknown entity should be rejected");

    match err {
        AdminError::Rejected { status, detail } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(detail.as_deref(), Some("Country not in this battle"));
        }
        other => panic!("expected rejection, got {other}"),
    }
}

#[tokio::test]
async fn when_reset_then_message_is_returned() {
    let response = client().reset().await.expect("reset should succeed");
    assert_eq!(response.summary(), "Battle reset");
}

#[tokio::test]
async fn when_history_and_leaderboard_requested_then_entries_decode() {
    let client = client();

    let history = client.history().await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].winner_country.as_deref(), Some("Egypt"));
    assert!(history[1].ended_at.is_none());

    let leaderboard = client.leaderboard().await.expect("leaderboard");
    assert_eq!(leaderboard[0].country_name, "Egypt");
    assert_eq!(leaderboard[0].win_rate_pct(), 75);
}

#[tokio::test]
async fn when_battle_is_active_then_snapshot_is_returned() {
    let snapshot = client().active_battle().await.expect("active battle");

    assert!(snapshot.is_active());
    assert_eq!(snapshot.battle_id.as_deref(), Some("b-1"));
    assert_eq!(snapshot.scores.max_score(), 30);
    assert_eq!(snapshot.clock().remaining_seconds(), 100);
}

#[tokio::test]
async fn when_server_is_unreachable_then_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = AdminClient::new(format!("http://{addr}"), Duration::from_secs(1))
        .expect("admin client");
    let err = client.reset().await.expect_err("nothing is listening");
    assert!(matches!(err, AdminError::Transport(_)));
}
