// Process bootstrap: logging, configuration and the watch/admin entry points.

use crate::domain::Urgency;
use crate::frameworks::config;
use crate::interface_adapters::clients::AdminClient;
use crate::interface_adapters::net::{
    ConnectionManager, ConnectionPhase, ConnectionSettings, ReconnectPolicy, WsConnector,
};
use crate::use_cases::{
    DashboardEvent, DashboardOutputs, DashboardSession, DashboardSettings, DashboardView,
};

use std::future::Future;
use std::io::Result;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const USAGE: &str = "usage: battle_client [watch | score <entity> <points> [gift] | reset | history | leaderboard]";

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Watch,
    Score {
        entity: String,
        points: u64,
        gift: Option<String>,
    },
    Reset,
    History,
    Leaderboard,
}

impl Command {
    /// Parses the arguments after the program name; the error is the usage line.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> std::result::Result<Self, String> {
        let args: Vec<String> = args.into_iter().collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            [] | ["watch"] => Ok(Command::Watch),
            ["reset"] => Ok(Command::Reset),
            ["history"] => Ok(Command::History),
            ["leaderboard"] => Ok(Command::Leaderboard),
            ["score", entity, points, rest @ ..] if rest.len() <= 1 => {
                let points = points
                    .parse::<u64>()
                    .map_err(|_| format!("invalid points '{points}'\n{USAGE}"))?;
                Ok(Command::Score {
                    entity: entity.to_string(),
                    points,
                    gift: rest.first().map(|gift| gift.to_string()),
                })
            }
            _ => Err(USAGE.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ws_url: String,
    pub api_url: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub highlight_window: Duration,
    pub admin_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            ws_url: config::ws_url(),
            api_url: config::api_url(),
            reconnect: config::reconnect_policy(),
            connect_timeout: config::connect_timeout(),
            highlight_window: config::rank_highlight_window(),
            admin_timeout: config::admin_timeout(),
        }
    }
}

pub async fn run(client_config: ClientConfig, command: Command) -> Result<()> {
    match command {
        Command::Watch => watch(client_config, shutdown_signal()).await,
        admin => run_admin(client_config, admin).await,
    }
}

pub async fn run_with_config(command: Command) -> Result<()> {
    init_runtime();
    run(ClientConfig::from_env(), command).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
}

/// Follows the live battle until `shutdown` resolves, then tears everything down.
pub async fn watch<F: Future<Output = ()>>(client_config: ClientConfig, shutdown: F) -> Result<()> {
    let mut settings = ConnectionSettings::new(client_config.ws_url.clone());
    settings.reconnect = client_config.reconnect;
    settings.connect_timeout = client_config.connect_timeout;
    settings.event_channel_capacity = config::EVENT_CHANNEL_CAPACITY;

    let (mut manager, conn_rx) = ConnectionManager::new(WsConnector, settings);
    let (session, outputs, handle) = DashboardSession::new(DashboardSettings {
        highlight_window: client_config.highlight_window,
        event_channel_capacity: config::DASHBOARD_EVENT_CAPACITY,
    });

    let session_task = tokio::spawn(session.run(conn_rx));
    let presenter_task = tokio::spawn(present(outputs));
    let phase_task = tokio::spawn(log_phases(manager.subscribe_phase()));

    info!(url = %client_config.ws_url, "watching battle");
    manager.open();

    shutdown.await;
    info!("shutting down");

    manager.close().await;
    phase_task.abort();
    handle.stop();
    if let Err(e) = session_task.await {
        warn!(error = %e, "dashboard session ended abnormally");
    }
    // The presenter ends once the session drops its senders.
    if let Err(e) = presenter_task.await {
        warn!(error = %e, "presenter ended abnormally");
    }
    Ok(())
}

async fn log_phases(mut phases: watch::Receiver<ConnectionPhase>) {
    while phases.changed().await.is_ok() {
        let phase = *phases.borrow_and_update();
        debug!(?phase, "connection phase");
    }
}

// Log-based presentation of view changes and one-shot events.
async fn present(mut outputs: DashboardOutputs) {
    let mut view_open = true;
    let mut events_open = true;

    while view_open || events_open {
        tokio::select! {
            changed = outputs.view.changed(), if view_open => {
                if changed.is_err() {
                    view_open = false;
                    continue;
                }
                let line = render_view(&outputs.view.borrow_and_update());
                info!("{line}");
            }
            event = outputs.events.recv(), if events_open => match event {
                Some(event) => log_event(&event),
                None => events_open = false,
            },
        }
    }
    debug!("presenter exited");
}

fn log_event(event: &DashboardEvent) {
    match event {
        DashboardEvent::TopTierGift(gift) => info!(
            user = %gift.user,
            gift = %gift.gift_name,
            points = gift.points,
            target = %gift.target_entity,
            "top-tier gift arrived"
        ),
        DashboardEvent::BattleEnded {
            winner,
            final_rankings,
        } => {
            info!(%winner, entities = final_rankings.len(), "battle over");
            for ranking in final_rankings {
                info!(
                    position = ranking.position,
                    name = %ranking.name,
                    score = ranking.score,
                    "final standing"
                );
            }
        }
        DashboardEvent::Connectivity { connected } => {
            if *connected {
                info!("live");
            } else {
                warn!("offline; reconnecting");
            }
        }
    }
}

/// One-line textual rendering of the dashboard.
pub fn render_view(view: &DashboardView) -> String {
    if !view.active {
        let notice = view.notice.as_deref().unwrap_or("No active battle");
        return format!("[{}] {notice}", link_label(view.connected));
    }

    let urgency = match view.clock.urgency() {
        Urgency::Calm => "",
        Urgency::Warning => " !",
        Urgency::Critical => " !!",
    };
    let standings: Vec<String> = view
        .rankings
        .iter()
        .map(|row| {
            let mut cell = format!(
                "{}. {} {}",
                row.entity.position, row.entity.name, row.entity.score
            );
            if row.rank_improved {
                cell.push_str(" ^");
            }
            if row.is_winner {
                cell.push_str(" (winner)");
            }
            cell
        })
        .collect();

    let status = if view.finished {
        "finished".to_string()
    } else {
        format!("{}{urgency}", view.clock.format_remaining())
    };
    format!(
        "[{}] {status} | {}",
        link_label(view.connected),
        standings.join(", ")
    )
}

fn link_label(connected: bool) -> &'static str {
    if connected { "live" } else { "offline" }
}

async fn run_admin(client_config: ClientConfig, command: Command) -> Result<()> {
    let client = AdminClient::new(client_config.api_url.clone(), client_config.admin_timeout)
        .map_err(|e| std::io::Error::other(format!("failed to initialize admin client: {e}")))?;
    debug!(
        api_url = %client_config.api_url,
        admin_timeout_ms = client_config.admin_timeout.as_millis() as u64,
        "admin client configured"
    );

    let outcome = match command {
        Command::Score {
            entity,
            points,
            gift,
        } => client
            .manual_score(&entity, points, gift.as_deref())
            .await
            .map(|response| println!("{}", response.summary())),
        Command::Reset => client
            .reset()
            .await
            .map(|response| println!("{}", response.summary())),
        Command::History => client.history().await.map(|battles| {
            for battle in battles {
                println!(
                    "{} {} by {} winner={}",
                    battle.started_at,
                    battle.id,
                    battle.creator_username,
                    battle.winner_country.as_deref().unwrap_or("-")
                );
            }
        }),
        Command::Leaderboard => client.leaderboard().await.map(|entries| {
            for entry in entries {
                println!(
                    "{} wins={} 2nd={} 3rd={} battles={} win_rate={}%",
                    entry.country_name,
                    entry.total_wins,
                    entry.total_second_place,
                    entry.total_third_place,
                    entry.total_battles,
                    entry.win_rate_pct()
                );
            }
        }),
        Command::Watch => Ok(()),
    };

    outcome.map_err(|e| {
        warn!(error = %e, "admin request failed");
        std::io::Error::other(e.to_string())
    })
}
