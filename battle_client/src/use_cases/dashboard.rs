// Dashboard session: the single task that owns battle state and rankings.
//
// Connection events are drained in arrival order, so every mutation of the
// store and the projector happens sequentially here.

use crate::domain::ranking::RANK_HIGHLIGHT_WINDOW;
use crate::domain::{
    BattleClock, BattleSnapshot, FinalRanking, LastGift, RankedEntity, RankingProjector,
};
use crate::interface_adapters::net::ConnectionEvent;
use crate::use_cases::state_store::StateStore;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRow {
    pub entity: RankedEntity,
    pub rank_improved: bool,
    pub is_winner: bool,
}

/// Everything a presentation layer needs to draw the current battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub connected: bool,
    pub active: bool,
    pub battle_id: Option<String>,
    pub creator_name: Option<String>,
    pub notice: Option<String>,
    pub clock: BattleClock,
    pub finished: bool,
    pub last_gift: Option<LastGift>,
    pub rankings: Vec<RankingRow>,
    pub max_score: u64,
}

impl Default for DashboardView {
    fn default() -> Self {
        let idle = BattleSnapshot::inactive(0);
        Self {
            connected: false,
            active: false,
            battle_id: None,
            creator_name: None,
            notice: None,
            clock: idle.clock(),
            finished: false,
            last_gift: None,
            rankings: Vec::new(),
            max_score: 0,
        }
    }
}

/// One-shot occurrences the presentation layer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    TopTierGift(LastGift),
    BattleEnded {
        winner: String,
        final_rankings: Vec<FinalRanking>,
    },
    Connectivity {
        connected: bool,
    },
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub highlight_window: Duration,
    pub event_channel_capacity: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            highlight_window: RANK_HIGHLIGHT_WINDOW,
            event_channel_capacity: 64,
        }
    }
}

/// Receivers handed to the presentation layer.
pub struct DashboardOutputs {
    pub view: watch::Receiver<DashboardView>,
    pub events: mpsc::Receiver<DashboardEvent>,
}

/// Stops a running session. Cloneable so teardown can happen from anywhere.
#[derive(Clone)]
pub struct SessionHandle {
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.shutdown.notify_one();
    }

    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

pub struct DashboardSession {
    store: StateStore,
    projector: RankingProjector,
    connected: bool,
    view_tx: watch::Sender<DashboardView>,
    events_tx: mpsc::Sender<DashboardEvent>,
    handle: SessionHandle,
}

impl DashboardSession {
    pub fn new(settings: DashboardSettings) -> (Self, DashboardOutputs, SessionHandle) {
        let (view_tx, view) = watch::channel(DashboardView::default());
        let (events_tx, events) = mpsc::channel(settings.event_channel_capacity.max(1));
        let handle = SessionHandle {
            alive: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        };
        let session = Self {
            store: StateStore::new(),
            projector: RankingProjector::new(settings.highlight_window),
            connected: false,
            view_tx,
            events_tx,
            handle: handle.clone(),
        };
        (session, DashboardOutputs { view, events }, handle)
    }

    /// Drains connection events until stopped or the connection side goes away.
    pub async fn run(mut self, mut conn_rx: mpsc::Receiver<ConnectionEvent>) {
        let shutdown = self.handle.shutdown.clone();

        while self.handle.is_live() {
            let expiry = self.projector.next_expiry();
            tokio::select! {
                _ = shutdown.notified() => break,
                event = conn_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("connection events closed");
                        break;
                    }
                },
                _ = wait_until(expiry) => {
                    // Teardown may race the highlight timer.
                    if !self.handle.is_live() {
                        break;
                    }
                    let now = Instant::now();
                    if self.projector.expire(now) {
                        self.publish(now);
                    }
                }
            }
        }

        self.projector.cancel_highlights();
        debug!("dashboard session exited");
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message(snapshot) => self.apply_snapshot(snapshot),
            ConnectionEvent::Connected => self.set_connected(true),
            ConnectionEvent::Disconnected => self.set_connected(false),
            ConnectionEvent::TransportError(err) => {
                debug!(error = %err, "transport error observed");
            }
            ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "waiting to reconnect"
                );
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: BattleSnapshot) {
        let now = Instant::now();
        let notifications = self.store.apply(snapshot);
        if notifications.any() {
            debug!(?notifications, "state edges crossed");
        }
        if notifications.battle_changed {
            debug!("battle changed; ranking history reset");
            self.projector.reset();
        }
        self.projector.project(&self.store.current().scores, now);
        self.publish(now);

        if notifications.arrived_top_tier_gift {
            if let Some(gift) = self.store.current().last_gift.clone() {
                info!(
                    user = %gift.user,
                    gift = %gift.gift_name,
                    target = %gift.target_entity,
                    "top-tier gift"
                );
                self.emit(DashboardEvent::TopTierGift(gift));
            }
        }

        let current = self.store.current();
        if notifications.battle_just_ended {
            let winner = current.winner.clone().unwrap_or_default();
            info!(%winner, "battle ended");
            let event = DashboardEvent::BattleEnded {
                winner,
                final_rankings: current.final_rankings.clone(),
            };
            self.emit(event);
        }
    }

    fn set_connected(&mut self, connected: bool) {
        if self.connected == connected {
            return;
        }
        self.connected = connected;
        self.publish(Instant::now());
        self.emit(DashboardEvent::Connectivity { connected });
    }

    // Never waits on the consumer; events beyond the queue capacity are dropped.
    fn emit(&self, event: DashboardEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "dashboard event queue full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("dashboard event receiver dropped");
            }
        }
    }

    fn publish(&self, now: Instant) {
        self.view_tx.send_replace(self.build_view(now));
    }

    fn build_view(&self, now: Instant) -> DashboardView {
        let snapshot = self.store.current();
        let winner = self
            .projector
            .winner()
            .filter(|_| snapshot.finished)
            .map(|entity| entity.name.as_str());
        let rankings = self
            .projector
            .rankings()
            .iter()
            .map(|entity| RankingRow {
                rank_improved: self.projector.is_rank_improved(&entity.name, now),
                is_winner: winner == Some(entity.name.as_str()),
                entity: entity.clone(),
            })
            .collect();

        DashboardView {
            connected: self.connected,
            active: snapshot.is_active(),
            battle_id: snapshot.battle_id.clone(),
            creator_name: snapshot.creator_name.clone(),
            notice: snapshot.notice.clone(),
            clock: snapshot.clock(),
            finished: snapshot.finished,
            last_gift: snapshot.last_gift.clone(),
            rankings,
            max_score: snapshot.scores.max_score(),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
