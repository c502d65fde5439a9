// Reconnecting connection manager for the live-update socket.
//
// One background task owns the transport. It answers heartbeats, decodes
// snapshots, forwards them to the consumer channel and reconnects forever
// after any drop until the owner calls `close`.

use crate::domain::{BattleSnapshot, TransportError};
use crate::interface_adapters::net::transport::{Connector, Transport};
use crate::interface_adapters::protocol::{HEARTBEAT_TOKEN, InboundMessage, decode_frame};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, trace, warn};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
// Caps the doubling exponent so the multiplication cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Delay between a drop (or failed attempt) and the next connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Fixed(Duration),
    /// Doubles per consecutive failure, capped at `max`. Attempts are unbounded.
    Backoff { base: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// `consecutive_failures` counts from 1 for the first failure after an open.
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Backoff { base, max } => {
                let shift = consecutive_failures.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                base.saturating_mul(1 << shift).min(max)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub event_channel_capacity: usize,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Open,
    Closing,
    ReconnectPending,
}

/// Events delivered to the consumer, in arrival order.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Message(BattleSnapshot),
    TransportError(TransportError),
    ReconnectScheduled { attempt: u64, delay: Duration },
}

// Status shared by the handle and every loop it spawned.
#[derive(Debug)]
struct LinkStatus {
    connected: AtomicBool,
    phase: watch::Sender<ConnectionPhase>,
    // Push identities keep increasing across reconnects and reopens.
    sequence: AtomicU64,
}

impl LinkStatus {
    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }
}

pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    settings: ConnectionSettings,
    events_tx: mpsc::Sender<ConnectionEvent>,
    status: Arc<LinkStatus>,
    // Liveness flag and wake-up for the currently running loop.
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates an idle manager and the receiver its events are delivered on.
    pub fn new(
        connector: C,
        settings: ConnectionSettings,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        // tokio panics on zero-capacity channels.
        let (events_tx, events_rx) = mpsc::channel(settings.event_channel_capacity.max(1));
        let (phase, _phase_rx) = watch::channel(ConnectionPhase::Idle);
        let manager = Self {
            connector: Arc::new(connector),
            settings,
            events_tx,
            status: Arc::new(LinkStatus {
                connected: AtomicBool::new(false),
                phase,
                sequence: AtomicU64::new(0),
            }),
            alive: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            task: None,
        };
        (manager, events_rx)
    }

    /// Starts the connection loop. Returns false (and does nothing) when a loop
    /// is already connected, connecting, or waiting to reconnect.
    pub fn open(&mut self) -> bool {
        if self.task.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("open ignored; connection loop already running");
            return false;
        }

        // Fresh liveness state so a stale shutdown permit cannot stop the new loop.
        self.alive = Arc::new(AtomicBool::new(true));
        self.shutdown = Arc::new(Notify::new());

        let conn_loop = ConnectionLoop {
            connector: self.connector.clone(),
            settings: self.settings.clone(),
            events_tx: self.events_tx.clone(),
            status: self.status.clone(),
            alive: self.alive.clone(),
            shutdown: self.shutdown.clone(),
        };
        self.task = Some(tokio::spawn(conn_loop.run()));
        true
    }

    /// Closes the transport and cancels any pending reconnect. Idempotent.
    pub async fn close(&mut self) {
        self.alive.store(false, Ordering::Release);
        self.shutdown.notify_one();

        if let Some(mut task) = self.task.take() {
            match timeout(CLOSE_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => warn!(error = %join_err, "connection loop ended abnormally"),
                Err(_) => {
                    warn!("connection loop did not stop in time; aborting");
                    task.abort();
                }
            }
        }

        self.status.connected.store(false, Ordering::Release);
        self.status.set_phase(ConnectionPhase::Idle);
    }

    pub fn is_connected(&self) -> bool {
        self.status.connected.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self.status.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.status.phase.subscribe()
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        // No executor to await a graceful close here; stop the loop outright.
        self.alive.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SessionOutcome {
    // The connection (or the attempt) ended; a reconnect follows.
    Dropped,
    // The owner closed the manager.
    Shutdown,
    // Nobody receives events anymore.
    ConsumerGone,
}

struct ConnectionLoop<C: Connector> {
    connector: Arc<C>,
    settings: ConnectionSettings,
    events_tx: mpsc::Sender<ConnectionEvent>,
    status: Arc<LinkStatus>,
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl<C: Connector> ConnectionLoop<C> {
    async fn run(self) {
        let mut attempt: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        while self.is_live() {
            attempt += 1;
            let span = info_span!("conn", attempt);
            let (outcome, opened) = self.connect_and_serve().instrument(span).await;

            match outcome {
                SessionOutcome::Shutdown | SessionOutcome::ConsumerGone => break,
                SessionOutcome::Dropped => {}
            }
            if opened {
                consecutive_failures = 0;
            }
            consecutive_failures = consecutive_failures.saturating_add(1);

            if !self.is_live() {
                break;
            }

            let delay = self.settings.reconnect.delay(consecutive_failures);
            self.status.set_phase(ConnectionPhase::ReconnectPending);
            info!(
                next_attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
            let scheduled = ConnectionEvent::ReconnectScheduled {
                attempt: attempt + 1,
                delay,
            };
            if self.emit(scheduled).await.is_err() {
                break;
            }

            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            // The owner may have torn down while the timer was pending.
            if !self.is_live() {
                debug!("reconnect abandoned; manager closed");
                break;
            }
        }

        self.status.connected.store(false, Ordering::Release);
        self.status.set_phase(ConnectionPhase::Idle);
        debug!("connection loop exited");
    }

    fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn emit(&self, event: ConnectionEvent) -> Result<(), ()> {
        self.events_tx.send(event).await.map_err(|_| {
            debug!("event receiver dropped; stopping connection loop");
        })
    }

    /// One connect attempt plus the session on success. The flag reports
    /// whether the connection reached `Open`.
    async fn connect_and_serve(&self) -> (SessionOutcome, bool) {
        self.status.set_phase(ConnectionPhase::Connecting);
        info!(url = %self.settings.url, "connecting");

        let connect = timeout(
            self.settings.connect_timeout,
            self.connector.connect(&self.settings.url),
        );
        let connected = tokio::select! {
            _ = self.shutdown.notified() => return (SessionOutcome::Shutdown, false),
            result = connect => result,
        };

        let mut transport = match connected {
            Ok(Ok(transport)) => transport,
            Ok(Err(err)) => {
                warn!(error = %err, "connect attempt failed");
                return (self.report_error(err).await, false);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.connect_timeout.as_millis() as u64,
                    "connect attempt timed out"
                );
                return (self.report_error(TransportError::ConnectTimeout).await, false);
            }
        };

        // Closed during the handshake: nobody will observe this connection.
        if !self.is_live() {
            let _ = transport.close().await;
            return (SessionOutcome::Shutdown, false);
        }

        self.status.connected.store(true, Ordering::Release);
        self.status.set_phase(ConnectionPhase::Open);
        info!("connected");
        if self.emit(ConnectionEvent::Connected).await.is_err() {
            let _ = transport.close().await;
            return (SessionOutcome::ConsumerGone, true);
        }

        let outcome = self.serve(&mut transport).await;

        self.status.connected.store(false, Ordering::Release);
        let outcome = match outcome {
            // Teardown must not wait on a full channel.
            SessionOutcome::Shutdown => {
                let _ = self.events_tx.try_send(ConnectionEvent::Disconnected);
                SessionOutcome::Shutdown
            }
            SessionOutcome::ConsumerGone => SessionOutcome::ConsumerGone,
            SessionOutcome::Dropped => match self.emit(ConnectionEvent::Disconnected).await {
                Ok(()) => SessionOutcome::Dropped,
                Err(()) => SessionOutcome::ConsumerGone,
            },
        };
        info!("disconnected");
        (outcome, true)
    }

    async fn serve(&self, transport: &mut C::Transport) -> SessionOutcome {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    self.status.set_phase(ConnectionPhase::Closing);
                    if let Err(err) = transport.close().await {
                        debug!(error = %err, "transport close error");
                    }
                    return SessionOutcome::Shutdown;
                }
                frame = transport.recv_frame() => match frame {
                    Some(Ok(Ok(text))) => {
                        if let Some(outcome) = self.handle_text(transport, &text).await {
                            return outcome;
                        }
                    }
                    Some(Ok(Err(err))) => {
                        warn!(error = %err, "dropping unsupported frame");
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "transport error");
                        self.status.set_phase(ConnectionPhase::Closing);
                        let _ = transport.close().await;
                        return self.report_error(err).await;
                    }
                    None => {
                        info!("connection closed by server");
                        return SessionOutcome::Dropped;
                    }
                }
            }
        }
    }

    /// Handles one text frame; returns an outcome only when the session must end.
    async fn handle_text(
        &self,
        transport: &mut C::Transport,
        text: &str,
    ) -> Option<SessionOutcome> {
        let message = match decode_frame(text) {
            Ok(message) => message,
            Err(err) => {
                // One bad frame must not end a live session.
                warn!(error = %err, bytes = text.len(), "dropping malformed message");
                return None;
            }
        };

        match message {
            InboundMessage::Ping => {
                if let Err(err) = transport.send_text(HEARTBEAT_TOKEN.to_string()).await {
                    warn!(error = %err, "heartbeat reply failed");
                    let _ = transport.close().await;
                    return Some(self.report_error(err).await);
                }
                trace!("heartbeat answered");
                None
            }
            InboundMessage::Pong => {
                trace!("heartbeat reply received");
                None
            }
            message => {
                let sequence = self.status.sequence.fetch_add(1, Ordering::AcqRel) + 1;
                let snapshot = message.into_snapshot(sequence)?;
                match self.emit(ConnectionEvent::Message(snapshot)).await {
                    Ok(()) => None,
                    Err(()) => Some(SessionOutcome::ConsumerGone),
                }
            }
        }
    }

    async fn report_error(&self, err: TransportError) -> SessionOutcome {
        match self.emit(ConnectionEvent::TransportError(err)).await {
            Ok(()) => SessionOutcome::Dropped,
            Err(()) => SessionOutcome::ConsumerGone,
        }
    }
}
