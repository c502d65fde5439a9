// Scripted transport doubles for connection tests.

use crate::domain::TransportError;
use crate::interface_adapters::net::transport::{Connector, InboundFrame, Transport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) type ScriptedFrame = Option<Result<InboundFrame, TransportError>>;

/// Replays scripted frames, then stays silent until closed.
pub(crate) struct ScriptedTransport {
    // `None` entries simulate the server closing the connection.
    incoming: VecDeque<ScriptedFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub(crate) fn new(incoming: Vec<ScriptedFrame>) -> Self {
        Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    pub(crate) fn closed(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.lock().expect("sent mutex poisoned").push(text);
        Ok(())
    }

    async fn recv_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        match self.incoming.pop_front() {
            Some(frame) => frame,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Hands out scripted connect outcomes in order; refuses once exhausted.
#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    outcomes: Arc<Mutex<VecDeque<Result<ScriptedTransport, TransportError>>>>,
    attempts: Arc<Mutex<usize>>,
}

impl ScriptedConnector {
    pub(crate) fn new(outcomes: Vec<Result<ScriptedTransport, TransportError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        *self.attempts.lock().expect("attempts mutex poisoned")
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, _url: &str) -> Result<ScriptedTransport, TransportError> {
        *self.attempts.lock().expect("attempts mutex poisoned") += 1;
        self.outcomes
            .lock()
            .expect("outcomes mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("connection refused".to_string())))
    }
}
