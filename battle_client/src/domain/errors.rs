// Error taxonomy for the live-update channel.
// Neither kind is fatal: transport errors feed the reconnect loop and protocol
// errors drop a single frame.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Connect(String),
    ConnectTimeout,
    Receive(String),
    Send(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(err) => write!(f, "connect failed: {err}"),
            TransportError::ConnectTimeout => write!(f, "connect timed out"),
            TransportError::Receive(err) => write!(f, "receive failed: {err}"),
            TransportError::Send(err) => write!(f, "send failed: {err}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidJson(String),
    UnknownType(String),
    BinaryFrame,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(err) => write!(f, "invalid message payload: {err}"),
            ProtocolError::UnknownType(kind) => write!(f, "unknown message type: {kind}"),
            ProtocolError::BinaryFrame => write!(f, "binary frames are not supported"),
        }
    }
}

impl std::error::Error for ProtocolError {}
