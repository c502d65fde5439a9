// Network adapter modules: transport ports and the reconnecting connection manager.

pub mod connection;
pub mod transport;

pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionPhase, ConnectionSettings, ReconnectPolicy,
};
pub use transport::{Connector, Transport, WsConnector, WsTransport};

#[cfg(test)]
pub(crate) mod test_support;
