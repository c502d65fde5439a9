// Interface adapters: wire protocol, live socket handling and HTTP clients.

pub mod clients;
pub mod net;
pub mod protocol;
