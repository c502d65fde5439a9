// Outbound HTTP clients for the battle server's admin and read-only endpoints.

pub mod admin;

pub use admin::{AdminClient, AdminError};
