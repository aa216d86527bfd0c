//! I/O adapters: name resolution and the UDP exchange.

pub mod ntp_client;
pub mod resolver;
