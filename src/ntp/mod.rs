//! Wire-level NTP handling.

pub mod codec;
