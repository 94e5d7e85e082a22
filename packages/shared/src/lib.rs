//! Code shared between the relay server and the CLI client.
//!
//! - `protocol`: action / status bytes exchanged during the handshake
//! - `logger`: tracing subscriber setup for the binaries

pub mod logger;
pub mod protocol;
