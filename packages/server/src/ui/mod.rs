//! UI layer: the TCP accept loop and the per-connection protocol handler.

mod handler;
mod server;
mod signal;
mod state;

pub use server::Server;
pub use signal::shutdown_signal;
