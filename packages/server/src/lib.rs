//! TCP session relay server.
//!
//! Clients open a session (and get a short code) or join one by its code.
//! Once admitted, every byte a member sends is relayed to all other members of
//! the same session.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
