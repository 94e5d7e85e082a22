//! CLI client for the TCP session relay.

pub mod error;
pub mod relay;
pub mod session;

pub use error::ClientError;
pub use relay::relay;
pub use session::{Admission, Request, open_session};
