//! Channel-based broadcast to subscribed observers, with per-connection
//! send-failure eviction (spec.md §4.12).

mod connection;
mod error;
mod fanout;
mod transport;
mod types;

pub use connection::ClientConnection;
pub use error::{Result, WsError};
pub use fanout::WSFanout;
pub use transport::{decode, encode};
pub use types::{default_subscriptions, Channel, ClientMessage, EventType, WsEvent};
