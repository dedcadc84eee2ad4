//! WSFanout errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("connection limit reached ({0} connections)")]
    ConnectionLimitReached(usize),

    #[error("unknown connection: {0}")]
    UnknownConnection(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, WsError>;
