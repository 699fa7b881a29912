//! Error types surfaced by room operations and the network layer

use thiserror::Error;

/// Room operations that are refused with an explicit reply to the requester.
///
/// The `Display` text is what the client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Game already started")]
    GameInProgress,
    #[error("Need at least 2 players to start")]
    InsufficientPlayers,
    #[error("Not in a room")]
    NotInRoom,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}
