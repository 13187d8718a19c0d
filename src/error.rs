use thiserror::Error;

/// The result of attempting to create or join a room.
#[derive(Error, Debug)]
pub enum RoomError {
    #[error("no room exists with the given key")]
    RoomNotFound,
    #[error("room already has the maximum of 10 clients")]
    RoomFull,
}

/// An internal rejection raised by a [crate::game::Game] mutator.
///
/// These never reach a client directly (see spec.md §7): the coordinator
/// either never calls a mutator in a state where it could fail this way, or
/// treats the `Err` as a silent drop. The type exists so engine mutators can
/// be tested and logged precisely instead of failing open.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    #[error("action is not valid in the current game state")]
    WrongState,
    #[error("player index is out of range")]
    InvalidPlayerIndex,
    #[error("player is not eligible for this action")]
    NotEligible,
    #[error("games are only playable with 5 to 10 players")]
    InvalidPlayerCount,
}
