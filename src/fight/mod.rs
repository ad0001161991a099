//! One-on-one fighter game
//!
//! Matchmaking queue, rooms with a round state machine, fighters, and the
//! deferred room tasks that drive countdowns and round transitions.

pub mod constants;
pub mod fighter;
pub mod manager;
pub mod queue;
pub mod room;
pub mod scheduler;

/// Room identifier, unique for the life of the process
pub type RoomId = u64;

/// Errors surfaced to the caller of a fight operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FightError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("All fighter slots already taken")]
    NoFreeSlot,
}

/// A round state change not allowed by the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Illegal round transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: room::RoundState,
    pub to: room::RoundState,
}
