//! Mass-collection arena simulation
//!
//! Cells, food and projectiles advanced on a fixed tick by [`game::Game`].

pub mod cell;
pub mod constants;
pub mod food;
pub mod game;
pub mod player;
pub mod projectile;
pub mod spatial;
pub mod world;

/// Identifier for cells, food and projectiles
pub type EntityId = u64;

/// Monotonic entity id allocator
#[derive(Debug, Default, Clone)]
pub struct EntityIds {
    next: EntityId,
}

impl EntityIds {
    #[inline]
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Why an arena action was rejected. The session drops these silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArenaActionError {
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Action is cooling down")]
    CoolingDown,
    #[error("Cell cap reached")]
    CellCapReached,
    #[error("Not enough mass")]
    NotEnoughMass,
    #[error("Invalid target")]
    InvalidTarget,
}
