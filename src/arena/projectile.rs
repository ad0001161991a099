use crate::arena::constants::shoot;
use crate::arena::player::PlayerId;
use crate::arena::world::World;
use crate::arena::EntityId;
use crate::util::vec2::Vec2;

/// Explosive shot fired by a player. Travels in a straight line until it
/// expires, leaves the world or strikes a cell of another player.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub created_at: u64,
}

impl Projectile {
    pub fn new(id: EntityId, owner: PlayerId, position: Vec2, direction: Vec2, now_ms: u64) -> Self {
        Self {
            id,
            owner,
            position,
            velocity: direction * shoot::PROJECTILE_SPEED,
            radius: shoot::PROJECTILE_RADIUS,
            created_at: now_ms,
        }
    }

    #[inline]
    pub fn update(&mut self) {
        self.position += self.velocity;
    }

    #[inline]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > shoot::PROJECTILE_LIFESPAN_MS
    }

    /// Expired or outside the world
    pub fn is_dead(&self, now_ms: u64, world: &World) -> bool {
        self.is_expired(now_ms) || !world.contains(self.position)
    }
}
