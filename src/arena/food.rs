use rand::seq::SliceRandom;

use crate::arena::constants::{eject, food};
use crate::arena::world::World;
use crate::arena::EntityId;
use crate::util::vec2::Vec2;

/// A consumable pellet. Ejected mass is food with residual velocity.
#[derive(Debug, Clone)]
pub struct Food {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub mass: f32,
    pub color: &'static str,
    pub ejected: bool,
}

impl Food {
    /// Stationary pellet with a random palette color
    pub fn new(id: EntityId, position: Vec2) -> Self {
        let color = food::PALETTE
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(food::PALETTE[0]);
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            radius: food::RADIUS,
            mass: food::MASS,
            color,
            ejected: false,
        }
    }

    /// Larger, brightly colored pellet thrown out by a cell
    pub fn ejected(id: EntityId, position: Vec2, velocity: Vec2) -> Self {
        Self {
            id,
            position,
            velocity,
            radius: eject::PELLET_RADIUS,
            mass: eject::PELLET_MASS,
            color: eject::PELLET_COLOR,
            ejected: true,
        }
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.velocity.x != 0.0 || self.velocity.y != 0.0
    }

    /// Advance residual velocity with friction, then clamp to the world
    pub fn update(&mut self, world: &World) {
        if self.is_moving() {
            self.position += self.velocity;
            self.velocity *= food::FRICTION;

            if self.velocity.x.abs() < food::STOP_THRESHOLD {
                self.velocity.x = 0.0;
            }
            if self.velocity.y.abs() < food::STOP_THRESHOLD {
                self.velocity.y = 0.0;
            }
        }
        self.position = world.clamp_circle(self.position, self.radius);
    }
}
