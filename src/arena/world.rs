use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::util::vec2::Vec2;

/// Rectangular world bounds with the origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub width: f32,
    pub height: f32,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Keep a circle of the given radius fully inside the world.
    ///
    /// A circle wider than the world is pinned to its lower edge instead of panicking.
    pub fn clamp_circle(&self, position: Vec2, radius: f32) -> Vec2 {
        Vec2::new(
            position.x.min(self.width - radius).max(radius),
            position.y.min(self.height - radius).max(radius),
        )
    }

    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0 && position.x <= self.width && position.y >= 0.0 && position.y <= self.height
    }

    /// Uniform random point anywhere in the world
    pub fn random_point(&self) -> Vec2 {
        let mut rng = rand::thread_rng();
        Vec2::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }

    /// Uniform random point in the central half of the world (spawn area)
    pub fn random_spawn_point(&self) -> Vec2 {
        let mut rng = rand::thread_rng();
        Vec2::new(
            rng.gen_range(self.width * 0.25..self.width * 0.75),
            rng.gen_range(self.height * 0.25..self.height * 0.75),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_circle() {
        let world = World::new(100.0, 100.0);
        assert_eq!(world.clamp_circle(Vec2::new(-5.0, 50.0), 10.0), Vec2::new(10.0, 50.0));
        assert_eq!(world.clamp_circle(Vec2::new(50.0, 120.0), 10.0), Vec2::new(50.0, 90.0));
        // Oversized circle does not panic
        let pinned = world.clamp_circle(Vec2::new(50.0, 50.0), 80.0);
        assert_eq!(pinned, Vec2::new(80.0, 80.0));
    }

    #[test]
    fn test_spawn_point_in_center() {
        let world = World::new(1000.0, 1000.0);
        for _ in 0..100 {
            let p = world.random_spawn_point();
            assert!(p.x >= 250.0 && p.x < 750.0);
            assert!(p.y >= 250.0 && p.y < 750.0);
        }
    }

    #[test]
    fn test_contains() {
        let world = World::new(100.0, 50.0);
        assert!(world.contains(Vec2::new(100.0, 50.0)));
        assert!(!world.contains(Vec2::new(-0.1, 10.0)));
        assert!(!world.contains(Vec2::new(10.0, 50.1)));
    }
}
