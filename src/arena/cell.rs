use crate::arena::constants::cell;
use crate::arena::world::World;
use crate::arena::EntityId;
use crate::util::vec2::Vec2;

/// A single mass-bearing circle owned by an arena player.
///
/// Mass and radius are never set independently: every mutation goes through
/// [`Cell::set_mass`], which keeps `radius == sqrt(mass * 100)`.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: String,
    /// Last time this cell took part in a split (gates re-merging)
    pub split_time: Option<u64>,
    /// Steering is suppressed until this timestamp
    pub split_boost_until: u64,
    radius: f32,
    mass: f32,
}

impl Cell {
    pub fn new(id: EntityId, position: Vec2, radius: f32, color: String) -> Self {
        let mut cell = Self {
            id,
            position,
            velocity: Vec2::ZERO,
            color,
            split_time: None,
            split_boost_until: 0,
            radius: 0.0,
            mass: 0.0,
        };
        cell.set_mass(radius * radius / cell::MASS_DIVISOR);
        cell
    }

    pub fn with_mass(id: EntityId, position: Vec2, mass: f32, color: String) -> Self {
        let mut cell = Self::new(id, position, 0.0, color);
        cell.set_mass(mass);
        cell
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Set mass and recompute the radius from it
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass.max(0.0);
        self.radius = (self.mass * cell::MASS_DIVISOR).sqrt();
    }

    pub fn add_mass(&mut self, delta: f32) {
        self.set_mass(self.mass + delta);
    }

    /// Per-tick speed: larger cells are slower, down to a floor
    pub fn speed(&self) -> f32 {
        (cell::BASE_SPEED - self.radius / cell::SPEED_RADIUS_FACTOR).max(cell::MIN_SPEED)
    }

    #[inline]
    pub fn is_boosted(&self, now_ms: u64) -> bool {
        now_ms < self.split_boost_until
    }

    /// Launch the cell with a velocity that ignores steering for `boost_ms`
    pub fn launch(&mut self, velocity: Vec2, now_ms: u64, boost_ms: u64) {
        self.velocity = velocity;
        self.split_boost_until = now_ms + boost_ms;
        self.split_time = Some(now_ms);
    }

    /// Steer towards `target`, integrate, apply friction and clamp to the world
    pub fn update(&mut self, target: Vec2, now_ms: u64, world: &World) {
        let boosted = self.is_boosted(now_ms);

        if !boosted {
            let (dir, distance) = (target - self.position).normalize_with_length();
            if distance > cell::STEER_DEADZONE {
                self.velocity = dir * self.speed();
            }
        }

        self.position += self.velocity;

        let friction = if boosted { cell::BOOST_FRICTION } else { cell::FRICTION };
        self.velocity *= friction;

        self.position = world.clamp_circle(self.position, self.radius);
    }

    /// Circle overlap test against an arbitrary circle
    #[inline]
    pub fn overlaps_circle(&self, position: Vec2, radius: f32) -> bool {
        let reach = self.radius + radius;
        self.position.distance_sq_to(position) < reach * reach
    }

    #[inline]
    pub fn overlaps(&self, other: &Cell) -> bool {
        self.overlaps_circle(other.position, other.radius)
    }

    /// True when this cell is strictly more than 10% heavier than `other`
    #[inline]
    pub fn can_eat(&self, other: &Cell) -> bool {
        self.mass > other.mass * cell::EAT_RATIO
    }

    /// Whether the merge cool-off since the last split has elapsed
    pub fn merge_ready(&self, now_ms: u64, cooloff_ms: u64) -> bool {
        match self.split_time {
            Some(t) => now_ms.saturating_sub(t) > cooloff_ms,
            None => true,
        }
    }
}
