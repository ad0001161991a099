use rand::Rng;
use smallvec::SmallVec;
use uuid::Uuid;

use crate::arena::cell::Cell;
use crate::arena::constants::{cell, eject, merge, shoot, split};
use crate::arena::food::Food;
use crate::arena::projectile::Projectile;
use crate::arena::world::World;
use crate::arena::{ArenaActionError, EntityIds};
use crate::util::vec2::Vec2;

/// Arena player identity (the owning connection id)
pub type PlayerId = Uuid;

/// An arena participant: an ordered set of cells steered towards one pointer target
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub color: String,
    pub cells: Vec<Cell>,
    pub target: Vec2,
    /// Sum of cell masses, refreshed every tick
    pub score: f32,
    last_split: Option<u64>,
    last_eject: Option<u64>,
    last_shoot: Option<u64>,
}

#[inline]
fn cooldown_ready(last: Option<u64>, now_ms: u64, cooldown_ms: u64) -> bool {
    last.map_or(true, |t| now_ms.saturating_sub(t) >= cooldown_ms)
}

impl Player {
    /// Create a player with one starting cell at `spawn`
    pub fn new(
        id: PlayerId,
        name: String,
        avatar: Option<String>,
        spawn: Vec2,
        ids: &mut EntityIds,
    ) -> Self {
        let hue = rand::thread_rng().gen_range(0..360);
        let color = format!("hsl({}, 70%, 60%)", hue);
        let first = Cell::new(ids.allocate(), spawn, cell::SPAWN_RADIUS, color.clone());
        let score = first.mass();

        Self {
            id,
            name,
            avatar,
            color,
            cells: vec![first],
            target: spawn,
            score,
            last_split: None,
            last_eject: None,
            last_shoot: None,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.cells.is_empty()
    }

    /// Average position of all cells
    pub fn center(&self) -> Option<Vec2> {
        if self.cells.is_empty() {
            return None;
        }
        let sum = self
            .cells
            .iter()
            .fold(Vec2::ZERO, |acc, c| acc + c.position);
        Some(sum * (1.0 / self.cells.len() as f32))
    }

    pub fn total_mass(&self) -> f32 {
        self.cells.iter().map(Cell::mass).sum()
    }

    pub fn update_score(&mut self) {
        self.score = self.total_mass();
    }

    /// Set the pointer target. Non-finite coordinates are rejected.
    pub fn set_target(&mut self, target: Vec2) -> bool {
        if !target.is_finite() {
            return false;
        }
        self.target = target;
        true
    }

    /// Steer, integrate and clamp every cell
    pub fn update_cells(&mut self, now_ms: u64, world: &World) {
        let target = self.target;
        for c in &mut self.cells {
            c.update(target, now_ms, world);
        }
    }

    /// Merge overlapping cells whose cool-off has elapsed.
    ///
    /// The heavier cell of a pair is moved to the lower index and absorbs the
    /// other; the inner index is not advanced after a removal, so no cell is
    /// skipped or visited twice. Returns the number of merges.
    pub fn merge_cells(&mut self, now_ms: u64) -> usize {
        let mut merged = 0;
        let mut i = 0;
        while i < self.cells.len() {
            let mut j = i + 1;
            while j < self.cells.len() {
                let (a, b) = (&self.cells[i], &self.cells[j]);
                let eligible = a.merge_ready(now_ms, merge::COOLOFF_MS)
                    && b.merge_ready(now_ms, merge::COOLOFF_MS)
                    && a.overlaps(b);

                if eligible {
                    if self.cells[j].mass() > self.cells[i].mass() {
                        self.cells.swap(i, j);
                    }
                    let absorbed = self.cells.remove(j);
                    self.cells[i].add_mass(absorbed.mass());
                    merged += 1;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        merged
    }

    /// Split every eligible cell towards the target.
    ///
    /// Returns the number of new cells created.
    pub fn split(&mut self, now_ms: u64, ids: &mut EntityIds) -> Result<usize, ArenaActionError> {
        if !cooldown_ready(self.last_split, now_ms, split::COOLDOWN_MS) {
            return Err(ArenaActionError::CoolingDown);
        }
        if self.cells.len() >= cell::MAX_CELLS {
            return Err(ArenaActionError::CellCapReached);
        }

        let target = self.target;
        let existing = self.cells.len();
        let mut spawned: SmallVec<[Cell; cell::MAX_CELLS]> = SmallVec::new();

        for origin in &mut self.cells {
            if existing + spawned.len() >= cell::MAX_CELLS {
                break;
            }
            if origin.radius() <= split::MIN_RADIUS {
                continue;
            }

            let dir = origin.position.direction_to(target);
            let half = origin.mass() / 2.0;
            origin.set_mass(half);

            let mut sibling = Cell::with_mass(ids.allocate(), origin.position, half, origin.color.clone());
            sibling.launch(dir * split::LAUNCH_SPEED, now_ms, split::LAUNCH_BOOST_MS);
            origin.launch(-dir * split::RECOIL_SPEED, now_ms, split::RECOIL_BOOST_MS);

            spawned.push(sibling);
        }

        if spawned.is_empty() {
            return Err(ArenaActionError::NotEnoughMass);
        }

        let count = spawned.len();
        self.cells.extend(spawned);
        self.last_split = Some(now_ms);
        Ok(count)
    }

    /// Eject a pellet from every cell heavier than the eject threshold
    pub fn eject(&mut self, now_ms: u64, ids: &mut EntityIds) -> Result<Vec<Food>, ArenaActionError> {
        if !cooldown_ready(self.last_eject, now_ms, eject::COOLDOWN_MS) {
            return Err(ArenaActionError::CoolingDown);
        }

        let target = self.target;
        let mut pellets = Vec::new();
        for c in &mut self.cells {
            if c.mass() <= eject::MIN_CELL_MASS {
                continue;
            }
            let dir = c.position.direction_to(target);
            let spawn = c.position + dir * (c.radius() + eject::SPAWN_OFFSET);
            pellets.push(Food::ejected(ids.allocate(), spawn, dir * eject::PELLET_SPEED));
            c.add_mass(-eject::MASS_COST);
        }

        if pellets.is_empty() {
            return Err(ArenaActionError::NotEnoughMass);
        }
        self.last_eject = Some(now_ms);
        Ok(pellets)
    }

    /// Fire a projectile from the primary cell, paying a share of its mass
    pub fn shoot(&mut self, now_ms: u64, ids: &mut EntityIds) -> Result<Projectile, ArenaActionError> {
        if !cooldown_ready(self.last_shoot, now_ms, shoot::COOLDOWN_MS) {
            return Err(ArenaActionError::CoolingDown);
        }
        let target = self.target;
        let primary = self.cells.first_mut().ok_or(ArenaActionError::NotEnoughMass)?;
        if primary.mass() < shoot::MIN_MASS {
            return Err(ArenaActionError::NotEnoughMass);
        }

        let dir = primary.position.direction_to(target);
        primary.set_mass(primary.mass() * (1.0 - shoot::MASS_COST_RATIO));
        let spawn = primary.position + dir * (primary.radius() + shoot::SPAWN_OFFSET);

        self.last_shoot = Some(now_ms);
        Ok(Projectile::new(ids.allocate(), self.id, spawn, dir, now_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_with_cell(mass: f32) -> (Player, EntityIds) {
        let mut ids = EntityIds::default();
        let mut p = Player::new(Uuid::new_v4(), "Tester".into(), None, Vec2::new(500.0, 500.0), &mut ids);
        p.cells[0].set_mass(mass);
        p.target = Vec2::new(800.0, 500.0);
        (p, ids)
    }

    #[test]
    fn test_new_player_has_one_spawn_cell() {
        let mut ids = EntityIds::default();
        let p = Player::new(Uuid::new_v4(), "A".into(), None, Vec2::new(1.0, 2.0), &mut ids);
        assert_eq!(p.cells.len(), 1);
        assert_eq!(p.cells[0].radius(), cell::SPAWN_RADIUS);
        assert!(p.color.starts_with("hsl("));
        assert!(p.is_alive());
    }

    #[test]
    fn test_split_halves_mass() {
        let (mut p, mut ids) = player_with_cell(100.0);
        let parent_radius = p.cells[0].radius();

        assert_eq!(p.split(10_000, &mut ids), Ok(1));
        assert_eq!(p.cells.len(), 2);

        let expected = parent_radius / std::f32::consts::SQRT_2;
        for c in &p.cells {
            assert!((c.radius() - expected).abs() < 1e-3);
            assert_eq!(c.split_time, Some(10_000));
        }
        assert!((p.total_mass() - 100.0).abs() < 1e-3);

        // Sibling launched towards target, origin recoils away
        assert!(p.cells[1].velocity.x > 0.0);
        assert!(p.cells[0].velocity.x < 0.0);
        assert_eq!(p.cells[1].split_boost_until, 10_500);
        assert_eq!(p.cells[0].split_boost_until, 10_200);
    }

    #[test]
    fn test_split_cooldown() {
        let (mut p, mut ids) = player_with_cell(400.0);
        p.split(10_000, &mut ids).unwrap();
        assert_eq!(p.split(10_500, &mut ids), Err(ArenaActionError::CoolingDown));
        assert!(p.split(11_000, &mut ids).is_ok());
        assert_eq!(p.cells.len(), 4);
    }

    #[test]
    fn test_split_too_small() {
        let (mut p, mut ids) = player_with_cell(4.0);
        assert_eq!(p.split(10_000, &mut ids), Err(ArenaActionError::NotEnoughMass));
        assert_eq!(p.cells.len(), 1);
    }

    #[test]
    fn test_split_never_exceeds_cap() {
        let (mut p, mut ids) = player_with_cell(100_000.0);
        let mut now = 10_000;
        for _ in 0..10 {
            let _ = p.split(now, &mut ids);
            assert!(p.cells.len() <= cell::MAX_CELLS);
            now += 1_000;
        }
        assert_eq!(p.cells.len(), cell::MAX_CELLS);
        assert_eq!(p.split(now, &mut ids), Err(ArenaActionError::CellCapReached));
    }

    #[test]
    fn test_split_partial_at_cap() {
        let (mut p, mut ids) = player_with_cell(100_000.0);
        let color = p.color.clone();
        for i in 0..14 {
            p.cells.push(Cell::with_mass(ids.allocate(), Vec2::new(100.0 + i as f32, 100.0), 1000.0, color.clone()));
        }
        assert_eq!(p.cells.len(), 15);
        assert_eq!(p.split(10_000, &mut ids), Ok(1));
        assert_eq!(p.cells.len(), cell::MAX_CELLS);
    }

    #[test]
    fn test_merge_respects_cooloff() {
        let (mut p, mut ids) = player_with_cell(100.0);
        p.split(10_000, &mut ids).unwrap();
        // Force overlap
        p.cells[1].position = p.cells[0].position;

        assert_eq!(p.merge_cells(20_000), 0);
        assert_eq!(p.merge_cells(40_000), 0); // exactly 30s is not enough
        assert_eq!(p.merge_cells(40_001), 1);
        assert_eq!(p.cells.len(), 1);
        assert!((p.cells[0].mass() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_merge_cascade() {
        let (mut p, mut ids) = player_with_cell(10.0);
        let color = p.color.clone();
        let pos = p.cells[0].position;
        p.cells.push(Cell::with_mass(ids.allocate(), pos, 30.0, color.clone()));
        p.cells.push(Cell::with_mass(ids.allocate(), pos, 20.0, color.clone()));
        p.cells.push(Cell::with_mass(ids.allocate(), Vec2::new(4000.0, 4000.0), 5.0, color));

        assert_eq!(p.merge_cells(100_000), 2);
        assert_eq!(p.cells.len(), 2);
        assert!((p.total_mass() - 65.0).abs() < 1e-3);
        // Heaviest survivor keeps the merged mass
        assert!((p.cells[0].mass() - 60.0).abs() < 1e-3);
        for c in &p.cells {
            assert!((c.radius() - (c.mass() * 100.0).sqrt()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_eject() {
        let (mut p, mut ids) = player_with_cell(20.0);
        let radius_before = p.cells[0].radius();
        let pellets = p.eject(1_000, &mut ids).unwrap();
        assert_eq!(pellets.len(), 1);
        assert!((p.cells[0].mass() - 17.0).abs() < 1e-4);

        let pellet = &pellets[0];
        assert!(pellet.ejected);
        assert!((pellet.position.x - (500.0 + radius_before + 15.0)).abs() < 1e-3);
        assert!((pellet.velocity.x - 25.0).abs() < 1e-4);

        assert_eq!(p.eject(1_050, &mut ids).unwrap_err(), ArenaActionError::CoolingDown);
        assert!(p.eject(1_100, &mut ids).is_ok());
    }

    #[test]
    fn test_eject_requires_mass() {
        let (mut p, mut ids) = player_with_cell(10.0);
        assert_eq!(p.eject(1_000, &mut ids).unwrap_err(), ArenaActionError::NotEnoughMass);
    }

    #[test]
    fn test_shoot() {
        let (mut p, mut ids) = player_with_cell(100.0);
        let projectile = p.shoot(10_000, &mut ids).unwrap();
        assert!((p.cells[0].mass() - 80.0).abs() < 1e-3);
        assert_eq!(projectile.owner, p.id);
        assert!(projectile.position.x > 500.0 + p.cells[0].radius());
        assert!((projectile.velocity.x - shoot::PROJECTILE_SPEED).abs() < 1e-4);

        assert_eq!(p.shoot(14_999, &mut ids).unwrap_err(), ArenaActionError::CoolingDown);
        assert!(p.shoot(15_000, &mut ids).is_ok());
    }

    #[test]
    fn test_shoot_requires_mass() {
        let (mut p, mut ids) = player_with_cell(49.0);
        assert_eq!(p.shoot(10_000, &mut ids).unwrap_err(), ArenaActionError::NotEnoughMass);
        assert!((p.cells[0].mass() - 49.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_target_rejects_non_finite() {
        let (mut p, _) = player_with_cell(10.0);
        assert!(!p.set_target(Vec2::new(f32::NAN, 1.0)));
        assert!(p.set_target(Vec2::new(1.0, 2.0)));
        assert_eq!(p.target, Vec2::new(1.0, 2.0));
    }
}
