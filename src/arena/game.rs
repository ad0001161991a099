//! Authoritative arena simulation
//!
//! One [`Game`] owns every player, pellet and projectile. [`Game::tick`] runs
//! the fixed-step update; player actions arrive between ticks and are applied
//! immediately.

use std::f32::consts::TAU;

use tracing::debug;

use crate::arena::cell::Cell;
use crate::arena::constants::{cell, eject, explosion, food, leaderboard, world as world_consts};
use crate::arena::food::Food;
use crate::arena::player::{Player, PlayerId};
use crate::arena::projectile::Projectile;
use crate::arena::spatial::SpatialGrid;
use crate::arena::world::World;
use crate::arena::{ArenaActionError, EntityIds};
use crate::util::vec2::Vec2;

/// Food pool tuning
#[derive(Debug, Clone, Copy)]
pub struct ArenaSettings {
    /// Pool size at startup and refill ceiling
    pub food_target: usize,
    /// Refill only while the pool is below this
    pub food_low_water: usize,
    /// Pellets added per refill tick
    pub food_refill_batch: usize,
}

impl ArenaSettings {
    /// No food at all (tests and benchmarks)
    pub fn empty() -> Self {
        Self {
            food_target: 0,
            food_low_water: 0,
            food_refill_batch: 0,
        }
    }
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            food_target: food::TARGET_COUNT,
            food_low_water: food::LOW_WATER,
            food_refill_batch: food::REFILL_BATCH,
        }
    }
}

/// Notable things that happened during a tick or action
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    /// Victim lost its last cell
    PlayerDied {
        victim_id: PlayerId,
        killer_id: Option<PlayerId>,
        killer_name: String,
        killer_score: f32,
    },
    /// A projectile blew up one of the victim's cells
    PlayerExploded {
        victim_id: PlayerId,
        victim_name: String,
        shooter_id: PlayerId,
        shooter_name: String,
        position: Vec2,
    },
    ProjectileFired {
        player_id: PlayerId,
        player_name: String,
    },
}

/// The arena world
pub struct Game {
    world: World,
    settings: ArenaSettings,
    players: Vec<Player>,
    food: Vec<Food>,
    projectiles: Vec<Projectile>,
    ids: EntityIds,
    food_grid: SpatialGrid,
    tick: u64,
}

impl Game {
    pub fn new(world: World, settings: ArenaSettings) -> Self {
        let mut game = Self {
            world,
            settings,
            players: Vec::new(),
            food: Vec::with_capacity(settings.food_target),
            projectiles: Vec::new(),
            ids: EntityIds::default(),
            food_grid: SpatialGrid::default(),
            tick: 0,
        };
        game.spawn_food(settings.food_target);
        game
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn world(&self) -> &World {
        &self.world
    }

    #[inline]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[inline]
    pub fn food(&self) -> &[Food] {
        &self.food
    }

    #[inline]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn cell_count(&self) -> usize {
        self.players.iter().map(|p| p.cells.len()).sum()
    }

    // ========================================================================
    // Membership and actions
    // ========================================================================

    /// Spawn a player with one cell somewhere in the central half of the world.
    /// Re-joining with a live id replaces the old player.
    pub fn add_player(&mut self, id: PlayerId, name: String, avatar: Option<String>) -> &Player {
        self.remove_player(id);
        let spawn = self.world.random_spawn_point();
        let player = Player::new(id, name, avatar, spawn, &mut self.ids);
        self.players.push(player);
        let last = self.players.len() - 1;
        &self.players[last]
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(index))
    }

    /// Update a player's pointer target
    pub fn move_player(&mut self, id: PlayerId, target: Vec2) -> Result<(), ArenaActionError> {
        let player = self.player_mut(id).ok_or(ArenaActionError::PlayerNotFound)?;
        if player.set_target(target) {
            Ok(())
        } else {
            Err(ArenaActionError::InvalidTarget)
        }
    }

    /// Returns the number of new cells
    pub fn split(&mut self, id: PlayerId, now_ms: u64) -> Result<usize, ArenaActionError> {
        let index = self.player_index(id)?;
        self.players[index].split(now_ms, &mut self.ids)
    }

    /// Returns the number of pellets ejected
    pub fn eject(&mut self, id: PlayerId, now_ms: u64) -> Result<usize, ArenaActionError> {
        let index = self.player_index(id)?;
        let pellets = self.players[index].eject(now_ms, &mut self.ids)?;
        let count = pellets.len();
        self.food.extend(pellets);
        Ok(count)
    }

    pub fn shoot(&mut self, id: PlayerId, now_ms: u64) -> Result<ArenaEvent, ArenaActionError> {
        let index = self.player_index(id)?;
        let projectile = self.players[index].shoot(now_ms, &mut self.ids)?;
        self.projectiles.push(projectile);

        let player = &self.players[index];
        Ok(ArenaEvent::ProjectileFired {
            player_id: player.id,
            player_name: player.name.clone(),
        })
    }

    fn player_index(&self, id: PlayerId) -> Result<usize, ArenaActionError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(ArenaActionError::PlayerNotFound)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by one fixed step
    pub fn tick(&mut self, now_ms: u64) -> Vec<ArenaEvent> {
        self.tick += 1;
        let mut events = Vec::new();

        // Movement, re-merge and score
        for player in &mut self.players {
            player.update_cells(now_ms, &self.world);
            player.merge_cells(now_ms);
            player.update_score();
        }

        for pellet in &mut self.food {
            pellet.update(&self.world);
        }

        for projectile in &mut self.projectiles {
            projectile.update();
        }
        let world = self.world;
        self.projectiles.retain(|p| !p.is_dead(now_ms, &world));

        self.resolve_projectile_hits(now_ms, &mut events);
        self.resolve_player_collisions(&mut events);
        self.resolve_food_collisions();
        self.replenish_food();

        events
    }

    /// Projectile against any cell not owned by the shooter
    fn resolve_projectile_hits(&mut self, now_ms: u64, events: &mut Vec<ArenaEvent>) {
        let mut i = 0;
        while i < self.projectiles.len() {
            let projectile = &self.projectiles[i];
            let hit = self.players.iter().enumerate().find_map(|(pi, player)| {
                if player.id == projectile.owner {
                    return None;
                }
                player
                    .cells
                    .iter()
                    .position(|c| c.overlaps_circle(projectile.position, projectile.radius))
                    .map(|ci| (pi, ci))
            });

            match hit {
                Some((pi, ci)) => {
                    let projectile = self.projectiles.remove(i);
                    events.push(self.explode_cell(pi, ci, projectile.owner, now_ms));
                }
                None => i += 1,
            }
        }
    }

    /// Replace a struck cell with a ring of fragments sharing its mass
    fn explode_cell(&mut self, player_index: usize, cell_index: usize, shooter: PlayerId, now_ms: u64) -> ArenaEvent {
        let shooter_name = self
            .player(shooter)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let world = self.world;
        let player = &mut self.players[player_index];
        let struck = player.cells.remove(cell_index);
        let impact = struck.position;

        let slots = cell::MAX_CELLS - player.cells.len();
        let count = explosion::FRAGMENTS.min(slots).max(1);
        let fragment_mass = struck.mass() / count as f32;

        for k in 0..count {
            let dir = Vec2::from_angle(TAU * k as f32 / count as f32);
            let mut fragment = Cell::with_mass(self.ids.allocate(), impact, fragment_mass, struck.color.clone());
            fragment.position = world.clamp_circle(impact + dir * fragment.radius(), fragment.radius());
            fragment.launch(dir * explosion::FRAGMENT_SPEED, now_ms, explosion::FRAGMENT_BOOST_MS);
            player.cells.push(fragment);
        }

        debug!("Player {} exploded by {} into {} fragments", player.id, shooter, count);

        ArenaEvent::PlayerExploded {
            victim_id: player.id,
            victim_name: player.name.clone(),
            shooter_id: shooter,
            shooter_name,
            position: impact,
        }
    }

    /// Cross-player absorption; players left without cells are removed
    fn resolve_player_collisions(&mut self, events: &mut Vec<ArenaEvent>) {
        let count = self.players.len();
        let mut killed_by: Vec<Option<usize>> = vec![None; count];

        for a in 0..count {
            for b in (a + 1)..count {
                let (left, right) = self.players.split_at_mut(b);
                let (pa, pb) = (&mut left[a], &mut right[0]);
                let (a_lost_all, b_lost_all) = absorb_overlapping(pa, pb);
                if b_lost_all && killed_by[b].is_none() {
                    killed_by[b] = Some(a);
                }
                if a_lost_all && killed_by[a].is_none() {
                    killed_by[a] = Some(b);
                }
            }
        }

        for index in (0..count).rev() {
            if self.players[index].is_alive() {
                continue;
            }
            let (killer_id, killer_name, killer_score) = match killed_by[index] {
                Some(k) => {
                    let killer = &self.players[k];
                    (Some(killer.id), killer.name.clone(), killer.total_mass())
                }
                None => (None, String::new(), 0.0),
            };
            let victim = self.players.remove(index);
            debug!("Player {} ({}) was eaten", victim.name, victim.id);
            events.push(ArenaEvent::PlayerDied {
                victim_id: victim.id,
                killer_id,
                killer_name,
                killer_score,
            });
        }
    }

    /// Any overlap between a cell and a pellet consumes the pellet
    fn resolve_food_collisions(&mut self) {
        if self.food.is_empty() {
            return;
        }

        self.food_grid.clear();
        for (index, pellet) in self.food.iter().enumerate() {
            self.food_grid.insert(index, pellet.position);
        }

        let mut eaten = vec![false; self.food.len()];
        let mut any_eaten = false;
        for player in &mut self.players {
            for c in &mut player.cells {
                let reach = c.radius() + eject::PELLET_RADIUS;
                for index in self.food_grid.query(c.position, reach) {
                    if eaten[index] {
                        continue;
                    }
                    let pellet = &self.food[index];
                    if c.overlaps_circle(pellet.position, pellet.radius) {
                        eaten[index] = true;
                        any_eaten = true;
                        c.add_mass(pellet.mass);
                    }
                }
            }
        }

        if any_eaten {
            let mut index = 0;
            self.food.retain(|_| {
                let keep = !eaten[index];
                index += 1;
                keep
            });
        }
    }

    fn replenish_food(&mut self) {
        if self.food.len() < self.settings.food_low_water {
            let missing = self.settings.food_target.saturating_sub(self.food.len());
            self.spawn_food(missing.min(self.settings.food_refill_batch));
        }
    }

    fn spawn_food(&mut self, count: usize) {
        for _ in 0..count {
            let position = self.world.random_point();
            self.food.push(Food::new(self.ids.allocate(), position));
        }
    }

    // ========================================================================
    // Ranking
    // ========================================================================

    /// Top players by score, highest first
    pub fn leaders(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(leaderboard::SIZE);
        ranked
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(
            World::new(world_consts::WIDTH, world_consts::HEIGHT),
            ArenaSettings::default(),
        )
    }
}

/// Resolve every overlapping cross-player cell pair between two players.
///
/// Indices only advance past cells that survived the comparison, so removals
/// never skip or revisit a cell. Returns `(a_lost_all, b_lost_all)`.
fn absorb_overlapping(a: &mut Player, b: &mut Player) -> (bool, bool) {
    let (a_had, b_had) = (a.is_alive(), b.is_alive());

    let mut i = 0;
    while i < a.cells.len() {
        let mut a_cell_eaten = false;
        let mut j = 0;
        while j < b.cells.len() {
            let (ca, cb) = (&a.cells[i], &b.cells[j]);
            if ca.overlaps(cb) {
                if ca.can_eat(cb) {
                    let eaten = b.cells.remove(j);
                    a.cells[i].add_mass(eaten.mass());
                    continue;
                }
                if cb.can_eat(ca) {
                    let eaten = a.cells.remove(i);
                    b.cells[j].add_mass(eaten.mass());
                    a_cell_eaten = true;
                    break;
                }
            }
            j += 1;
        }
        if !a_cell_eaten {
            i += 1;
        }
    }

    (a_had && !a.is_alive(), b_had && !b.is_alive())
}
