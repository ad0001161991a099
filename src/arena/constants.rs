/// World and tick constants
pub mod world {
    /// Default world width in world units
    pub const WIDTH: f32 = 5000.0;
    /// Default world height in world units
    pub const HEIGHT: f32 = 5000.0;
    /// Arena tick rate in Hz
    pub const TICK_RATE: u32 = 60;
}

/// Cell movement and size constants
pub mod cell {
    /// Radius of a freshly spawned player cell
    pub const SPAWN_RADIUS: f32 = 20.0;
    /// mass = radius² / MASS_DIVISOR
    pub const MASS_DIVISOR: f32 = 100.0;
    /// Speed at radius 0 (px per tick)
    pub const BASE_SPEED: f32 = 2.5;
    /// Speed lost per unit of radius
    pub const SPEED_RADIUS_FACTOR: f32 = 100.0;
    /// Large cells never get slower than this
    pub const MIN_SPEED: f32 = 0.5;
    /// Targets closer than this are ignored (no jitter around the pointer)
    pub const STEER_DEADZONE: f32 = 5.0;
    /// Velocity multiplier per tick outside a boost window
    pub const FRICTION: f32 = 0.85;
    /// Velocity multiplier per tick while boosted
    pub const BOOST_FRICTION: f32 = 0.92;
    /// Absorb only when mass > other * EAT_RATIO
    pub const EAT_RATIO: f32 = 1.1;
    /// Hard cap of cells per player
    pub const MAX_CELLS: usize = 16;
}

/// Split action
pub mod split {
    pub const COOLDOWN_MS: u64 = 1000;
    /// Cells at or below this radius cannot split
    pub const MIN_RADIUS: f32 = 20.0;
    /// Launch speed of the new sibling
    pub const LAUNCH_SPEED: f32 = 40.0;
    pub const LAUNCH_BOOST_MS: u64 = 500;
    /// Backwards impulse on the origin cell
    pub const RECOIL_SPEED: f32 = 3.0;
    pub const RECOIL_BOOST_MS: u64 = 200;
}

/// Re-merge of a player's own cells
pub mod merge {
    /// Both cells must have been split at least this long ago
    pub const COOLOFF_MS: u64 = 30_000;
}

/// Eject action
pub mod eject {
    pub const COOLDOWN_MS: u64 = 100;
    /// Cells must be heavier than this to eject
    pub const MIN_CELL_MASS: f32 = 10.0;
    /// Mass removed from the cell per pellet
    pub const MASS_COST: f32 = 3.0;
    pub const PELLET_RADIUS: f32 = 12.0;
    pub const PELLET_MASS: f32 = 3.0;
    pub const PELLET_COLOR: &str = "#00FF41";
    pub const PELLET_SPEED: f32 = 25.0;
    /// Pellet spawns this far outside the cell edge
    pub const SPAWN_OFFSET: f32 = 15.0;
}

/// Food pellets
pub mod food {
    pub const RADIUS: f32 = 5.0;
    pub const MASS: f32 = 1.0;
    /// Velocity multiplier per tick for moving (ejected) food
    pub const FRICTION: f32 = 0.95;
    /// Velocity components below this snap to zero
    pub const STOP_THRESHOLD: f32 = 0.01;
    /// Pool size at startup and refill ceiling
    pub const TARGET_COUNT: usize = 3000;
    /// Refill kicks in below this count
    pub const LOW_WATER: usize = 500;
    /// Pellets added per refill tick
    pub const REFILL_BATCH: usize = 10;
    pub const PALETTE: [&str; 12] = [
        "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F",
        "#BB8FCE", "#85C1E2", "#F8B739", "#52B788", "#E56B6F", "#6C5CE7",
    ];
}

/// Shoot (special) action and projectiles
pub mod shoot {
    pub const COOLDOWN_MS: u64 = 5000;
    /// Primary cell must have at least this much mass
    pub const MIN_MASS: f32 = 50.0;
    /// Fraction of the primary cell's mass spent per shot
    pub const MASS_COST_RATIO: f32 = 0.2;
    pub const PROJECTILE_RADIUS: f32 = 8.0;
    pub const PROJECTILE_SPEED: f32 = 35.0;
    pub const PROJECTILE_COLOR: &str = "#ff0000";
    pub const PROJECTILE_LIFESPAN_MS: u64 = 3000;
    pub const SPAWN_OFFSET: f32 = 15.0;
}

/// Projectile impact
pub mod explosion {
    /// Fragments spawned from a struck cell (capped by free cell slots)
    pub const FRAGMENTS: usize = 8;
    /// Outward speed of each fragment
    pub const FRAGMENT_SPEED: f32 = 20.0;
    /// Steering is suppressed for this long after the blast
    pub const FRAGMENT_BOOST_MS: u64 = 300;
}

/// Leaderboard
pub mod leaderboard {
    pub const SIZE: usize = 10;
}
