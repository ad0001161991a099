/// Stage geometry (side view, y grows downward)
pub mod stage {
    /// Leftmost fighter x
    pub const MIN_X: f32 = 50.0;
    /// Rightmost fighter x
    pub const MAX_X: f32 = 950.0;
    /// Ground line
    pub const GROUND_Y: f32 = 400.0;
    /// Spawn x per position slot (0 = left, 1 = right)
    pub const SPAWN_X: [f32; 2] = [200.0, 800.0];
}

/// Fighter movement constants (per tick)
pub mod physics {
    pub const GRAVITY: f32 = 0.8;
    pub const WALK_SPEED: f32 = 5.0;
    /// Negative: up
    pub const JUMP_IMPULSE: f32 = -15.0;
    /// Horizontal velocity multiplier while stunned or dead
    pub const STUN_DECAY: f32 = 0.8;
}

/// Hit geometry
pub mod body {
    /// Box centers sit this far above the fighter's feet
    pub const CENTER_OFFSET_Y: f32 = 40.0;
    pub const HURTBOX_WIDTH: f32 = 40.0;
    pub const HURTBOX_HEIGHT: f32 = 80.0;
    pub const HITBOX_HEIGHT: f32 = 80.0;
}

/// Health, combo meter and animation
pub mod stats {
    pub const MAX_HEALTH: f32 = 100.0;
    pub const MAX_COMBO: f32 = 100.0;
    /// Combo meter regen per tick while not attacking
    pub const COMBO_REGEN: f32 = 0.1;
    /// Animation frame length
    pub const FRAME_MS: u64 = 100;
    /// Fraction of the attack animation after which the hitbox goes live
    pub const HITBOX_ACTIVE_AT: f32 = 0.3;
}

/// Damage reduction when blocking while facing the attacker
pub mod block {
    pub const DAMAGE_FACTOR: f32 = 0.3;
    pub const KNOCKBACK_FACTOR: f32 = 0.3;
    pub const STUN_FACTOR: f32 = 0.5;
}

/// Fixed numbers of one attack type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackProfile {
    pub damage: f32,
    /// Hitbox width
    pub range: f32,
    pub duration_ms: u64,
    pub cooldown_ms: u64,
    pub combo_gain: f32,
    pub knockback: f32,
    pub stun_ms: u64,
}

/// Attack table
pub mod attacks {
    use super::AttackProfile;

    /// Light, fast
    pub const PUNCH: AttackProfile = AttackProfile {
        damage: 8.0,
        range: 60.0,
        duration_ms: 300,
        cooldown_ms: 400,
        combo_gain: 10.0,
        knockback: 5.0,
        stun_ms: 100,
    };

    /// Heavy, slower
    pub const KICK: AttackProfile = AttackProfile {
        damage: 15.0,
        range: 70.0,
        duration_ms: 500,
        cooldown_ms: 800,
        combo_gain: 20.0,
        knockback: 10.0,
        stun_ms: 200,
    };

    /// Needs a full combo meter and consumes it
    pub const SPECIAL: AttackProfile = AttackProfile {
        damage: 30.0,
        range: 100.0,
        duration_ms: 800,
        cooldown_ms: 1000,
        combo_gain: 0.0,
        knockback: 20.0,
        stun_ms: 400,
    };
}

/// Room lifecycle timings
pub mod room {
    /// Fight loop rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Fixed fighter step
    pub const TICK_DT_MS: u64 = 16;
    /// First countdown value announced
    pub const COUNTDOWN_FROM: u32 = 3;
    pub const COUNTDOWN_STEP_MS: u64 = 1000;
    /// Pause between a round ending and the next countdown (or match end)
    pub const ROUND_TRANSITION_MS: u64 = 3000;
    /// Best of three
    pub const ROUNDS_TO_WIN: u32 = 2;
    /// Grace window for navigation-induced reconnects
    pub const RECONNECT_GRACE_MS: u64 = 10_000;
}
