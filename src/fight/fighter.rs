//! Fighter combat state machine

use serde::{Deserialize, Serialize};

use crate::fight::constants::{attacks, block, body, physics, stage, stats, AttackProfile};
use crate::net::protocol::ConnectionId;
use crate::util::vec2::Vec2;

/// Animation/state tag sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FighterAction {
    Idle,
    Walk,
    Jump,
    Punch,
    Kick,
    Block,
    Hurt,
    Special,
    /// Terminal until the next round reset
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    Punch,
    Kick,
    Special,
}

impl AttackKind {
    pub fn profile(self) -> &'static AttackProfile {
        match self {
            AttackKind::Punch => &attacks::PUNCH,
            AttackKind::Kick => &attacks::KICK,
            AttackKind::Special => &attacks::SPECIAL,
        }
    }

    fn action(self) -> FighterAction {
        match self {
            AttackKind::Punch => FighterAction::Punch,
            AttackKind::Kick => FighterAction::Kick,
            AttackKind::Special => FighterAction::Special,
        }
    }
}

/// Held-button snapshot from the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub punch: bool,
    pub kick: bool,
    /// Carried for client compatibility; guarding is driven by `down`
    pub block: bool,
    pub special: bool,
}

/// Axis-aligned box stored by center and half extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half_width: f32,
    pub half_height: f32,
}

impl Aabb {
    pub fn new(center: Vec2, width: f32, height: f32) -> Self {
        Self {
            center,
            half_width: width / 2.0,
            half_height: height / 2.0,
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        (self.center.x - other.center.x).abs() < self.half_width + other.half_width
            && (self.center.y - other.center.y).abs() < self.half_height + other.half_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HitboxPhase {
    /// Wind-up, before 30% of the animation
    Pending,
    Active,
    /// Landed a hit or the window closed
    Spent,
}

#[derive(Debug, Clone, Copy)]
struct ActiveAttack {
    kind: AttackKind,
    elapsed_ms: u64,
    hitbox: HitboxPhase,
}

/// Result of a landed hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub blocked: bool,
    /// Damage after block reduction
    pub applied_damage: f32,
    pub killed: bool,
}

/// One side of a fight room
#[derive(Debug, Clone)]
pub struct Fighter {
    /// Current connection bound to this fighter; changes on rejoin
    pub id: ConnectionId,
    pub name: String,
    pub avatar: Option<String>,
    slot: usize,

    health: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing_right: bool,

    pub grounded: bool,
    pub blocking: bool,
    pub stunned: bool,
    dead: bool,

    combo: f32,
    pub action: FighterAction,
    pub action_frame: u32,
    action_timer_ms: u64,

    attack: Option<ActiveAttack>,
    attack_cooldown_ms: u64,
    stun_remaining_ms: u64,

    pub input: FightInput,
}

impl Fighter {
    /// Fighter standing at its slot's spawn point, facing the opponent
    pub fn new(id: ConnectionId, name: String, avatar: Option<String>, slot: usize) -> Self {
        let slot = slot.min(1);
        Self {
            id,
            name,
            avatar,
            slot,
            health: stats::MAX_HEALTH,
            position: Vec2::new(stage::SPAWN_X[slot], stage::GROUND_Y),
            velocity: Vec2::ZERO,
            facing_right: slot == 0,
            grounded: true,
            blocking: false,
            stunned: false,
            dead: false,
            combo: 0.0,
            action: FighterAction::Idle,
            action_frame: 0,
            action_timer_ms: 0,
            attack: None,
            attack_cooldown_ms: 0,
            stun_remaining_ms: 0,
            input: FightInput::default(),
        }
    }

    /// Position slot: 0 = left, 1 = right
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn health(&self) -> f32 {
        self.health
    }

    #[inline]
    pub fn max_health(&self) -> f32 {
        stats::MAX_HEALTH
    }

    #[inline]
    pub fn combo(&self) -> f32 {
        self.combo
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    #[inline]
    pub fn is_attacking(&self) -> bool {
        self.attack.is_some()
    }

    pub fn current_attack(&self) -> Option<AttackKind> {
        self.attack.map(|a| a.kind)
    }

    /// Replace the held-button snapshot
    pub fn set_input(&mut self, input: FightInput) {
        self.input = input;
    }

    // ========================================================================
    // Per-tick update
    // ========================================================================

    pub fn update(&mut self, dt_ms: u64) {
        self.attack_cooldown_ms = self.attack_cooldown_ms.saturating_sub(dt_ms);
        if self.stun_remaining_ms > 0 {
            self.stun_remaining_ms = self.stun_remaining_ms.saturating_sub(dt_ms);
            if self.stun_remaining_ms == 0 {
                self.stunned = false;
            }
        }
        self.advance_attack(dt_ms);

        if self.stunned || self.dead {
            self.velocity.x *= physics::STUN_DECAY;
            self.apply_physics();
            return;
        }

        // Attacks are gated first; an attacking fighter neither moves nor blocks
        self.resolve_attack();
        if self.attack.is_some() {
            self.blocking = false;
        } else {
            self.resolve_movement();
        }

        self.apply_physics();
        self.advance_animation(dt_ms);

        if self.attack.is_none() && self.combo < stats::MAX_COMBO {
            self.combo = (self.combo + stats::COMBO_REGEN).min(stats::MAX_COMBO);
        }
    }

    fn advance_attack(&mut self, dt_ms: u64) {
        let Some(attack) = self.attack.as_mut() else {
            return;
        };
        let profile = attack.kind.profile();
        attack.elapsed_ms += dt_ms;

        let activate_at = (profile.duration_ms as f32 * stats::HITBOX_ACTIVE_AT) as u64;
        if attack.hitbox == HitboxPhase::Pending && attack.elapsed_ms >= activate_at {
            attack.hitbox = HitboxPhase::Active;
        }

        if attack.elapsed_ms >= profile.duration_ms {
            self.attack = None;
            self.attack_cooldown_ms = profile.cooldown_ms;
            if !self.stunned && !self.dead {
                self.action = FighterAction::Idle;
            }
        }
    }

    /// Punch > kick > special, only when idle-handed and off cooldown
    fn resolve_attack(&mut self) {
        if self.attack.is_some() || self.attack_cooldown_ms > 0 {
            return;
        }

        let kind = if self.input.punch {
            AttackKind::Punch
        } else if self.input.kick {
            AttackKind::Kick
        } else if self.input.special && self.combo >= stats::MAX_COMBO {
            self.combo = 0.0;
            AttackKind::Special
        } else {
            return;
        };

        self.attack = Some(ActiveAttack {
            kind,
            elapsed_ms: 0,
            hitbox: HitboxPhase::Pending,
        });
        self.action = kind.action();
        self.action_frame = 0;
        self.action_timer_ms = 0;
        self.velocity.x = 0.0;
    }

    fn resolve_movement(&mut self) {
        let input = self.input;

        if input.left {
            self.velocity.x = -physics::WALK_SPEED;
            self.facing_right = false;
            self.action = FighterAction::Walk;
        } else if input.right {
            self.velocity.x = physics::WALK_SPEED;
            self.facing_right = true;
            self.action = FighterAction::Walk;
        } else {
            self.velocity.x = 0.0;
            self.action = FighterAction::Idle;
        }

        if input.up && self.grounded {
            self.velocity.y = physics::JUMP_IMPULSE;
            self.grounded = false;
            self.action = FighterAction::Jump;
        } else if !self.grounded {
            self.action = FighterAction::Jump;
        }

        if input.down && self.grounded {
            self.blocking = true;
            self.action = FighterAction::Block;
            self.velocity.x = 0.0;
        } else {
            self.blocking = false;
        }
    }

    fn apply_physics(&mut self) {
        if !self.grounded {
            self.velocity.y += physics::GRAVITY;
        }
        self.position += self.velocity;

        if self.position.y >= stage::GROUND_Y {
            self.position.y = stage::GROUND_Y;
            self.velocity.y = 0.0;
            self.grounded = true;
            if self.action == FighterAction::Jump {
                self.action = FighterAction::Idle;
            }
        } else {
            self.grounded = false;
        }

        self.position.x = self.position.x.clamp(stage::MIN_X, stage::MAX_X);
    }

    fn advance_animation(&mut self, dt_ms: u64) {
        self.action_timer_ms += dt_ms;
        if self.action_timer_ms >= stats::FRAME_MS {
            self.action_timer_ms = 0;
            self.action_frame += 1;
        }
    }

    // ========================================================================
    // Combat
    // ========================================================================

    /// Live hitbox, if the current attack is inside its active window
    pub fn hitbox(&self) -> Option<(Aabb, &'static AttackProfile)> {
        let attack = self.attack.as_ref()?;
        if attack.hitbox != HitboxPhase::Active {
            return None;
        }
        let profile = attack.kind.profile();
        let dir = if self.facing_right { 1.0 } else { -1.0 };
        let center = Vec2::new(
            self.position.x + dir * profile.range / 2.0,
            self.position.y - body::CENTER_OFFSET_Y,
        );
        Some((Aabb::new(center, profile.range, body::HITBOX_HEIGHT), profile))
    }

    pub fn hurtbox(&self) -> Aabb {
        let center = Vec2::new(self.position.x, self.position.y - body::CENTER_OFFSET_Y);
        Aabb::new(center, body::HURTBOX_WIDTH, body::HURTBOX_HEIGHT)
    }

    /// Close the hitbox so one swing lands at most once
    pub fn spend_hitbox(&mut self) {
        if let Some(attack) = self.attack.as_mut() {
            attack.hitbox = HitboxPhase::Spent;
        }
    }

    pub fn gain_combo(&mut self, amount: f32) {
        self.combo = (self.combo + amount).min(stats::MAX_COMBO);
    }

    /// Whether `x` lies on the side this fighter faces (horizontal only)
    #[inline]
    pub fn is_facing(&self, x: f32) -> bool {
        (self.facing_right && x > self.position.x) || (!self.facing_right && x < self.position.x)
    }

    /// Apply one landed attack.
    ///
    /// Blocking while facing the attacker scales damage and knockback by 0.3
    /// and stun by 0.5. Knockback follows the attacker's facing. Dead fighters
    /// take no further hits.
    pub fn take_damage(
        &mut self,
        profile: &AttackProfile,
        attacker_x: f32,
        attacker_facing_right: bool,
    ) -> Option<HitOutcome> {
        if self.dead {
            return None;
        }

        let blocked = self.blocking && self.is_facing(attacker_x);
        let (damage, knockback, stun_ms) = if blocked {
            (
                profile.damage * block::DAMAGE_FACTOR,
                profile.knockback * block::KNOCKBACK_FACTOR,
                (profile.stun_ms as f32 * block::STUN_FACTOR) as u64,
            )
        } else {
            (profile.damage, profile.knockback, profile.stun_ms)
        };

        self.health = (self.health - damage).max(0.0);

        let dir = if attacker_facing_right { 1.0 } else { -1.0 };
        self.velocity.x = dir * knockback;

        self.stunned = true;
        self.stun_remaining_ms = stun_ms;
        self.action = FighterAction::Hurt;

        if self.health <= 0.0 {
            self.dead = true;
            self.action = FighterAction::Dead;
        }

        Some(HitOutcome {
            blocked,
            applied_damage: damage,
            killed: self.dead,
        })
    }

    /// Restore round-start state; combo meter is zeroed
    pub fn reset(&mut self) {
        self.health = stats::MAX_HEALTH;
        self.position = Vec2::new(stage::SPAWN_X[self.slot], stage::GROUND_Y);
        self.velocity = Vec2::ZERO;
        self.facing_right = self.slot == 0;
        self.grounded = true;
        self.blocking = false;
        self.stunned = false;
        self.dead = false;
        self.combo = 0.0;
        self.action = FighterAction::Idle;
        self.action_frame = 0;
        self.action_timer_ms = 0;
        self.attack = None;
        self.attack_cooldown_ms = 0;
        self.stun_remaining_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fight::constants::room::TICK_DT_MS;
    use uuid::Uuid;

    fn fighter(slot: usize) -> Fighter {
        Fighter::new(Uuid::new_v4(), format!("F{}", slot), None, slot)
    }

    fn press(f: &mut Fighter, apply: impl FnOnce(&mut FightInput)) {
        let mut input = FightInput::default();
        apply(&mut input);
        f.set_input(input);
    }

    #[test]
    fn test_spawn_positions() {
        let left = fighter(0);
        let right = fighter(1);
        assert_eq!(left.position, Vec2::new(200.0, 400.0));
        assert_eq!(right.position, Vec2::new(800.0, 400.0));
        assert!(left.facing_right);
        assert!(!right.facing_right);
        assert_eq!(left.health(), 100.0);
    }

    #[test]
    fn test_walk_and_clamp() {
        let mut f = fighter(0);
        press(&mut f, |i| i.left = true);
        for _ in 0..100 {
            f.update(TICK_DT_MS);
        }
        assert_eq!(f.position.x, stage::MIN_X);
        assert!(!f.facing_right);
        assert_eq!(f.action, FighterAction::Walk);
    }

    #[test]
    fn test_jump_lands() {
        let mut f = fighter(0);
        press(&mut f, |i| i.up = true);
        f.update(TICK_DT_MS);
        assert!(!f.grounded);
        assert!(f.position.y < stage::GROUND_Y);

        f.set_input(FightInput::default());
        for _ in 0..60 {
            f.update(TICK_DT_MS);
        }
        assert!(f.grounded);
        assert_eq!(f.position.y, stage::GROUND_Y);
        assert_eq!(f.action, FighterAction::Idle);
    }

    #[test]
    fn test_block_only_when_grounded() {
        let mut f = fighter(0);
        press(&mut f, |i| {
            i.down = true;
            i.right = true;
        });
        f.update(TICK_DT_MS);
        assert!(f.blocking);
        assert_eq!(f.velocity.x, 0.0);
        assert_eq!(f.action, FighterAction::Block);

        // The block button alone does not guard; only down does
        press(&mut f, |i| i.block = true);
        f.update(TICK_DT_MS);
        assert!(!f.blocking);
        assert_eq!(f.action, FighterAction::Idle);

        press(&mut f, |i| {
            i.down = true;
            i.up = true;
        });
        f.update(TICK_DT_MS);
        assert!(!f.grounded);
        assert!(!f.blocking);
        assert_eq!(f.action, FighterAction::Jump);
    }

    #[test]
    fn test_punch_timeline() {
        let mut f = fighter(0);
        press(&mut f, |i| i.punch = true);
        f.update(TICK_DT_MS);
        assert!(f.is_attacking());
        assert_eq!(f.action, FighterAction::Punch);
        assert!(f.hitbox().is_none());

        // 30% of 300ms
        let mut ticks = 1;
        while f.hitbox().is_none() {
            f.update(TICK_DT_MS);
            ticks += 1;
            assert!(ticks < 20);
        }
        assert!(ticks as u64 * TICK_DT_MS >= 90);

        f.set_input(FightInput::default());
        while f.is_attacking() {
            f.update(TICK_DT_MS);
        }
        assert!(f.hitbox().is_none());
        assert_eq!(f.action, FighterAction::Idle);

        // Cooldown blocks an immediate follow-up
        press(&mut f, |i| i.punch = true);
        f.update(TICK_DT_MS);
        assert!(!f.is_attacking());
    }

    #[test]
    fn test_attack_priority() {
        let mut f = fighter(0);
        press(&mut f, |i| {
            i.punch = true;
            i.kick = true;
            i.left = true;
        });
        f.update(TICK_DT_MS);
        assert_eq!(f.current_attack(), Some(AttackKind::Punch));
        // Attacking suppresses movement
        assert_eq!(f.position.x, 200.0);
    }

    #[test]
    fn test_special_needs_full_meter() {
        let mut f = fighter(0);
        press(&mut f, |i| i.special = true);
        f.update(TICK_DT_MS);
        assert!(!f.is_attacking());

        f.gain_combo(1_000.0);
        assert_eq!(f.combo(), stats::MAX_COMBO);
        f.update(TICK_DT_MS);
        assert_eq!(f.current_attack(), Some(AttackKind::Special));
        assert_eq!(f.combo(), 0.0);
    }

    #[test]
    fn test_combo_regen() {
        let mut f = fighter(0);
        for _ in 0..10 {
            f.update(TICK_DT_MS);
        }
        assert!((f.combo() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_take_damage_unblocked() {
        let mut f = fighter(1);
        let outcome = f.take_damage(&attacks::KICK, 700.0, true).unwrap();
        assert!(!outcome.blocked);
        assert_eq!(f.health(), 85.0);
        assert_eq!(f.velocity.x, 10.0);
        assert!(f.stunned);
        assert_eq!(f.action, FighterAction::Hurt);
    }

    #[test]
    fn test_take_damage_blocked_facing_attacker() {
        let mut f = fighter(1);
        f.blocking = true;
        // Fighter 1 faces left; attacker on the left
        let outcome = f.take_damage(&attacks::KICK, 700.0, true).unwrap();
        assert!(outcome.blocked);
        assert!((outcome.applied_damage - 4.5).abs() < 1e-4);
        assert!((f.health() - 95.5).abs() < 1e-4);
        assert!((f.velocity.x - 3.0).abs() < 1e-4);
        assert_eq!(f.stun_remaining_ms, 100);
    }

    #[test]
    fn test_block_facing_away_takes_full() {
        let mut f = fighter(1);
        f.blocking = true;
        // Attacker behind (to the right of a left-facing fighter)
        let outcome = f.take_damage(&attacks::PUNCH, 900.0, false).unwrap();
        assert!(!outcome.blocked);
        assert_eq!(f.health(), 92.0);
        assert_eq!(f.velocity.x, -5.0);
        assert_eq!(f.stun_remaining_ms, 100);
    }

    #[test]
    fn test_dead_stays_dead_until_reset() {
        let mut f = fighter(0);
        for _ in 0..4 {
            f.take_damage(&attacks::SPECIAL, 300.0, false);
        }
        assert!(f.is_dead());
        assert_eq!(f.health(), 0.0);
        assert!(f.take_damage(&attacks::PUNCH, 300.0, false).is_none());

        press(&mut f, |i| {
            i.right = true;
            i.punch = true;
        });
        for _ in 0..100 {
            f.update(TICK_DT_MS);
        }
        assert!(f.is_dead());
        assert!(!f.is_attacking());
        assert_eq!(f.action, FighterAction::Dead);

        f.gain_combo(50.0);
        f.reset();
        assert!(!f.is_dead());
        assert_eq!(f.health(), stats::MAX_HEALTH);
        assert_eq!(f.combo(), 0.0);
        assert_eq!(f.position, Vec2::new(200.0, 400.0));
        assert_eq!(f.action, FighterAction::Idle);
    }

    #[test]
    fn test_stun_suppresses_input_then_expires() {
        let mut f = fighter(0);
        f.take_damage(&attacks::PUNCH, 300.0, false);
        press(&mut f, |i| i.right = true);
        f.update(TICK_DT_MS);
        assert!(f.stunned);
        assert_eq!(f.action, FighterAction::Hurt);

        for _ in 0..10 {
            f.update(TICK_DT_MS);
        }
        assert!(!f.stunned);
        assert_eq!(f.action, FighterAction::Walk);
    }

    #[test]
    fn test_hitbox_geometry() {
        let mut f = fighter(0);
        press(&mut f, |i| i.punch = true);
        while f.hitbox().is_none() {
            f.update(TICK_DT_MS);
        }
        let (hitbox, profile) = f.hitbox().unwrap();
        assert_eq!(profile, &attacks::PUNCH);
        assert_eq!(hitbox.center, Vec2::new(230.0, 360.0));
        assert_eq!(hitbox.half_width, 30.0);

        let mut near = fighter(1);
        near.position.x = 250.0;
        assert!(hitbox.intersects(&near.hurtbox()));
        let far = fighter(1);
        assert!(!hitbox.intersects(&far.hurtbox()));

        f.spend_hitbox();
        assert!(f.hitbox().is_none());
    }
}
