//! Fight room: two fighters, round scoring and reconnection slots

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::fight::constants::room::{COUNTDOWN_FROM, ROUNDS_TO_WIN};
use crate::fight::fighter::{FightInput, Fighter};
use crate::fight::queue::QueueEntry;
use crate::fight::{FightError, RoomId, TransitionError};
use crate::net::protocol::{ConnectionId, RoundTally};

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Initial state of every round
    Countdown,
    Fighting,
    RoundOver,
    /// Terminal
    MatchOver,
}

impl RoundState {
    /// Transition table
    pub fn can_transition_to(self, next: RoundState) -> bool {
        matches!(
            (self, next),
            (RoundState::Countdown, RoundState::Fighting)
                | (RoundState::Fighting, RoundState::RoundOver)
                | (RoundState::RoundOver, RoundState::Countdown)
                | (RoundState::RoundOver, RoundState::MatchOver)
        )
    }
}

/// A landed attack. `damage` is the attack's nominal damage.
#[derive(Debug, Clone, PartialEq)]
pub struct HitEvent {
    pub attacker_id: ConnectionId,
    pub victim_id: ConnectionId,
    pub damage: f32,
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    pub winner_slot: usize,
    pub match_over: bool,
}

/// What one room tick produced
#[derive(Debug, Default)]
pub struct RoomTick {
    pub hits: Vec<HitEvent>,
    pub round_end: Option<RoundResult>,
}

/// Authoritative container for one 1v1 match.
///
/// Fighters live in fixed position slots; the connection index maps the
/// current connection ids onto those slots and is re-keyed on rejoin.
pub struct FightRoom {
    pub id: RoomId,
    fighters: [Fighter; 2],
    index: HashMap<ConnectionId, usize>,
    pub current_round: u32,
    rounds_won: [u32; 2],
    state: RoundState,
    countdown: u32,
    winner_slot: Option<usize>,
    /// Slots that completed a post-match-found rejoin
    rejoined: [bool; 2],
    /// True until both slots have rejoined; disconnects get a grace period meanwhile
    transitioning: bool,
    grace_generation: u64,
}

impl FightRoom {
    pub fn new(id: RoomId, first: QueueEntry, second: QueueEntry) -> Self {
        let fighters = [
            Fighter::new(first.connection_id, first.name, first.avatar, 0),
            Fighter::new(second.connection_id, second.name, second.avatar, 1),
        ];
        let mut index = HashMap::with_capacity(2);
        index.insert(fighters[0].id, 0);
        index.insert(fighters[1].id, 1);

        Self {
            id,
            fighters,
            index,
            current_round: 1,
            rounds_won: [0; 2],
            state: RoundState::Countdown,
            countdown: COUNTDOWN_FROM,
            winner_slot: None,
            rejoined: [false; 2],
            transitioning: true,
            grace_generation: 0,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn state(&self) -> RoundState {
        self.state
    }

    #[inline]
    pub fn fighters(&self) -> &[Fighter; 2] {
        &self.fighters
    }

    pub fn slot_of(&self, connection: ConnectionId) -> Option<usize> {
        self.index.get(&connection).copied()
    }

    pub fn fighter(&self, connection: ConnectionId) -> Option<&Fighter> {
        self.slot_of(connection).map(|slot| &self.fighters[slot])
    }

    /// Current connection ids, slot order
    pub fn connection_ids(&self) -> [ConnectionId; 2] {
        [self.fighters[0].id, self.fighters[1].id]
    }

    pub fn wins(&self, slot: usize) -> u32 {
        self.rounds_won.get(slot).copied().unwrap_or(0)
    }

    /// Round tally keyed by the connections currently bound to each slot
    pub fn rounds_won(&self) -> Vec<RoundTally> {
        self.fighters
            .iter()
            .map(|f| RoundTally {
                player_id: f.id,
                wins: self.rounds_won[f.slot()],
            })
            .collect()
    }

    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    #[inline]
    pub fn grace_generation(&self) -> u64 {
        self.grace_generation
    }

    #[inline]
    pub fn winner_slot(&self) -> Option<usize> {
        self.winner_slot
    }

    // ========================================================================
    // State machine
    // ========================================================================

    pub fn transition(&mut self, next: RoundState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        debug!("Room {} {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Step the countdown by one second. `None` outside the countdown.
    pub fn countdown_tick(&mut self) -> Option<u32> {
        if self.state != RoundState::Countdown {
            return None;
        }
        self.countdown = self.countdown.saturating_sub(1);
        Some(self.countdown)
    }

    /// Reset both fighters and re-enter the countdown for the next round
    pub fn start_next_round(&mut self) -> Result<u32, TransitionError> {
        self.transition(RoundState::Countdown)?;
        self.current_round += 1;
        self.countdown = COUNTDOWN_FROM;
        for fighter in &mut self.fighters {
            fighter.reset();
        }
        Ok(self.current_round)
    }

    /// Enter the terminal state; returns the winning slot
    pub fn finish_match(&mut self) -> Result<usize, TransitionError> {
        self.transition(RoundState::MatchOver)?;
        let winner = self.winner_slot.unwrap_or_else(|| {
            if self.rounds_won[1] > self.rounds_won[0] {
                1
            } else {
                0
            }
        });
        info!(
            "Match over in room {}: {} wins {}-{}",
            self.id, self.fighters[winner].name, self.rounds_won[winner], self.rounds_won[1 - winner]
        );
        Ok(winner)
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Store the input snapshot for the fighter bound to `connection`
    pub fn set_input(&mut self, connection: ConnectionId, input: FightInput) -> bool {
        match self.slot_of(connection) {
            Some(slot) => {
                self.fighters[slot].set_input(input);
                true
            }
            None => false,
        }
    }

    /// One room step. Physics, hits and round-end only run while fighting.
    pub fn tick(&mut self, dt_ms: u64) -> RoomTick {
        let mut result = RoomTick::default();
        if self.state != RoundState::Fighting {
            return result;
        }

        for fighter in &mut self.fighters {
            fighter.update(dt_ms);
        }

        for (attacker, victim) in [(0, 1), (1, 0)] {
            if let Some(hit) = self.resolve_hit(attacker, victim) {
                result.hits.push(hit);
            }
        }

        result.round_end = self.check_round_end();
        result
    }

    fn resolve_hit(&mut self, attacker_slot: usize, victim_slot: usize) -> Option<HitEvent> {
        let [left, right] = &mut self.fighters;
        let (attacker, victim) = if attacker_slot == 0 {
            (left, right)
        } else {
            (right, left)
        };
        debug_assert_ne!(attacker_slot, victim_slot);

        if attacker.is_dead() {
            return None;
        }
        let (hitbox, profile) = attacker.hitbox()?;
        if !hitbox.intersects(&victim.hurtbox()) {
            return None;
        }

        let outcome = victim.take_damage(profile, attacker.position.x, attacker.facing_right);
        attacker.spend_hitbox();
        let outcome = outcome?;
        attacker.gain_combo(profile.combo_gain);

        Some(HitEvent {
            attacker_id: attacker.id,
            victim_id: victim.id,
            damage: profile.damage,
            blocked: outcome.blocked,
        })
    }

    fn check_round_end(&mut self) -> Option<RoundResult> {
        let loser = self.fighters.iter().position(Fighter::is_dead)?;
        let winner = 1 - loser;

        self.rounds_won[winner] += 1;
        self.winner_slot = Some(winner);
        let match_over = self.rounds_won.iter().any(|&w| w >= ROUNDS_TO_WIN);

        // Fighting -> RoundOver is always legal here
        self.state = RoundState::RoundOver;
        info!(
            "Round {} in room {} won by {} ({}-{})",
            self.current_round, self.id, self.fighters[winner].name, self.rounds_won[0], self.rounds_won[1]
        );

        Some(RoundResult {
            winner_slot: winner,
            match_over,
        })
    }

    // ========================================================================
    // Reconnection
    // ========================================================================

    /// Bind a (new) connection to a fighter slot.
    ///
    /// Resolution order: a connection already bound keeps its slot; otherwise
    /// the remembered old id's slot; otherwise the first slot that has not yet
    /// rejoined. Returns the player number (1 or 2).
    pub fn rejoin(&mut self, new_id: ConnectionId, old_id: Option<ConnectionId>) -> Result<u8, FightError> {
        if let Some(slot) = self.slot_of(new_id) {
            return Ok(slot as u8 + 1);
        }

        let slot = old_id
            .and_then(|old| self.slot_of(old))
            .or_else(|| (0..2).find(|&s| !self.rejoined[s]))
            .ok_or(FightError::NoFreeSlot)?;

        self.rebind(slot, new_id);
        Ok(slot as u8 + 1)
    }

    fn rebind(&mut self, slot: usize, new_id: ConnectionId) {
        let old_id = self.fighters[slot].id;
        self.index.remove(&old_id);
        self.index.insert(new_id, slot);
        self.fighters[slot].id = new_id;
        self.rejoined[slot] = true;

        if self.rejoined.iter().all(|&r| r) {
            self.transitioning = false;
        }
        info!("Room {} slot {} rebound {} -> {}", self.id, slot, old_id, new_id);
    }

    /// Start or refresh the disconnect grace window; returns its generation
    pub fn bump_grace(&mut self) -> u64 {
        self.grace_generation += 1;
        self.grace_generation
    }

    #[cfg(test)]
    pub(crate) fn fighter_at_mut(&mut self, slot: usize) -> &mut Fighter {
        &mut self.fighters[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fight::constants::room::TICK_DT_MS;
    use uuid::Uuid;

    fn entry(name: &str) -> QueueEntry {
        QueueEntry {
            connection_id: Uuid::new_v4(),
            name: name.to_string(),
            avatar: None,
            joined_at_ms: 0,
        }
    }

    fn room() -> FightRoom {
        FightRoom::new(1, entry("Alice"), entry("Bob"))
    }

    fn fighting_room() -> FightRoom {
        let mut r = room();
        r.transition(RoundState::Fighting).unwrap();
        r
    }

    /// Kill one slot by repeated special hits, then tick the round end
    fn knock_out(room: &mut FightRoom, loser: usize) -> RoomTick {
        for _ in 0..4 {
            room.fighters[loser].take_damage(&crate::fight::constants::attacks::SPECIAL, 500.0, true);
        }
        room.tick(TICK_DT_MS)
    }

    #[test]
    fn test_transition_table() {
        use RoundState::*;
        assert!(Countdown.can_transition_to(Fighting));
        assert!(Fighting.can_transition_to(RoundOver));
        assert!(RoundOver.can_transition_to(Countdown));
        assert!(RoundOver.can_transition_to(MatchOver));
        assert!(!Countdown.can_transition_to(RoundOver));
        assert!(!MatchOver.can_transition_to(Countdown));
        assert!(!Fighting.can_transition_to(MatchOver));

        let mut r = room();
        assert_eq!(
            r.transition(MatchOver),
            Err(TransitionError { from: Countdown, to: MatchOver })
        );
        assert_eq!(r.state(), Countdown);
    }

    #[test]
    fn test_countdown_steps() {
        let mut r = room();
        assert_eq!(r.countdown_tick(), Some(2));
        assert_eq!(r.countdown_tick(), Some(1));
        assert_eq!(r.countdown_tick(), Some(0));
        r.transition(RoundState::Fighting).unwrap();
        assert_eq!(r.countdown_tick(), None);
    }

    #[test]
    fn test_no_physics_outside_fighting() {
        let mut r = room();
        let id = r.connection_ids()[0];
        r.set_input(id, FightInput { right: true, ..Default::default() });
        let tick = r.tick(TICK_DT_MS);
        assert!(tick.hits.is_empty());
        assert_eq!(r.fighters()[0].position.x, 200.0);
    }

    #[test]
    fn test_hit_registers_once_per_swing() {
        let mut r = fighting_room();
        r.fighters[1].position.x = 250.0;
        let attacker = r.connection_ids()[0];
        r.set_input(attacker, FightInput { punch: true, ..Default::default() });

        let mut hits = Vec::new();
        for _ in 0..19 {
            hits.extend(r.tick(TICK_DT_MS).hits);
        }
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.attacker_id, attacker);
        assert_eq!(hit.damage, 8.0);
        assert!(!hit.blocked);
        assert_eq!(r.fighters()[1].health(), 92.0);
        // Attacker gained combo on top of regen
        assert!(r.fighters()[0].combo() >= 10.0);
    }

    #[test]
    fn test_blocked_hit_reports_nominal_damage() {
        let mut r = fighting_room();
        r.fighters[1].position.x = 250.0;
        let [a, b] = r.connection_ids();
        r.set_input(a, FightInput { punch: true, ..Default::default() });
        r.set_input(b, FightInput { down: true, ..Default::default() });

        let mut hits = Vec::new();
        for _ in 0..19 {
            hits.extend(r.tick(TICK_DT_MS).hits);
        }
        assert_eq!(hits.len(), 1);
        assert!(hits[0].blocked);
        assert_eq!(hits[0].damage, 8.0);
        assert!((r.fighters()[1].health() - 97.6).abs() < 1e-3);
    }

    #[test]
    fn test_round_end_and_reset() {
        let mut r = fighting_room();
        r.fighters[0].gain_combo(40.0);

        let tick = knock_out(&mut r, 1);
        assert_eq!(tick.round_end, Some(RoundResult { winner_slot: 0, match_over: false }));
        assert_eq!(r.state(), RoundState::RoundOver);
        assert_eq!(r.wins(0), 1);
        assert_eq!(r.rounds_won()[0].wins, 1);

        assert_eq!(r.start_next_round(), Ok(2));
        assert_eq!(r.state(), RoundState::Countdown);
        for f in r.fighters() {
            assert_eq!(f.health(), 100.0);
            assert_eq!(f.combo(), 0.0);
            assert!(!f.is_dead());
        }
        assert_eq!(r.fighters()[1].position.x, 800.0);
    }

    #[test]
    fn test_match_ends_at_two_wins() {
        let mut r = fighting_room();
        knock_out(&mut r, 0);
        r.start_next_round().unwrap();
        r.transition(RoundState::Fighting).unwrap();

        let tick = knock_out(&mut r, 0);
        assert_eq!(tick.round_end, Some(RoundResult { winner_slot: 1, match_over: true }));
        assert_eq!(r.finish_match(), Ok(1));
        assert_eq!(r.state(), RoundState::MatchOver);
        assert!(r.start_next_round().is_err());
    }

    #[test]
    fn test_rejoin_idempotent() {
        let mut r = room();
        let c = Uuid::new_v4();
        assert_eq!(r.rejoin(c, None), Ok(1));
        let ids = r.connection_ids();
        assert_eq!(r.rejoin(c, None), Ok(1));
        assert_eq!(r.connection_ids(), ids);
        assert!(r.is_transitioning());
    }

    #[test]
    fn test_rejoin_fallback_order() {
        let mut r = room();
        let [a, b] = r.connection_ids();
        let c = Uuid::new_v4();
        let d = Uuid::new_v4();

        assert_eq!(r.rejoin(c, None), Ok(1));
        assert_eq!(r.fighters()[0].id, c);
        assert!(r.slot_of(a).is_none());
        assert_eq!(r.rejoin(d, None), Ok(2));
        assert_eq!(r.fighters()[1].id, d);
        assert!(r.slot_of(b).is_none());
        assert!(!r.is_transitioning());

        assert_eq!(r.rejoin(Uuid::new_v4(), None), Err(FightError::NoFreeSlot));
    }

    #[test]
    fn test_rejoin_with_remembered_id() {
        let mut r = room();
        let [_, b] = r.connection_ids();
        let new_b = Uuid::new_v4();
        assert_eq!(r.rejoin(new_b, Some(b)), Ok(2));
        assert_eq!(r.fighters()[1].id, new_b);
        assert!(r.is_transitioning());
    }

    #[test]
    fn test_tally_follows_rebind() {
        let mut r = fighting_room();
        knock_out(&mut r, 1);
        let new_a = Uuid::new_v4();
        r.rejoin(new_a, None).unwrap();
        let tally = r.rounds_won();
        assert_eq!(tally[0], RoundTally { player_id: new_a, wins: 1 });
    }

    #[test]
    fn test_input_for_unknown_connection_ignored() {
        let mut r = room();
        assert!(!r.set_input(Uuid::new_v4(), FightInput::default()));
    }
}
