//! Fight matchmaking and room registry
//!
//! [`FightManager`] owns the queue, every live room and the deferred task
//! scheduler. It is constructed once per server and handed to the connection
//! layer; all methods return the messages to route instead of writing to
//! connections themselves.

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::fight::constants::room::{COUNTDOWN_FROM, COUNTDOWN_STEP_MS, RECONNECT_GRACE_MS, ROUND_TRANSITION_MS};
use crate::fight::fighter::FightInput;
use crate::fight::queue::{MatchQueue, QueueEntry};
use crate::fight::room::{FightRoom, RoundState};
use crate::fight::scheduler::{RoomScheduler, RoomTask};
use crate::fight::{FightError, RoomId};
use crate::net::protocol::{ConnectionId, FightSnapshot, MatchPlayer, MatchPlayers, Outbound, ServerMessage};

pub struct FightManager {
    queue: MatchQueue,
    rooms: HashMap<RoomId, FightRoom>,
    scheduler: RoomScheduler,
    next_room_id: RoomId,
    grace_ms: u64,
}

impl FightManager {
    pub fn new(grace_ms: u64) -> Self {
        Self {
            queue: MatchQueue::new(),
            rooms: HashMap::new(),
            scheduler: RoomScheduler::new(),
            next_room_id: 0,
            grace_ms,
        }
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room(&self, id: RoomId) -> Option<&FightRoom> {
        self.rooms.get(&id)
    }

    /// Room whose fighter is currently bound to `connection`
    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.rooms
            .iter()
            .find(|(_, room)| room.slot_of(connection).is_some())
            .map(|(&id, _)| id)
    }

    // ========================================================================
    // Matchmaking
    // ========================================================================

    /// Enqueue a connection and pair the two oldest entries if possible.
    ///
    /// A repeated join from an already-queued connection changes nothing but
    /// still re-broadcasts the queue size.
    pub fn join_queue(
        &mut self,
        connection: ConnectionId,
        name: String,
        avatar: Option<String>,
        now_ms: u64,
    ) -> Vec<Outbound> {
        let mut out = Vec::new();

        let entry = QueueEntry {
            connection_id: connection,
            name,
            avatar,
            joined_at_ms: now_ms,
        };
        if self.queue.push(entry) {
            info!("Connection {} joined fight queue ({} waiting)", connection, self.queue.len());
            if let Some((first, second)) = self.queue.pop_pair() {
                self.create_room(first, second, now_ms, &mut out);
            }
        } else {
            debug!("Connection {} already queued", connection);
        }

        self.queue_status(&mut out);
        out
    }

    /// Remove a waiting connection; no-op if it is not queued
    pub fn leave_queue(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        let mut out = Vec::new();
        if let Some(entry) = self.queue.remove(connection) {
            info!("{} left fight queue", entry.name);
            self.queue_status(&mut out);
        }
        out
    }

    fn queue_status(&self, out: &mut Vec<Outbound>) {
        let players_in_queue = self.queue.len() as u32;
        out.extend(
            self.queue
                .connections()
                .map(|c| Outbound::to(c, ServerMessage::QueueStatus { players_in_queue })),
        );
    }

    fn create_room(&mut self, first: QueueEntry, second: QueueEntry, now_ms: u64, out: &mut Vec<Outbound>) {
        let room_id = self.next_room_id;
        self.next_room_id += 1;

        let players = MatchPlayers {
            player1: MatchPlayer {
                id: first.connection_id,
                name: first.name.clone(),
                avatar: first.avatar.clone(),
            },
            player2: MatchPlayer {
                id: second.connection_id,
                name: second.name.clone(),
                avatar: second.avatar.clone(),
            },
        };
        info!("Match created: room {} - {} vs {}", room_id, first.name, second.name);

        let room = FightRoom::new(room_id, first, second);
        room_broadcast(&room, ServerMessage::MatchFound { room_id, players }, out);
        room_broadcast(&room, ServerMessage::Countdown { count: COUNTDOWN_FROM }, out);
        self.rooms.insert(room_id, room);
        self.scheduler.schedule(now_ms + COUNTDOWN_STEP_MS, room_id, RoomTask::CountdownTick);
    }

    // ========================================================================
    // Room membership
    // ========================================================================

    /// Bind a connection to a fighter of `room_id`; returns the player number
    pub fn join_game(
        &mut self,
        connection: ConnectionId,
        room_id: RoomId,
        old_id: Option<ConnectionId>,
    ) -> Result<u8, FightError> {
        let room = self.rooms.get_mut(&room_id).ok_or(FightError::RoomNotFound)?;
        room.rejoin(connection, old_id)
    }

    /// Replace the input snapshot of the fighter bound to `connection`
    pub fn handle_input(&mut self, connection: ConnectionId, input: FightInput) -> bool {
        self.rooms
            .values_mut()
            .any(|room| room.set_input(connection, input))
    }

    /// Connection closed.
    ///
    /// While a room is still waiting for both slots to rejoin, the disconnect
    /// (re)starts the grace window. Otherwise the room is torn down at once
    /// and the other side is told.
    pub fn handle_disconnect(&mut self, connection: ConnectionId, now_ms: u64) -> Vec<Outbound> {
        let mut out = self.leave_queue(connection);

        let Some(room_id) = self.room_of(connection) else {
            return out;
        };

        let transitioning = match self.rooms.get_mut(&room_id) {
            Some(room) if room.is_transitioning() => {
                let generation = room.bump_grace();
                self.scheduler
                    .schedule(now_ms + self.grace_ms, room_id, RoomTask::GraceExpired { generation });
                true
            }
            Some(_) => false,
            None => return out,
        };

        if transitioning {
            info!("Connection {} left room {} during transition, grace started", connection, room_id);
        } else if let Some(room) = self.rooms.remove(&room_id) {
            info!("Room {} closed: {} disconnected", room_id, connection);
            out.extend(
                room.connection_ids()
                    .into_iter()
                    .filter(|&id| id != connection)
                    .map(|id| Outbound::to(id, ServerMessage::OpponentDisconnected)),
            );
        }
        out
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Fire due tasks, then step every room and emit its state
    pub fn tick(&mut self, now_ms: u64, dt_ms: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        while let Some((room_id, task)) = self.scheduler.pop_due(now_ms) {
            self.run_task(room_id, task, now_ms, &mut out);
        }

        for (&room_id, room) in self.rooms.iter_mut() {
            let tick = room.tick(dt_ms);

            for hit in tick.hits {
                room_broadcast(
                    room,
                    ServerMessage::Hit {
                        attacker_id: hit.attacker_id,
                        victim_id: hit.victim_id,
                        damage: hit.damage,
                        blocked: hit.blocked,
                    },
                    &mut out,
                );
            }

            if let Some(end) = tick.round_end {
                let winner = &room.fighters()[end.winner_slot];
                let message = ServerMessage::RoundEnd {
                    winner_id: Some(winner.id),
                    winner_name: Some(winner.name.clone()),
                    rounds_won: room.rounds_won(),
                    match_over: end.match_over,
                };
                room_broadcast(room, message, &mut out);

                let task = if end.match_over {
                    RoomTask::EndMatch
                } else {
                    RoomTask::NextRound
                };
                self.scheduler.schedule(now_ms + ROUND_TRANSITION_MS, room_id, task);
            }

            // Sent every tick regardless of round state
            room_broadcast(room, ServerMessage::GameUpdate(FightSnapshot::from_room(room)), &mut out);
        }

        out
    }

    fn run_task(&mut self, room_id: RoomId, task: RoomTask, now_ms: u64, out: &mut Vec<Outbound>) {
        if let RoomTask::GraceExpired { generation } = task {
            self.expire_grace(room_id, generation, out);
            return;
        }

        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!("Dropping {:?} for closed room {}", task, room_id);
            return;
        };

        match task {
            RoomTask::CountdownTick => {
                let Some(count) = room.countdown_tick() else {
                    return;
                };
                room_broadcast(room, ServerMessage::Countdown { count }, out);
                if count > 0 {
                    self.scheduler
                        .schedule(now_ms + COUNTDOWN_STEP_MS, room_id, RoomTask::CountdownTick);
                } else if room.transition(RoundState::Fighting).is_ok() {
                    info!("Round {} started in room {}", room.current_round, room_id);
                    room_broadcast(room, ServerMessage::RoundStart { round: room.current_round }, out);
                }
            }
            RoomTask::NextRound => match room.start_next_round() {
                Ok(_) => {
                    room_broadcast(room, ServerMessage::Countdown { count: COUNTDOWN_FROM }, out);
                    self.scheduler
                        .schedule(now_ms + COUNTDOWN_STEP_MS, room_id, RoomTask::CountdownTick);
                }
                Err(e) => warn!("Room {}: {}", room_id, e),
            },
            RoomTask::EndMatch => match room.finish_match() {
                Ok(winner_slot) => {
                    let winner = &room.fighters()[winner_slot];
                    let message = ServerMessage::MatchOver {
                        winner_id: winner.id,
                        winner_name: winner.name.clone(),
                        final_score: room.rounds_won(),
                    };
                    room_broadcast(room, message, out);
                }
                Err(e) => warn!("Room {}: {}", room_id, e),
            },
            RoomTask::GraceExpired { .. } => {}
        }
    }

    fn expire_grace(&mut self, room_id: RoomId, generation: u64, out: &mut Vec<Outbound>) {
        let expired = self
            .rooms
            .get(&room_id)
            .is_some_and(|room| room.is_transitioning() && room.grace_generation() == generation);
        if !expired {
            return;
        }
        if let Some(room) = self.rooms.remove(&room_id) {
            info!("Room {} closed: reconnect grace expired", room_id);
            room_broadcast(&room, ServerMessage::OpponentDisconnected, out);
        }
    }
}

impl Default for FightManager {
    fn default() -> Self {
        Self::new(RECONNECT_GRACE_MS)
    }
}

/// Address both fighters by their current connection ids
fn room_broadcast(room: &FightRoom, message: ServerMessage, out: &mut Vec<Outbound>) {
    let [a, b] = room.connection_ids();
    out.push(Outbound::to(a, message.clone()));
    out.push(Outbound::to(b, message));
}
