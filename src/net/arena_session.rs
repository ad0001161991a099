//! Arena session: the shared [`Game`] plus who is watching it
//!
//! Arena player ids are the connection ids of their sockets. A connection
//! that has joined keeps receiving updates after its player dies, until it
//! disconnects or joins again.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info};

use crate::arena::game::{ArenaEvent, Game};
use crate::arena::player::PlayerId;
use crate::metrics::Metrics;
use crate::net::aoi::{self, AoiStats, ViewBox};
use crate::net::connections::Connections;
use crate::net::protocol::{ArenaSnapshot, ConnectionId, Outbound, ServerMessage, Viewport};
use crate::util::clock::GameClock;
use crate::util::sanitize_name;

/// Longest chat line relayed, in characters
pub const MAX_CHAT_LEN: usize = 200;

const SYSTEM_NAME: &str = "System";

pub type SharedArena = Arc<RwLock<ArenaSession>>;

pub struct ArenaSession {
    game: Game,
    viewports: HashMap<ConnectionId, Viewport>,
    joined: HashSet<ConnectionId>,
    view_margin: f32,
}

impl ArenaSession {
    pub fn new(game: Game, view_margin: f32) -> Self {
        Self {
            game,
            viewports: HashMap::new(),
            joined: HashSet::new(),
            view_margin,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn is_joined(&self, connection: ConnectionId) -> bool {
        self.joined.contains(&connection)
    }

    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    /// Spawn (or respawn) the connection's player and announce it
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: &str,
        avatar: Option<String>,
        viewport: Option<Viewport>,
    ) -> Vec<Outbound> {
        let name = sanitize_name(name);
        self.game.add_player(connection, name.clone(), avatar);
        self.joined.insert(connection);
        if let Some(viewport) = viewport {
            self.set_viewport(connection, viewport);
        }
        info!("{} joined the arena ({} players)", name, self.game.players().len());

        vec![
            Outbound::to(
                connection,
                ServerMessage::Init {
                    player_id: connection,
                    state: ArenaSnapshot::from_game(&self.game),
                },
            ),
            Outbound::broadcast_except(connection, system_chat(format!("{} joined the arena", name))),
        ]
    }

    /// Forget a connection; announces the departure if it still had a player
    pub fn leave(&mut self, connection: ConnectionId) -> Vec<Outbound> {
        self.viewports.remove(&connection);
        let was_joined = self.joined.remove(&connection);
        match self.game.remove_player(connection) {
            Some(player) => {
                info!("{} left the arena", player.name);
                vec![Outbound::broadcast_except(
                    connection,
                    system_chat(format!("{} left the arena", player.name)),
                )]
            }
            None => {
                if was_joined {
                    debug!("Spectating connection {} left the arena", connection);
                }
                Vec::new()
            }
        }
    }

    pub fn set_viewport(&mut self, connection: ConnectionId, viewport: Viewport) {
        if viewport.width.is_finite() && viewport.height.is_finite() {
            self.viewports.insert(connection, viewport);
        }
    }

    /// Relay a chat line from a live player to everyone
    pub fn chat(&self, connection: ConnectionId, message: &str) -> Vec<Outbound> {
        let Some(player) = self.game.player(connection) else {
            return Vec::new();
        };
        let message: String = message.trim().chars().take(MAX_CHAT_LEN).collect();
        if message.is_empty() {
            return Vec::new();
        }
        debug!("Chat from {}: {}", player.name, message);
        vec![Outbound::broadcast(ServerMessage::Chat {
            id: Some(player.id),
            name: player.name.clone(),
            message,
        })]
    }

    /// Advance the simulation and build every joined connection's update
    pub fn tick(&mut self, now_ms: u64) -> (Vec<Outbound>, AoiStats) {
        let mut out: Vec<Outbound> = self.game.tick(now_ms).into_iter().map(event_message).collect();

        let full = ArenaSnapshot::from_game(&self.game);
        let mut stats = AoiStats::default();
        for &connection in &self.joined {
            let view = self
                .viewports
                .get(&connection)
                .and_then(|&vp| view_box(&self.game, connection, vp, self.view_margin));
            let snapshot = match view {
                Some(view) => {
                    let culled = aoi::cull(&full, &view);
                    let s = AoiStats::between(&full, &culled);
                    stats.original_entities += s.original_entities;
                    stats.filtered_entities += s.filtered_entities;
                    culled
                }
                None => full.clone(),
            };
            out.push(Outbound::to(connection, ServerMessage::Update(snapshot)));
        }
        (out, stats)
    }
}

/// View box centered on the viewer's average cell position; `None` once dead
pub fn view_box(game: &Game, viewer: PlayerId, viewport: Viewport, margin: f32) -> Option<ViewBox> {
    let center = game.player(viewer)?.center()?;
    Some(ViewBox::new(viewer, center, viewport, margin))
}

fn system_chat(message: String) -> ServerMessage {
    ServerMessage::Chat {
        id: None,
        name: SYSTEM_NAME.to_string(),
        message,
    }
}

/// Route an arena event: deaths go to the victim, the rest to everyone
pub fn event_message(event: ArenaEvent) -> Outbound {
    match event {
        ArenaEvent::PlayerDied {
            victim_id,
            killer_id,
            killer_name,
            killer_score,
        } => {
            info!("{} was eaten by {}", victim_id, killer_name);
            Outbound::to(
                victim_id,
                ServerMessage::PlayerDied {
                    killer_id,
                    killer_name,
                    killer_score: killer_score.round() as i32,
                },
            )
        }
        ArenaEvent::PlayerExploded {
            victim_id,
            victim_name,
            shooter_id,
            shooter_name,
            position,
        } => Outbound::broadcast(ServerMessage::PlayerExploded {
            victim_id,
            victim_name,
            shooter_id,
            shooter_name,
            x: position.x.round() as i32,
            y: position.y.round() as i32,
        }),
        ArenaEvent::ProjectileFired {
            player_id,
            player_name,
        } => Outbound::broadcast(ServerMessage::ProjectileFired {
            player_id,
            player_name,
        }),
    }
}

/// Drive the arena at `tick_rate` Hz until the runtime shuts down
pub fn start_arena_loop(
    arena: SharedArena,
    connections: Connections,
    clock: GameClock,
    metrics: Arc<Metrics>,
    tick_rate: u32,
) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_micros(1_000_000 / tick_rate.max(1) as u64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Arena loop started at {} Hz", tick_rate);
        let start = Instant::now();
        let mut tick_count: u64 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            let outbound = {
                let mut session = arena.write().await;
                let tick_start = Instant::now();
                let (outbound, stats) = session.tick(clock.now_ms());
                metrics.record_tick_time(tick_start.elapsed());

                let game = session.game();
                metrics.arena_players.store(game.players().len() as u64, Ordering::Relaxed);
                metrics.arena_cells.store(game.cell_count() as u64, Ordering::Relaxed);
                metrics.food_count.store(game.food().len() as u64, Ordering::Relaxed);
                metrics.projectile_count.store(game.projectiles().len() as u64, Ordering::Relaxed);
                metrics
                    .aoi_reduction_percent
                    .store(stats.reduction_percent().round() as u64, Ordering::Relaxed);
                outbound
            };

            connections.dispatch(outbound);

            if tick_count % (tick_rate.max(1) as u64 * 30) == 0 {
                let session = arena.read().await;
                let game = session.game();
                info!(
                    "Arena: {}s, tick {}, {} players / {} cells, {} food, {} projectiles, {} watching",
                    start.elapsed().as_secs(),
                    game.tick_count(),
                    game.players().len(),
                    game.cell_count(),
                    game.food().len(),
                    game.projectiles().len(),
                    session.joined_count()
                );
            }
        }
    });
}
