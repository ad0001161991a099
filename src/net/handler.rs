//! Client message handling
//!
//! Maps one decoded [`ClientMessage`] from one connection onto the arena or
//! fight engine and returns what should be sent back. Rejected arena actions
//! (cooldowns, caps, stale ids) are logged and dropped without a reply.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::arena::game::{ArenaSettings, Game};
use crate::arena::world::World;
use crate::config::ServerConfig;
use crate::fight::manager::FightManager;
use crate::metrics::Metrics;
use crate::net::arena_session::{event_message, ArenaSession, SharedArena};
use crate::net::connections::Connections;
use crate::net::fight_session::SharedFight;
use crate::net::protocol::{ClientMessage, ConnectionId, Outbound, ServerMessage};
use crate::util::clock::GameClock;
use crate::util::sanitize_name;
use crate::util::vec2::Vec2;

/// Everything a connection task needs, cheap to clone
#[derive(Clone)]
pub struct ServerContext {
    pub arena: SharedArena,
    pub fight: SharedFight,
    pub connections: Connections,
    pub clock: GameClock,
    pub metrics: Arc<Metrics>,
}

impl ServerContext {
    pub fn new(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        let settings = ArenaSettings {
            food_target: config.food_target,
            food_low_water: config.food_low_water,
            ..ArenaSettings::default()
        };
        let game = Game::new(World::new(config.world_width, config.world_height), settings);

        Self {
            arena: Arc::new(RwLock::new(ArenaSession::new(game, config.view_margin))),
            fight: Arc::new(RwLock::new(FightManager::new(config.reconnect_grace_ms))),
            connections: Connections::new(),
            clock: GameClock::new(),
            metrics,
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Apply one client message and return the replies and broadcasts it causes
pub async fn handle_client_message(
    ctx: &ServerContext,
    connection: ConnectionId,
    msg: ClientMessage,
) -> Vec<Outbound> {
    let now_ms = ctx.clock.now_ms();

    match msg {
        ClientMessage::Join { name, avatar, viewport } => {
            ctx.arena.write().await.join(connection, &name, avatar, viewport)
        }

        ClientMessage::Move { x, y } => {
            if let Err(e) = ctx.arena.write().await.game_mut().move_player(connection, Vec2::new(x, y)) {
                debug!("Move from {} dropped: {}", connection, e);
            }
            Vec::new()
        }

        ClientMessage::Split => {
            match ctx.arena.write().await.game_mut().split(connection, now_ms) {
                Ok(n) => debug!("{} split into {} new cells", connection, n),
                Err(e) => debug!("Split from {} dropped: {}", connection, e),
            }
            Vec::new()
        }

        ClientMessage::Eject => {
            if let Err(e) = ctx.arena.write().await.game_mut().eject(connection, now_ms) {
                debug!("Eject from {} dropped: {}", connection, e);
            }
            Vec::new()
        }

        ClientMessage::Shoot => match ctx.arena.write().await.game_mut().shoot(connection, now_ms) {
            Ok(event) => vec![event_message(event)],
            Err(e) => {
                debug!("Shoot from {} dropped: {}", connection, e);
                Vec::new()
            }
        },

        ClientMessage::Viewport(viewport) => {
            ctx.arena.write().await.set_viewport(connection, viewport);
            Vec::new()
        }

        ClientMessage::Chat { message } => ctx.arena.read().await.chat(connection, &message),

        ClientMessage::FightJoinQueue { name, avatar } => {
            ctx.fight
                .write()
                .await
                .join_queue(connection, sanitize_name(&name), avatar, now_ms)
        }

        ClientMessage::FightLeaveQueue => ctx.fight.write().await.leave_queue(connection),

        ClientMessage::FightJoinGame { room_id, old_player_id } => {
            let result = ctx.fight.write().await.join_game(connection, room_id, old_player_id);
            let reply = match result {
                Ok(player_number) => ServerMessage::GameJoined { player_number, room_id },
                Err(e) => {
                    warn!("Rejoin of room {} by {} failed: {}", room_id, connection, e);
                    ServerMessage::GameJoinFailed { error: e.to_string() }
                }
            };
            vec![Outbound::to(connection, reply)]
        }

        ClientMessage::FightInput(input) => {
            ctx.fight.write().await.handle_input(connection, input);
            Vec::new()
        }

        ClientMessage::Ping { timestamp } => vec![Outbound::to(
            connection,
            ServerMessage::Pong {
                client_timestamp: timestamp,
                server_timestamp: unix_millis(),
            },
        )],
    }
}

/// Connection closed: leave the arena and any queue or room
pub async fn handle_disconnect(ctx: &ServerContext, connection: ConnectionId) -> Vec<Outbound> {
    let now_ms = ctx.clock.now_ms();
    let mut out = ctx.arena.write().await.leave(connection);
    out.extend(ctx.fight.write().await.handle_disconnect(connection, now_ms));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fight::fighter::FightInput;
    use crate::net::protocol::{Recipient, Viewport};
    use uuid::Uuid;

    fn context() -> ServerContext {
        let config = ServerConfig {
            world_width: 1000.0,
            world_height: 1000.0,
            food_target: 0,
            food_low_water: 0,
            ..Default::default()
        };
        ServerContext::new(&config, Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_join_then_chat() {
        let ctx = context();
        let a = Uuid::new_v4();

        let out = handle_client_message(
            &ctx,
            a,
            ClientMessage::Join {
                name: "Alice".to_string(),
                avatar: None,
                viewport: Some(Viewport { width: 800.0, height: 600.0 }),
            },
        )
        .await;
        assert!(matches!(out[0].message, ServerMessage::Init { player_id, .. } if player_id == a));

        let out = handle_client_message(&ctx, a, ClientMessage::Chat { message: " hello ".to_string() }).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0].message, ServerMessage::Chat { message, .. } if message == "hello"));
    }

    #[tokio::test]
    async fn test_actions_from_unknown_connection_are_silent() {
        let ctx = context();
        let ghost = Uuid::new_v4();
        for msg in [
            ClientMessage::Move { x: 10.0, y: 10.0 },
            ClientMessage::Split,
            ClientMessage::Eject,
            ClientMessage::Shoot,
            ClientMessage::Chat { message: "hi".to_string() },
            ClientMessage::FightLeaveQueue,
            ClientMessage::FightInput(FightInput::default()),
        ] {
            assert!(handle_client_message(&ctx, ghost, msg).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_shoot_below_mass_threshold_is_dropped() {
        let ctx = context();
        let a = Uuid::new_v4();
        handle_client_message(
            &ctx,
            a,
            ClientMessage::Join { name: "A".to_string(), avatar: None, viewport: None },
        )
        .await;
        // A fresh cell has mass 4, well under the shooting threshold
        assert!(handle_client_message(&ctx, a, ClientMessage::Shoot).await.is_empty());
        assert!(ctx.arena.read().await.game().projectiles().is_empty());
    }

    #[tokio::test]
    async fn test_queue_pairing_and_rejoin() {
        let ctx = context();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let out = handle_client_message(
            &ctx,
            a,
            ClientMessage::FightJoinQueue { name: "A".to_string(), avatar: None },
        )
        .await;
        assert!(matches!(out[0].message, ServerMessage::QueueStatus { players_in_queue: 1 }));

        let out = handle_client_message(
            &ctx,
            b,
            ClientMessage::FightJoinQueue { name: "B".to_string(), avatar: None },
        )
        .await;
        let room_id = out
            .iter()
            .find_map(|o| match o.message {
                ServerMessage::MatchFound { room_id, .. } => Some(room_id),
                _ => None,
            })
            .unwrap();

        // The fight page reconnects under a new id and claims slot 2
        let b2 = Uuid::new_v4();
        handle_disconnect(&ctx, b).await;
        let out = handle_client_message(
            &ctx,
            b2,
            ClientMessage::FightJoinGame { room_id, old_player_id: Some(b) },
        )
        .await;
        assert_eq!(out[0].to, Recipient::Connection(b2));
        assert!(matches!(out[0].message, ServerMessage::GameJoined { player_number: 2, .. }));

        let out = handle_client_message(
            &ctx,
            b2,
            ClientMessage::FightJoinGame { room_id: room_id + 99, old_player_id: None },
        )
        .await;
        assert!(matches!(out[0].message, ServerMessage::GameJoinFailed { .. }));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let ctx = context();
        let out = handle_client_message(&ctx, Uuid::new_v4(), ClientMessage::Ping { timestamp: 77 }).await;
        assert!(matches!(
            out[0].message,
            ServerMessage::Pong { client_timestamp: 77, server_timestamp } if server_timestamp > 0
        ));
    }

    #[tokio::test]
    async fn test_disconnect_announces_arena_leave() {
        let ctx = context();
        let a = Uuid::new_v4();
        handle_client_message(
            &ctx,
            a,
            ClientMessage::Join { name: "Alice".to_string(), avatar: None, viewport: None },
        )
        .await;

        let out = handle_disconnect(&ctx, a).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipient::AllExcept(a));
        assert!(ctx.arena.read().await.game().player(a).is_none());
    }
}
