use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arena::game::Game;
use crate::arena::player::PlayerId;
use crate::fight::fighter::{Fighter, FighterAction};
use crate::fight::room::FightRoom;
use crate::fight::RoomId;

pub use crate::fight::fighter::FightInput;

/// Opaque per-connection identity assigned by the transport
pub type ConnectionId = Uuid;

/// Client viewport size in world units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// `join`: enter the arena
    Join {
        name: String,
        avatar: Option<String>,
        viewport: Option<Viewport>,
    },
    /// `move`: pointer target in world coordinates
    Move { x: f32, y: f32 },
    /// `split`
    Split,
    /// `eject`
    Eject,
    /// `shoot`
    Shoot,
    /// Viewport resize, used for update culling
    Viewport(Viewport),
    /// `chat`
    Chat { message: String },
    /// `fight:joinQueue`
    FightJoinQueue { name: String, avatar: Option<String> },
    /// `fight:leaveQueue`
    FightLeaveQueue,
    /// `fight:joinGame`: rebind this connection to a fighter slot
    FightJoinGame {
        room_id: RoomId,
        old_player_id: Option<ConnectionId>,
    },
    /// `fight:input`
    FightInput(FightInput),
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// First message on every connection: the identity to remember across page loads
    Connected { connection_id: ConnectionId },
    /// `init`: reply to `join`
    Init {
        player_id: PlayerId,
        state: ArenaSnapshot,
    },
    /// `update`: per-tick arena state, viewport-culled
    Update(ArenaSnapshot),
    /// `chat`: `id` is `None` for system lines
    Chat {
        id: Option<PlayerId>,
        name: String,
        message: String,
    },
    /// `playerDied`: sent to the victim only
    PlayerDied {
        killer_id: Option<PlayerId>,
        killer_name: String,
        killer_score: i32,
    },
    /// `playerExploded`
    PlayerExploded {
        victim_id: PlayerId,
        victim_name: String,
        shooter_id: PlayerId,
        shooter_name: String,
        x: i32,
        y: i32,
    },
    /// `projectileFired`
    ProjectileFired {
        player_id: PlayerId,
        player_name: String,
    },
    /// `queueStatus`
    QueueStatus { players_in_queue: u32 },
    /// `matchFound`
    MatchFound {
        room_id: RoomId,
        players: MatchPlayers,
    },
    /// `gameJoined`
    GameJoined { player_number: u8, room_id: RoomId },
    /// Rejoin failure, reported to the caller
    GameJoinFailed { error: String },
    /// `countdown`: 3, 2, 1, then 0 ("fight")
    Countdown { count: u32 },
    /// `roundStart`
    RoundStart { round: u32 },
    /// `gameUpdate`
    GameUpdate(FightSnapshot),
    /// `hit`
    Hit {
        attacker_id: ConnectionId,
        victim_id: ConnectionId,
        damage: f32,
        blocked: bool,
    },
    /// `roundEnd`
    RoundEnd {
        winner_id: Option<ConnectionId>,
        winner_name: Option<String>,
        rounds_won: Vec<RoundTally>,
        match_over: bool,
    },
    /// `matchOver`
    MatchOver {
        winner_id: ConnectionId,
        winner_name: String,
        final_score: Vec<RoundTally>,
    },
    /// `opponentDisconnected`
    OpponentDisconnected,
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

// ============================================================================
// Arena snapshots
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaPlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub avatar: Option<String>,
    pub cells: Vec<CellSnapshot>,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub x: i32,
    pub y: i32,
    pub radius: i32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: u32,
    pub height: u32,
}

/// Serialized arena state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    pub players: Vec<ArenaPlayerSnapshot>,
    pub food: Vec<FoodSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub world_size: WorldSize,
}

impl ArenaSnapshot {
    /// Unfiltered snapshot of the whole arena with coordinates rounded
    pub fn from_game(game: &Game) -> Self {
        let players = game
            .players()
            .iter()
            .map(|p| ArenaPlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                cells: p
                    .cells
                    .iter()
                    .map(|c| CellSnapshot {
                        id: c.id,
                        x: c.position.x.round() as i32,
                        y: c.position.y.round() as i32,
                        radius: c.radius().round() as i32,
                        color: c.color.clone(),
                    })
                    .collect(),
                score: p.score.round() as i32,
            })
            .collect();

        let food = game
            .food()
            .iter()
            .map(|f| FoodSnapshot {
                id: f.id,
                x: f.position.x.round() as i32,
                y: f.position.y.round() as i32,
                radius: f.radius.round() as i32,
                color: f.color.to_string(),
            })
            .collect();

        let projectiles = game
            .projectiles()
            .iter()
            .map(|p| ProjectileSnapshot {
                id: p.id,
                x: p.position.x.round() as i32,
                y: p.position.y.round() as i32,
                radius: p.radius.round() as i32,
                color: crate::arena::constants::shoot::PROJECTILE_COLOR.to_string(),
            })
            .collect();

        let world = game.world();
        Self {
            players,
            food,
            projectiles,
            leaderboard: game
                .leaders()
                .into_iter()
                .map(|p| LeaderboardEntry {
                    name: p.name.clone(),
                    score: p.score.round() as i32,
                })
                .collect(),
            world_size: WorldSize {
                width: world.width as u32,
                height: world.height as u32,
            },
        }
    }
}

// ============================================================================
// Fight snapshots
// ============================================================================

/// One side of a `matchFound` announcement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayer {
    pub id: ConnectionId,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPlayers {
    pub player1: MatchPlayer,
    pub player2: MatchPlayer,
}

/// Rounds won by the fighter currently bound to `player_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundTally {
    pub player_id: ConnectionId,
    pub wins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FighterSnapshot {
    pub id: ConnectionId,
    pub name: String,
    pub avatar: Option<String>,
    pub position: u8,
    pub health: f32,
    pub max_health: f32,
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub facing_right: bool,
    pub is_grounded: bool,
    pub is_blocking: bool,
    pub is_attacking: bool,
    pub is_stunned: bool,
    pub is_dead: bool,
    pub combo_meter: f32,
    pub current_action: FighterAction,
    pub action_frame: u32,
}

impl From<&Fighter> for FighterSnapshot {
    fn from(f: &Fighter) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            avatar: f.avatar.clone(),
            position: f.slot() as u8,
            health: f.health(),
            max_health: f.max_health(),
            x: f.position.x,
            y: f.position.y,
            velocity_x: f.velocity.x,
            velocity_y: f.velocity.y,
            facing_right: f.facing_right,
            is_grounded: f.grounded,
            is_blocking: f.blocking,
            is_attacking: f.is_attacking(),
            is_stunned: f.stunned,
            is_dead: f.is_dead(),
            combo_meter: f.combo(),
            current_action: f.action,
            action_frame: f.action_frame,
        }
    }
}

/// Serialized fight room state (`gameUpdate`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FightSnapshot {
    pub fighters: Vec<FighterSnapshot>,
    pub current_round: u32,
    pub rounds_won: Vec<RoundTally>,
}

impl FightSnapshot {
    pub fn from_room(room: &FightRoom) -> Self {
        Self {
            fighters: room.fighters().iter().map(FighterSnapshot::from).collect(),
            current_round: room.current_round,
            rounds_won: room.rounds_won(),
        }
    }
}

// ============================================================================
// Outbound routing
// ============================================================================

/// Who receives an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    /// Every open connection except one
    AllExcept(ConnectionId),
    All,
}

/// A message produced by the engines, routed by the connection registry
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(connection: ConnectionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::Connection(connection),
            message,
        }
    }

    pub fn broadcast(message: ServerMessage) -> Self {
        Self {
            to: Recipient::All,
            message,
        }
    }

    pub fn broadcast_except(excluded: ConnectionId, message: ServerMessage) -> Self {
        Self {
            to: Recipient::AllExcept(excluded),
            message,
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers (compatible with TypeScript client)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
/// Uses legacy config for fixed-size integers (compatible with TypeScript client)
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::game::ArenaSettings;
    use crate::arena::world::World;

    #[test]
    fn test_client_message_join() {
        let msg = ClientMessage::Join {
            name: "TestPlayer".to_string(),
            avatar: Some("/uploads/a.png".to_string()),
            viewport: Some(Viewport { width: 1920.0, height: 1080.0 }),
        };
        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        match decoded {
            ClientMessage::Join { name, avatar, viewport } => {
                assert_eq!(name, "TestPlayer");
                assert_eq!(avatar.as_deref(), Some("/uploads/a.png"));
                assert_eq!(viewport.map(|v| v.width), Some(1920.0));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_client_message_rejoin() {
        let old = Uuid::new_v4();
        let msg = ClientMessage::FightJoinGame {
            room_id: 7,
            old_player_id: Some(old),
        };
        let decoded: ClientMessage = decode(&encode(&msg).unwrap()).unwrap();
        match decoded {
            ClientMessage::FightJoinGame { room_id, old_player_id } => {
                assert_eq!(room_id, 7);
                assert_eq!(old_player_id, Some(old));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_legacy_config_fixed_width() {
        // Legacy config encodes the variant tag as u32 and f32 as 4 bytes
        let encoded = encode(&ClientMessage::Move { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(encoded.len(), 4 + 4 + 4);
        assert_eq!(&encoded[..4], &1u32.to_le_bytes());
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let result: Result<ClientMessage, _> = decode(&[0xff, 0xff, 0xff, 0xff]);
        assert!(result.is_err());
    }

    #[test]
    fn test_arena_snapshot_rounds_values() {
        let mut game = Game::new(World::new(1000.0, 1000.0), ArenaSettings::empty());
        let id = Uuid::new_v4();
        game.add_player(id, "Rounder".to_string(), None);
        game.player_mut(id).unwrap().cells[0].position = crate::util::vec2::Vec2::new(10.6, 20.4);

        let snapshot = ArenaSnapshot::from_game(&game);
        assert_eq!(snapshot.players.len(), 1);
        let cell = &snapshot.players[0].cells[0];
        assert_eq!((cell.x, cell.y, cell.radius), (11, 20, 20));
        assert_eq!(snapshot.world_size, WorldSize { width: 1000, height: 1000 });
        assert_eq!(snapshot.leaderboard[0].name, "Rounder");

        let encoded = encode(&ServerMessage::Update(snapshot.clone())).unwrap();
        match decode::<ServerMessage>(&encoded).unwrap() {
            ServerMessage::Update(decoded) => assert_eq!(decoded, snapshot),
            _ => panic!("Wrong message type"),
        }
    }
}
