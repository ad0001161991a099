//! Area of Interest (AOI) filtering for arena updates
//!
//! Culls a serialized [`ArenaSnapshot`] down to what a client can see: food and
//! cells outside the viewer's viewport (plus a fixed margin) are dropped.
//! The filter only ever touches the serialized copy, never authoritative state.

use crate::arena::player::PlayerId;
use crate::net::protocol::{ArenaPlayerSnapshot, ArenaSnapshot, Viewport};
use crate::util::vec2::Vec2;

/// Default margin beyond the viewport edge, in world units
pub const DEFAULT_VIEW_MARGIN: f32 = 200.0;

/// Axis-aligned box around a viewer's camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub viewer: PlayerId,
    pub center: Vec2,
    pub half_width: f32,
    pub half_height: f32,
}

impl ViewBox {
    /// Box of `viewport / 2 + margin` around `center`
    pub fn new(viewer: PlayerId, center: Vec2, viewport: Viewport, margin: f32) -> Self {
        Self {
            viewer,
            center,
            half_width: viewport.width.max(0.0) / 2.0 + margin,
            half_height: viewport.height.max(0.0) / 2.0 + margin,
        }
    }

    /// Whether a circle at integer snapshot coordinates touches the box
    #[inline]
    pub fn contains_circle(&self, x: i32, y: i32, radius: i32) -> bool {
        let r = radius.max(0) as f32;
        (x as f32 - self.center.x).abs() <= self.half_width + r
            && (y as f32 - self.center.y).abs() <= self.half_height + r
    }
}

/// Filter a snapshot for one viewer.
///
/// Food and cells are culled by the box. Other players left with no visible
/// cells are dropped entirely; the viewer is always kept. Projectiles,
/// leaderboard and world size pass through unchanged.
pub fn cull(snapshot: &ArenaSnapshot, view: &ViewBox) -> ArenaSnapshot {
    let players = snapshot
        .players
        .iter()
        .filter_map(|p| {
            let cells: Vec<_> = p
                .cells
                .iter()
                .filter(|c| view.contains_circle(c.x, c.y, c.radius))
                .cloned()
                .collect();
            if cells.is_empty() && p.id != view.viewer {
                return None;
            }
            Some(ArenaPlayerSnapshot {
                id: p.id,
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                cells,
                score: p.score,
            })
        })
        .collect();

    let food = snapshot
        .food
        .iter()
        .filter(|f| view.contains_circle(f.x, f.y, f.radius))
        .cloned()
        .collect();

    ArenaSnapshot {
        players,
        food,
        projectiles: snapshot.projectiles.clone(),
        leaderboard: snapshot.leaderboard.clone(),
        world_size: snapshot.world_size,
    }
}

/// Statistics about AOI filtering
#[derive(Debug, Clone, Copy, Default)]
pub struct AoiStats {
    pub original_entities: usize,
    pub filtered_entities: usize,
}

impl AoiStats {
    pub fn between(original: &ArenaSnapshot, filtered: &ArenaSnapshot) -> Self {
        Self {
            original_entities: entity_count(original),
            filtered_entities: entity_count(filtered),
        }
    }

    pub fn reduction_percent(&self) -> f32 {
        if self.original_entities == 0 {
            return 0.0;
        }
        (1.0 - self.filtered_entities as f32 / self.original_entities as f32) * 100.0
    }
}

fn entity_count(snapshot: &ArenaSnapshot) -> usize {
    snapshot.food.len() + snapshot.players.iter().map(|p| p.cells.len()).sum::<usize>()
}

// ============================================================================
// Tests
// ============================================================================
