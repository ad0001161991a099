//! Fight tick loop
//!
//! Every room is stepped on every tick whatever its state; countdown and
//! round-over rooms still broadcast their snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::info;

use crate::fight::constants::room::TICK_DT_MS;
use crate::fight::manager::FightManager;
use crate::metrics::Metrics;
use crate::net::connections::Connections;
use crate::util::clock::GameClock;

pub type SharedFight = Arc<RwLock<FightManager>>;

pub fn start_fight_loop(
    fight: SharedFight,
    connections: Connections,
    clock: GameClock,
    metrics: Arc<Metrics>,
    tick_rate: u32,
) {
    tokio::spawn(async move {
        let tick_rate = tick_rate.max(1);
        let mut ticker = interval(Duration::from_micros(1_000_000 / tick_rate as u64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("Fight loop started at {} Hz", tick_rate);
        let mut tick_count: u64 = 0;

        loop {
            ticker.tick().await;
            tick_count += 1;

            let outbound = {
                let mut manager = fight.write().await;
                let tick_start = Instant::now();
                let outbound = manager.tick(clock.now_ms(), TICK_DT_MS);
                metrics.record_fight_tick(tick_start.elapsed(), manager.room_count(), manager.queue_len());
                outbound
            };

            connections.dispatch(outbound);

            if tick_count % (tick_rate as u64 * 30) == 0 {
                let manager = fight.read().await;
                info!(
                    "Fight: {} rooms, {} queued",
                    manager.room_count(),
                    manager.queue_len()
                );
            }
        }
    });
}
