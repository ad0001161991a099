//! Prometheus-compatible metrics endpoint
//!
//! Exposes arena and fight server metrics in Prometheus text format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // Arena
    pub arena_players: AtomicU64,
    pub arena_cells: AtomicU64,
    pub food_count: AtomicU64,
    pub projectile_count: AtomicU64,
    pub arena_tick_count: AtomicU64,
    pub aoi_reduction_percent: AtomicU64,

    // Fight
    pub fight_rooms: AtomicU64,
    pub fight_queue: AtomicU64,
    pub fight_tick_count: AtomicU64,
    pub fight_tick_time_us: AtomicU64,

    // Arena tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,

    start_time: Instant,

    // Rolling arena tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            arena_players: AtomicU64::new(0),
            arena_cells: AtomicU64::new(0),
            food_count: AtomicU64::new(0),
            projectile_count: AtomicU64::new(0),
            arena_tick_count: AtomicU64::new(0),
            aoi_reduction_percent: AtomicU64::new(0),
            fight_rooms: AtomicU64::new(0),
            fight_queue: AtomicU64::new(0),
            fight_tick_count: AtomicU64::new(0),
            fight_tick_time_us: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record an arena tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.arena_tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn record_fight_tick(&self, duration: Duration, rooms: usize, queued: usize) {
        self.fight_tick_time_us.store(duration.as_micros() as u64, Ordering::Relaxed);
        self.fight_tick_count.fetch_add(1, Ordering::Relaxed);
        self.fight_rooms.store(rooms as u64, Ordering::Relaxed);
        self.fight_queue.store(queued as u64, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        // Arena
        metric!("cellbrawl_arena_players", "Players alive in the arena", "gauge",
            self.arena_players.load(Ordering::Relaxed));
        metric!("cellbrawl_arena_cells", "Player cells in the arena", "gauge",
            self.arena_cells.load(Ordering::Relaxed));
        metric!("cellbrawl_arena_food", "Food pellets in the arena", "gauge",
            self.food_count.load(Ordering::Relaxed));
        metric!("cellbrawl_arena_projectiles", "Projectiles in flight", "gauge",
            self.projectile_count.load(Ordering::Relaxed));
        metric!("cellbrawl_arena_aoi_reduction_percent", "Entities culled from the last update", "gauge",
            self.aoi_reduction_percent.load(Ordering::Relaxed));

        // Arena timing
        metric!("cellbrawl_tick_time_microseconds", "Current arena tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("cellbrawl_tick_time_p95_microseconds", "95th percentile arena tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("cellbrawl_tick_time_p99_microseconds", "99th percentile arena tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("cellbrawl_tick_time_max_microseconds", "Maximum arena tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("cellbrawl_arena_tick_count", "Arena ticks processed", "counter",
            self.arena_tick_count.load(Ordering::Relaxed));

        // Fight
        metric!("cellbrawl_fight_rooms", "Live fight rooms", "gauge",
            self.fight_rooms.load(Ordering::Relaxed));
        metric!("cellbrawl_fight_queue", "Connections waiting for an opponent", "gauge",
            self.fight_queue.load(Ordering::Relaxed));
        metric!("cellbrawl_fight_tick_time_microseconds", "Current fight tick time in microseconds", "gauge",
            self.fight_tick_time_us.load(Ordering::Relaxed));
        metric!("cellbrawl_fight_tick_count", "Fight ticks processed", "counter",
            self.fight_tick_count.load(Ordering::Relaxed));

        // Network
        metric!("cellbrawl_connections_active", "Active WebTransport connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("cellbrawl_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("cellbrawl_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("cellbrawl_bytes_sent_total", "Total bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("cellbrawl_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));

        metric!("cellbrawl_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same counters
    pub fn to_json(&self) -> String {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        serde_json::json!({
            "arena": {
                "players": load(&self.arena_players),
                "cells": load(&self.arena_cells),
                "food": load(&self.food_count),
                "projectiles": load(&self.projectile_count),
                "aoi_reduction_percent": load(&self.aoi_reduction_percent),
            },
            "fight": {
                "rooms": load(&self.fight_rooms),
                "queue": load(&self.fight_queue),
                "tick_time_us": load(&self.fight_tick_time_us),
                "tick_count": load(&self.fight_tick_count),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.arena_tick_count),
            },
            "network": {
                "connections": load(&self.connections_active),
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "bytes_sent": load(&self.bytes_sent),
                "bytes_received": load(&self.bytes_received),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Route one raw HTTP request to a response
fn respond(metrics: &Metrics, request: &str) -> String {
    // The JSON route shares a prefix with the text route, so it goes first
    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        http_response("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        http_response("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
