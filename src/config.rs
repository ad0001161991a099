use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::arena::constants::{food, world};
use crate::fight::constants::room;
use crate::net::aoi::DEFAULT_VIEW_MARGIN;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// WebTransport port
    pub port: u16,
    /// Prometheus/JSON metrics port
    pub metrics_port: u16,
    /// Arena simulation rate in Hz
    pub arena_tick_rate: u32,
    /// Fight room update rate in Hz
    pub fight_tick_rate: u32,
    pub world_width: f32,
    pub world_height: f32,
    /// Food count the arena is seeded with
    pub food_target: usize,
    /// Food count below which the arena refills
    pub food_low_water: usize,
    /// Extra world units around a client viewport kept in updates
    pub view_margin: f32,
    /// How long a fight room waits for a dropped player to rejoin
    pub reconnect_grace_ms: u64,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Path to TLS certificate file
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            arena_tick_rate: world::TICK_RATE,
            fight_tick_rate: room::TICK_RATE,
            world_width: world::WIDTH,
            world_height: world::HEIGHT,
            food_target: food::TARGET_COUNT,
            food_low_water: food::LOW_WATER,
            view_margin: DEFAULT_VIEW_MARGIN,
            reconnect_grace_ms: room::RECONNECT_GRACE_MS,
            max_connections: 1000,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// Why a loaded configuration was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("Metrics port must differ from the game port")]
    PortClash,
    #[error("Tick rate must be 1-240 Hz, got {0}")]
    TickRate(u32),
    #[error("World must be at least 100x100, got {0}x{1}")]
    WorldTooSmall(f32, f32),
    #[error("food_low_water ({low}) cannot exceed food_target ({target})")]
    FoodWatermark { low: usize, target: usize },
    #[error("max_connections must be at least 1")]
    NoConnections,
    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,
}

/// Read and parse an env var; unset leaves `None`, garbage warns and leaves `None`
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults.
    ///
    /// `.env` is read by `main` through dotenvy before this runs.
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse("BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Some(port) = env_parse::<u16>("PORT") {
            if port > 0 {
                config.port = port;
            } else {
                tracing::warn!("PORT must be > 0, using default");
            }
        }
        if let Some(port) = env_parse("METRICS_PORT") {
            config.metrics_port = port;
        }
        if let Some(rate) = env_parse("ARENA_TICK_RATE") {
            config.arena_tick_rate = rate;
        }
        if let Some(rate) = env_parse("FIGHT_TICK_RATE") {
            config.fight_tick_rate = rate;
        }
        if let Some(width) = env_parse("WORLD_WIDTH") {
            config.world_width = width;
        }
        if let Some(height) = env_parse("WORLD_HEIGHT") {
            config.world_height = height;
        }
        if let Some(target) = env_parse("FOOD_TARGET") {
            config.food_target = target;
        }
        if let Some(low) = env_parse("FOOD_LOW_WATER") {
            config.food_low_water = low;
        }
        if let Some(margin) = env_parse::<f32>("VIEW_MARGIN") {
            if margin >= 0.0 {
                config.view_margin = margin;
            } else {
                tracing::warn!("VIEW_MARGIN must be >= 0, using default");
            }
        }
        if let Some(grace) = env_parse("RECONNECT_GRACE_MS") {
            config.reconnect_grace_ms = grace;
        }
        if let Some(max) = env_parse("MAX_CONNECTIONS") {
            config.max_connections = max;
        }

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }
        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.metrics_port == self.port {
            return Err(ConfigError::PortClash);
        }
        for rate in [self.arena_tick_rate, self.fight_tick_rate] {
            if !(1..=240).contains(&rate) {
                return Err(ConfigError::TickRate(rate));
            }
        }
        if self.world_width < 100.0 || self.world_height < 100.0 {
            return Err(ConfigError::WorldTooSmall(self.world_width, self.world_height));
        }
        if self.food_low_water > self.food_target {
            return Err(ConfigError::FoodWatermark {
                low: self.food_low_water,
                target: self.food_target,
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            return Err(ConfigError::PartialTls);
        }
        Ok(())
    }
}
