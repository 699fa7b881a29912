//! Server and game-rule configuration

use shared::{
    BOMB_FUSE_MS, DEFAULT_EXPLOSION_RANGE, DEFAULT_MAX_BOMBS, DESTRUCTIBLE_CHANCE,
    EXPLOSION_DURATION_MS, GRID_SIZE, POWER_UP_CHANCE, SCORE_PER_WALL, TICK_INTERVAL_MS,
};
use std::time::Duration;

/// Tunable rules shared by every room on a server.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    pub grid_size: usize,
    /// Simulated time consumed by one tick, in milliseconds.
    pub tick_interval_ms: u32,
    pub bomb_fuse_ms: u32,
    pub explosion_duration_ms: u32,
    pub destructible_chance: f64,
    pub power_up_chance: f64,
    pub initial_explosion_range: u32,
    pub initial_max_bombs: u32,
    pub score_per_wall: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            tick_interval_ms: TICK_INTERVAL_MS,
            bomb_fuse_ms: BOMB_FUSE_MS,
            explosion_duration_ms: EXPLOSION_DURATION_MS,
            destructible_chance: DESTRUCTIBLE_CHANCE,
            power_up_chance: POWER_UP_CHANCE,
            initial_explosion_range: DEFAULT_EXPLOSION_RANGE,
            initial_max_bombs: DEFAULT_MAX_BOMBS,
            score_per_wall: SCORE_PER_WALL,
        }
    }
}

impl GameRules {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_interval_ms.max(1)))
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    /// Silence after which a client counts as disconnected.
    pub client_timeout: Duration,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_clients: 64,
            client_timeout: Duration::from_secs(5),
            rules: GameRules::default(),
        }
    }
}
