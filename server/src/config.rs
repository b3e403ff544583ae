use pong_shared::config::PhysicsConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    /// Upper bound on concurrently active rooms
    pub max_rooms: usize,
    pub room_code_len: usize,
    /// Fixed seed for serve angles; `None` seeds every room from OS entropy
    pub rng_seed: Option<u64>,
    /// Inbound command queue per room
    pub room_command_capacity: usize,
    /// Outbound frames buffered per room before slow peers start skipping
    pub room_broadcast_capacity: usize,
    pub max_connections: usize,
    /// `None` allows any origin
    pub allowed_origin: Option<String>,
    pub physics: PhysicsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            tick_rate_hz: 60,
            max_rooms: 1024,
            room_code_len: 6,
            rng_seed: None,
            room_command_capacity: 256,
            room_broadcast_capacity: 64,
            max_connections: 2048,
            allowed_origin: None,
            physics: PhysicsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PORT`, `CORS_ORIGIN`, `PONG_TICK_RATE`,
    /// `PONG_MAX_ROOMS` and `PONG_RNG_SEED`.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| format!("PORT is not a valid port: {}", port))?;
            config.listen_addr = format!("0.0.0.0:{}", port);
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            config.allowed_origin = if origin == "*" { None } else { Some(origin) };
        }
        if let Ok(rate) = std::env::var("PONG_TICK_RATE") {
            config.tick_rate_hz = rate
                .parse()
                .map_err(|_| format!("PONG_TICK_RATE is not a number: {}", rate))?;
        }
        if let Ok(max) = std::env::var("PONG_MAX_ROOMS") {
            config.max_rooms = max
                .parse()
                .map_err(|_| format!("PONG_MAX_ROOMS is not a number: {}", max))?;
        }
        if let Ok(seed) = std::env::var("PONG_RNG_SEED") {
            config.rng_seed = Some(
                seed.parse()
                    .map_err(|_| format!("PONG_RNG_SEED is not a number: {}", seed))?,
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.max_rooms == 0 {
            return Err("max_rooms must be > 0".to_string());
        }
        if !(4..=16).contains(&self.room_code_len) {
            return Err("room_code_len must be in 4..=16".to_string());
        }
        if self.room_command_capacity == 0 || self.room_broadcast_capacity == 0 {
            return Err("room channel capacities must be > 0".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }
        if let Some(origin) = &self.allowed_origin {
            if axum::http::HeaderValue::from_str(origin).is_err() {
                return Err(format!("CORS origin is not a valid header value: {:?}", origin));
            }
        }
        self.physics.validate()
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_invalid() {
        let config = ServerConfig {
            tick_rate_hz: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_room_code_invalid() {
        let config = ServerConfig {
            room_code_len: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unusable_cors_origin_invalid() {
        let config = ServerConfig {
            allowed_origin: Some("http://bad\norigin".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_physics_is_reported() {
        let mut config = ServerConfig::default();
        config.physics.spin_decay = 2.0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("spin_decay"));
    }

    #[test]
    fn tick_interval_matches_rate() {
        let config = ServerConfig::default();
        let expected = 1.0 / 60.0;
        assert!((config.tick_interval().as_secs_f64() - expected).abs() < 1e-9);
    }
}
