use crate::simulator::{SimulatorConfig, DEFAULT_DT, DEFAULT_MAX_STEPS};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// How often the host loop advances the live run (one step per tick)
    pub tick_rate_hz: u32,
    /// Integration timestep (s), independent of the tick rate
    pub dt: f64,
    /// Forced finalize after this many steps
    pub max_steps: u32,
    /// Bowl the default delivery as soon as the loop starts
    pub bowl_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9002".to_string(),
            tick_rate_hz: 60,
            dt: DEFAULT_DT,
            max_steps: DEFAULT_MAX_STEPS,
            bowl_on_start: true,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `BOWLING_LISTEN_ADDR` and `BOWLING_TICK_RATE_HZ`.
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("BOWLING_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Ok(rate) = std::env::var("BOWLING_TICK_RATE_HZ") {
            config.tick_rate_hz = rate
                .parse()
                .map_err(|e| format!("BOWLING_TICK_RATE_HZ: {}", e))?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err("dt must be finite and > 0".to_string());
        }
        if self.max_steps == 0 {
            return Err("max_steps must be > 0".to_string());
        }
        Ok(())
    }

    pub fn simulator(&self) -> SimulatorConfig {
        SimulatorConfig {
            dt: self.dt,
            max_steps: self.max_steps,
        }
    }
}
