//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::matchmaking::Lobby;
use crate::util::time::tick_duration;
use crate::ws::gateway::Gateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: Arc<Lobby>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Outbound routing shared by the lobby and every room
        let gateway = Arc::new(Gateway::new());

        let lobby = Arc::new(Lobby::new(gateway, tick_duration(config.tick_rate_hz)));

        Self { config, lobby }
    }
}
