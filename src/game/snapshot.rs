//! Snapshot building

use crate::ws::protocol::ServerMsg;

use super::SimulationState;

/// Builds snapshots for network transmission
pub struct SnapshotBuilder {
    /// Ticks simulated so far in this room
    tick: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self { tick: 0 }
    }

    /// Stamp the next tick number onto a full copy of the state
    pub fn build(&mut self, state: &SimulationState) -> ServerMsg {
        self.tick += 1;
        ServerMsg::Tick {
            tick: self.tick,
            state: state.clone(),
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}
