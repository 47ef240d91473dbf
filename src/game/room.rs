//! Room lifecycle and authoritative tick loop

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::Timer;
use crate::ws::gateway::Gateway;
use crate::ws::protocol::ServerMsg;

use super::simulation::{ArenaRules, SimEvent};
use super::snapshot::SnapshotBuilder;
use super::{Input, InputBuffer, Role, SimulationState};

/// Process-unique room identifier, rendered as `room{n}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(u64);

impl RoomId {
    pub fn new(seq: u64) -> Self {
        Self(seq)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room{}", self.0)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Why a room stopped ticking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A player's health reached zero
    Defeat { winner: Role },
    /// A member's connection went away
    Disconnected,
    /// A member asked to restart
    Restarted,
}

/// Room phase. A room is born `Active`; `Terminated` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Active,
    Terminated(EndReason),
}

/// Identity occupying one seat of a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMember {
    pub identity_id: Uuid,
    pub name: String,
}

/// The authoritative state of one match
pub struct Room {
    id: RoomId,
    /// Indexed by `Role::index`
    members: [RoomMember; 2],
    phase: RoomPhase,
    state: SimulationState,
    inputs: InputBuffer,
    snapshots: SnapshotBuilder,
    rules: ArenaRules,
}

impl Room {
    pub fn new(id: RoomId, player1: RoomMember, player2: RoomMember) -> Self {
        Self {
            id,
            members: [player1, player2],
            phase: RoomPhase::Active,
            state: SimulationState::new(),
            inputs: InputBuffer::new(),
            snapshots: SnapshotBuilder::new(),
            rules: ArenaRules::default(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoomPhase::Active
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn member(&self, role: Role) -> &RoomMember {
        &self.members[role.index()]
    }

    pub fn member_ids(&self) -> [Uuid; 2] {
        [self.members[0].identity_id, self.members[1].identity_id]
    }

    /// Buffer input for the next tick; ignored once terminated
    pub fn submit_input(&mut self, role: Role, input: Input) {
        if self.is_active() {
            self.inputs.submit(role, input);
        }
    }

    /// Move to `Terminated`. Returns false if the room had already ended.
    pub fn terminate(&mut self, reason: EndReason) -> bool {
        if !self.is_active() {
            return false;
        }
        self.phase = RoomPhase::Terminated(reason);
        info!(room_id = %self.id, reason = ?reason, "Room terminated");
        true
    }

    /// Run one simulation tick and publish its results.
    ///
    /// Hit notices go to the damaged member only; the result and the snapshot
    /// go to both. Returns whether the room is still active afterwards.
    pub fn tick(&mut self, gateway: &Gateway) -> bool {
        if !self.is_active() {
            return false;
        }

        let inputs = self.inputs.drain();
        let events = self.state.step(&inputs, &self.rules);
        let member_ids = self.member_ids();

        for event in events {
            match event {
                SimEvent::Hit { target, health } => {
                    debug!(room_id = %self.id, target = ?target, health, "Player hit");
                    gateway.send(&self.member(target).identity_id, ServerMsg::Hit);
                }
                SimEvent::Depleted { role } => {
                    let winner = role.opponent();
                    if self.terminate(EndReason::Defeat { winner }) {
                        let winner_name = self.member(winner).name.clone();
                        info!(room_id = %self.id, winner = %winner_name, "Match over");
                        gateway.send_many(&member_ids, &ServerMsg::MatchOver { winner_name });
                    }
                }
            }
        }

        let snapshot = self.snapshots.build(&self.state);
        gateway.send_many(&member_ids, &snapshot);

        self.is_active()
    }

    /// Drive `room` at a fixed rate until it terminates.
    ///
    /// The first tick fires one period after the call so that match
    /// notifications queued at creation always precede the first snapshot.
    pub async fn run(room: Arc<Mutex<Room>>, gateway: Arc<Gateway>, period: Duration) {
        let room_id = room.lock().id();
        info!(room_id = %room_id, "Room started");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let timer = Timer::new();
            let active = room.lock().tick(&gateway);
            let elapsed = timer.elapsed();
            if elapsed > period {
                warn!(room_id = %room_id, elapsed_us = elapsed.as_micros() as u64, "Tick overran its budget");
            }

            if !active {
                break;
            }
        }

        let phase = room.lock().phase();
        info!(room_id = %room_id, phase = ?phase, "Room stopped");
    }
}

/// Shared handle to a live room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: RoomId,
    members: [Uuid; 2],
    room: Arc<Mutex<Room>>,
}

impl RoomHandle {
    pub fn new(room: Room) -> Self {
        Self {
            id: room.id(),
            members: room.member_ids(),
            room: Arc::new(Mutex::new(room)),
        }
    }

    pub fn members(&self) -> [Uuid; 2] {
        self.members
    }

    pub fn role_of(&self, identity_id: &Uuid) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| &self.members[role.index()] == identity_id)
    }

    /// The member other than `identity_id`
    pub fn other_member(&self, identity_id: &Uuid) -> Option<Uuid> {
        self.role_of(identity_id)
            .map(|role| self.members[role.opponent().index()])
    }

    pub fn submit_input(&self, role: Role, input: Input) {
        self.room.lock().submit_input(role, input);
    }

    pub fn terminate(&self, reason: EndReason) -> bool {
        self.room.lock().terminate(reason)
    }

    pub fn shared(&self) -> Arc<Mutex<Room>> {
        self.room.clone()
    }
}
