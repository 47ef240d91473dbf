//! Lobby service - registry mutations, match creation and room teardown

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::room::EndReason;
use crate::game::{Input, Role, Room, RoomHandle, RoomId, RoomMember};
use crate::ws::gateway::Gateway;
use crate::ws::protocol::ServerMsg;

use super::matchmaker::{MatchDecision, Matchmaker, Pairing};
use super::registry::ConnectionRegistry;
use super::LobbyError;

/// Everything guarded by the lobby lock
#[derive(Default)]
struct LobbyState {
    registry: ConnectionRegistry,
    rooms: HashMap<RoomId, RoomHandle>,
    /// Last allocated room sequence number
    room_seq: u64,
}

/// Point-in-time counters for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LobbyStats {
    pub connected: usize,
    pub waiting: usize,
    pub active_rooms: usize,
}

/// Owner of the connection registry and the live room table.
///
/// Every mutation runs under one lock, so a match request scans for and
/// claims its opponent in a single step. Outbound messages are enqueued
/// while the lock is held, which keeps roster and match notices in mutation
/// order for every connection; enqueueing never blocks.
pub struct Lobby {
    state: Mutex<LobbyState>,
    gateway: Arc<Gateway>,
    tick_period: Duration,
}

impl Lobby {
    pub fn new(gateway: Arc<Gateway>, tick_period: Duration) -> Self {
        Self {
            state: Mutex::new(LobbyState::default()),
            gateway,
            tick_period,
        }
    }

    /// Register a new connection and return its identity
    pub fn connect(&self, outbound: mpsc::Sender<ServerMsg>) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.state.lock();

        self.gateway.attach(id, outbound);
        let name = state.registry.connect(id).name.clone();
        self.gateway.send(&id, ServerMsg::IdentityAssigned { id });
        self.broadcast_roster(&state);

        info!(identity_id = %id, name = %name, connected = state.registry.len(), "Identity connected");
        id
    }

    /// Set the display name of an identity
    pub fn register(&self, id: &Uuid, name: String) -> Result<(), LobbyError> {
        let mut state = self.state.lock();
        state.registry.register(id, name)?;
        self.broadcast_roster(&state);
        Ok(())
    }

    /// Pair `id` with the first waiting opponent, or park it as ready
    pub fn request_match(self: &Arc<Self>, id: &Uuid) -> Result<(), LobbyError> {
        let mut state = self.state.lock();

        match Matchmaker::decide(&state.registry, id)? {
            MatchDecision::Wait => {
                state.registry.set_ready(id)?;
                self.broadcast_roster(&state);
                self.gateway.send(id, ServerMsg::Waiting);
                info!(identity_id = %id, waiting = state.registry.waiting_count(), "Waiting for opponent");
            }
            MatchDecision::Paired(pairing) => {
                let handle = self.open_room(&mut state, pairing)?;
                self.broadcast_roster(&state);
                drop(state);
                self.spawn_room(handle);
            }
        }

        Ok(())
    }

    /// Seat both identities in a new room and send each its match notice
    fn open_room(&self, state: &mut LobbyState, pairing: Pairing) -> Result<RoomHandle, LobbyError> {
        state.room_seq += 1;
        let room_id = RoomId::new(state.room_seq);

        state.registry.assign_room(&pairing.player1, room_id)?;
        state.registry.assign_room(&pairing.player2, room_id)?;

        let profiles = [
            state.registry.get(&pairing.player1)?.profile(),
            state.registry.get(&pairing.player2)?.profile(),
        ];

        let room = Room::new(
            room_id,
            RoomMember {
                identity_id: profiles[0].id,
                name: profiles[0].name.clone(),
            },
            RoomMember {
                identity_id: profiles[1].id,
                name: profiles[1].name.clone(),
            },
        );
        let initial = room.state().clone();
        let handle = RoomHandle::new(room);
        state.rooms.insert(room_id, handle.clone());

        for role in Role::ALL {
            let player = profiles[role.index()].clone();
            let opponent = profiles[role.opponent().index()].clone();
            let player_id = player.id;
            self.gateway.send(
                &player_id,
                ServerMsg::MatchFound {
                    room_id,
                    role,
                    opponent,
                    player,
                    state: initial.clone(),
                },
            );
        }

        info!(
            room_id = %room_id,
            player1 = %pairing.player1,
            player2 = %pairing.player2,
            "Created new room"
        );

        Ok(handle)
    }

    /// Start the tick task; the room is torn down when the task ends
    fn spawn_room(self: &Arc<Self>, handle: RoomHandle) {
        let lobby = Arc::clone(self);
        let gateway = self.gateway.clone();
        let period = self.tick_period;

        tokio::spawn(async move {
            Room::run(handle.shared(), gateway, period).await;
            lobby.finish_room(handle.id);
        });
    }

    /// Buffer input for the sender's room
    pub fn submit_input(&self, id: &Uuid, input: Input) -> Result<(), LobbyError> {
        let (handle, role) = {
            let state = self.state.lock();
            let room_id = state
                .registry
                .get(id)?
                .room
                .ok_or(LobbyError::NoActiveRoom(*id))?;
            let handle = state
                .rooms
                .get(&room_id)
                .cloned()
                .ok_or(LobbyError::NoActiveRoom(*id))?;
            let role = handle.role_of(id).ok_or(LobbyError::NoActiveRoom(*id))?;
            (handle, role)
        };

        handle.submit_input(role, input);
        Ok(())
    }

    /// Leave the current room, if any, and return to the unready pool.
    ///
    /// A live room is terminated and the other member is told its opponent
    /// left. No new match is requested.
    pub fn restart(&self, id: &Uuid) -> Result<(), LobbyError> {
        let mut state = self.state.lock();
        let room = state.registry.get(id)?.room;

        if let Some(room_id) = room {
            self.close_room(&mut state, room_id, id, EndReason::Restarted);
            state.registry.leave_room(id);
        }
        state.registry.clear_ready(id)?;
        self.broadcast_roster(&state);

        info!(identity_id = %id, room = ?room, "Restart requested");
        Ok(())
    }

    /// Tear down a connection. Redundant calls are no-ops.
    pub fn disconnect(&self, id: &Uuid) {
        let mut state = self.state.lock();
        self.gateway.detach(id);

        let Some(identity) = state.registry.remove(id) else {
            debug!(identity_id = %id, "Disconnect for unknown identity");
            return;
        };

        if let Some(room_id) = identity.room {
            self.close_room(&mut state, room_id, id, EndReason::Disconnected);
        }
        self.broadcast_roster(&state);

        info!(identity_id = %id, connected = state.registry.len(), "Identity disconnected");
    }

    /// Relay a chat line to every connected identity
    pub fn chat(&self, id: &Uuid, text: String) -> Result<(), LobbyError> {
        let state = self.state.lock();
        let sender = state.registry.get(id)?.name.clone();
        self.gateway.broadcast(&ServerMsg::ChatMessage { sender, text });
        Ok(())
    }

    /// Remove a room whose tick task ended and free its members
    pub fn finish_room(&self, room_id: RoomId) {
        let mut state = self.state.lock();
        let Some(handle) = state.rooms.remove(&room_id) else {
            return;
        };

        for member in handle.members() {
            state.registry.leave_room(&member);
        }
        self.broadcast_roster(&state);

        info!(room_id = %room_id, "Room removed from lobby");
    }

    /// Terminate `room_id` on behalf of `leaver` and free the other member
    fn close_room(&self, state: &mut LobbyState, room_id: RoomId, leaver: &Uuid, reason: EndReason) {
        let Some(handle) = state.rooms.remove(&room_id) else {
            return;
        };

        let was_live = handle.terminate(reason);
        if let Some(other) = handle.other_member(leaver) {
            state.registry.leave_room(&other);
            if was_live {
                self.gateway.send(&other, ServerMsg::OpponentLeft { identity_id: *leaver });
            }
        }
    }

    fn broadcast_roster(&self, state: &LobbyState) {
        self.gateway.broadcast(&ServerMsg::RosterUpdated {
            players: state.registry.roster(),
        });
    }

    pub fn stats(&self) -> LobbyStats {
        let state = self.state.lock();
        LobbyStats {
            connected: state.registry.len(),
            waiting: state.registry.waiting_count(),
            active_rooms: state.rooms.len(),
        }
    }

    #[cfg(test)]
    fn identity(&self, id: &Uuid) -> Option<super::registry::Identity> {
        self.state.lock().registry.get(id).ok().cloned()
    }

    #[cfg(test)]
    fn room_members(&self) -> Vec<(RoomId, [Uuid; 2])> {
        self.state
            .lock()
            .rooms
            .values()
            .map(|handle| (handle.id, handle.members()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lobby() -> Arc<Lobby> {
        Arc::new(Lobby::new(Arc::new(Gateway::new()), Duration::from_millis(16)))
    }

    fn join(lobby: &Lobby, name: &str) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let (tx, rx) = mpsc::channel(4096);
        let id = lobby.connect(tx);
        lobby.register(&id, name.to_string()).unwrap();
        (id, rx)
    }

    /// Everything queued so far except tick snapshots
    fn events(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if !matches!(msg, ServerMsg::Tick { .. }) {
                out.push(msg);
            }
        }
        out
    }

    fn last_roster(msgs: &[ServerMsg]) -> Vec<crate::ws::protocol::PlayerProfile> {
        msgs.iter()
            .rev()
            .find_map(|msg| match msg {
                ServerMsg::RosterUpdated { players } => Some(players.clone()),
                _ => None,
            })
            .expect("no roster update")
    }

    #[tokio::test]
    async fn test_connect_assigns_identity_then_roster() {
        let lobby = lobby();
        let (tx, mut rx) = mpsc::channel(16);

        let id = lobby.connect(tx);

        let msgs = events(&mut rx);
        assert_eq!(msgs[0], ServerMsg::IdentityAssigned { id });
        let roster = last_roster(&msgs);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "Player1");
    }

    #[tokio::test]
    async fn test_alice_waits_then_bob_completes_match() {
        let lobby = lobby();
        let (alice, mut alice_rx) = join(&lobby, "Alice");

        lobby.request_match(&alice).unwrap();

        let msgs = events(&mut alice_rx);
        assert_eq!(msgs.last(), Some(&ServerMsg::Waiting));
        assert!(lobby.identity(&alice).unwrap().ready);

        let (bob, mut bob_rx) = join(&lobby, "Bob");
        events(&mut alice_rx);
        events(&mut bob_rx);

        lobby.request_match(&bob).unwrap();

        let alice_msgs = events(&mut alice_rx);
        let bob_msgs = events(&mut bob_rx);

        match &alice_msgs[0] {
            ServerMsg::MatchFound {
                room_id,
                role,
                opponent,
                player,
                state,
            } => {
                assert_eq!(room_id.to_string(), "room1");
                assert_eq!(*role, Role::Player1);
                assert_eq!(opponent.name, "Bob");
                assert_eq!(player.name, "Alice");
                assert_eq!(state.player1.x, 0.125);
                assert_eq!(state.player1.health, 100);
                assert_eq!(state.player2.health, 100);
            }
            other => panic!("expected match_found, got {:?}", other),
        }
        match &bob_msgs[0] {
            ServerMsg::MatchFound {
                room_id,
                role,
                opponent,
                state,
                ..
            } => {
                assert_eq!(room_id.to_string(), "room1");
                assert_eq!(*role, Role::Player2);
                assert_eq!(opponent.id, alice);
                assert_eq!(state.player2.x, 0.75);
            }
            other => panic!("expected match_found, got {:?}", other),
        }

        let roster = last_roster(&bob_msgs);
        assert!(roster.iter().all(|p| !p.ready && p.room_id.is_some()));
        assert_eq!(lobby.stats().active_rooms, 1);
    }

    #[tokio::test]
    async fn test_request_from_seated_identity_is_ignored() {
        let lobby = lobby();
        let (alice, _alice_rx) = join(&lobby, "Alice");
        let (bob, _bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&bob).unwrap();

        let err = lobby.request_match(&alice).unwrap_err();

        assert!(matches!(err, LobbyError::AlreadyInRoom(..)));
        assert_eq!(lobby.stats().active_rooms, 1);
    }

    #[tokio::test]
    async fn test_input_without_room_is_rejected() {
        let lobby = lobby();
        let (alice, _rx) = join(&lobby, "Alice");

        let err = lobby.submit_input(&alice, Input::default()).unwrap_err();
        assert!(matches!(err, LobbyError::NoActiveRoom(_)));
    }

    #[tokio::test]
    async fn test_disconnect_terminates_room_and_notifies_opponent() {
        let lobby = lobby();
        let (alice, _alice_rx) = join(&lobby, "Alice");
        let (bob, mut bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&bob).unwrap();
        events(&mut bob_rx);

        lobby.disconnect(&alice);
        lobby.disconnect(&alice);

        let msgs = events(&mut bob_rx);
        assert_eq!(msgs[0], ServerMsg::OpponentLeft { identity_id: alice });
        let roster = last_roster(&msgs);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, bob);
        assert_eq!(roster[0].room_id, None);
        assert_eq!(lobby.stats().active_rooms, 0);
        assert!(lobby.identity(&alice).is_none());
    }

    #[tokio::test]
    async fn test_restart_returns_requester_to_unready_pool() {
        let lobby = lobby();
        let (alice, mut alice_rx) = join(&lobby, "Alice");
        let (bob, mut bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&bob).unwrap();
        events(&mut alice_rx);
        events(&mut bob_rx);

        lobby.restart(&bob).unwrap();

        assert_eq!(events(&mut alice_rx)[0], ServerMsg::OpponentLeft { identity_id: bob });
        let bob_state = lobby.identity(&bob).unwrap();
        assert!(!bob_state.ready);
        assert_eq!(bob_state.room, None);
        assert_eq!(lobby.identity(&alice).unwrap().room, None);
        assert_eq!(lobby.stats().active_rooms, 0);

        // Not re-queued automatically; a fresh request waits
        lobby.request_match(&bob).unwrap();
        assert_eq!(events(&mut bob_rx).last(), Some(&ServerMsg::Waiting));
    }

    #[tokio::test]
    async fn test_finished_room_frees_members() {
        let lobby = lobby();
        let (alice, _alice_rx) = join(&lobby, "Alice");
        let (bob, _bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&bob).unwrap();
        let (room_id, _) = lobby.room_members()[0];

        lobby.finish_room(room_id);
        lobby.finish_room(room_id);

        assert_eq!(lobby.identity(&alice).unwrap().room, None);
        assert_eq!(lobby.identity(&bob).unwrap().room, None);
        assert_eq!(lobby.stats().active_rooms, 0);
    }

    #[tokio::test]
    async fn test_room_ids_increase() {
        let lobby = lobby();
        let ids: Vec<Uuid> = (0..4)
            .map(|i| join(&lobby, &format!("P{}", i)).0)
            .collect();

        for id in &ids {
            lobby.request_match(id).unwrap();
        }

        let mut rooms: Vec<String> = lobby
            .room_members()
            .into_iter()
            .map(|(room_id, _)| room_id.to_string())
            .collect();
        rooms.sort();
        assert_eq!(rooms, vec!["room1", "room2"]);
    }

    #[tokio::test]
    async fn test_chat_reaches_everyone() {
        let lobby = lobby();
        let (alice, mut alice_rx) = join(&lobby, "Alice");
        let (_bob, mut bob_rx) = join(&lobby, "Bob");
        events(&mut alice_rx);
        events(&mut bob_rx);

        lobby.chat(&alice, "gl hf".to_string()).unwrap();

        let expected = ServerMsg::ChatMessage {
            sender: "Alice".to_string(),
            text: "gl hf".to_string(),
        };
        assert_eq!(events(&mut alice_rx), vec![expected.clone()]);
        assert_eq!(events(&mut bob_rx), vec![expected]);
    }

    #[tokio::test]
    async fn test_later_waiter_keeps_waiting_after_pairing() {
        let lobby = lobby();
        let (alice, mut alice_rx) = join(&lobby, "Alice");
        let (carol, mut carol_rx) = join(&lobby, "Carol");
        let (bob, mut bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&carol).unwrap();
        events(&mut alice_rx);
        events(&mut carol_rx);
        events(&mut bob_rx);

        lobby.request_match(&bob).unwrap();

        let alice_found = events(&mut alice_rx);
        let bob_found = events(&mut bob_rx);
        assert!(matches!(
            &alice_found[0],
            ServerMsg::MatchFound { role: Role::Player1, opponent, player, .. }
                if opponent.id == bob && player.id == alice
        ));
        assert!(matches!(
            &bob_found[0],
            ServerMsg::MatchFound { role: Role::Player2, opponent, player, .. }
                if opponent.id == alice && player.id == bob
        ));
        assert!(!events(&mut carol_rx)
            .iter()
            .any(|msg| matches!(msg, ServerMsg::MatchFound { .. })));
        assert!(lobby.identity(&carol).unwrap().ready);
        assert_eq!(
            lobby.stats(),
            LobbyStats {
                connected: 3,
                waiting: 1,
                active_rooms: 1
            }
        );
    }

    #[tokio::test]
    async fn test_restart_without_room_clears_ready() {
        let lobby = lobby();
        let (alice, mut alice_rx) = join(&lobby, "Alice");
        lobby.request_match(&alice).unwrap();
        events(&mut alice_rx);

        lobby.restart(&alice).unwrap();

        let msgs = events(&mut alice_rx);
        assert!(!msgs.iter().any(|msg| matches!(msg, ServerMsg::OpponentLeft { .. })));
        let roster = last_roster(&msgs);
        assert_eq!(roster.len(), 1);
        assert!(!roster[0].ready);
        assert_eq!(roster[0].room_id, None);
        assert_eq!(lobby.stats().waiting, 0);
    }

    #[tokio::test]
    async fn test_leaving_a_decided_room_sends_no_opponent_left() {
        let lobby = lobby();
        let (alice, _alice_rx) = join(&lobby, "Alice");
        let (bob, mut bob_rx) = join(&lobby, "Bob");
        lobby.request_match(&alice).unwrap();
        lobby.request_match(&bob).unwrap();
        events(&mut bob_rx);

        // The match was decided before the room task reported back
        let handle = lobby.state.lock().rooms.values().next().cloned().unwrap();
        assert!(handle.terminate(EndReason::Defeat { winner: Role::Player2 }));

        lobby.disconnect(&alice);

        let msgs = events(&mut bob_rx);
        assert!(!msgs.iter().any(|msg| matches!(msg, ServerMsg::OpponentLeft { .. })));
        assert_eq!(lobby.identity(&bob).unwrap().room, None);
        assert_eq!(lobby.stats().active_rooms, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_share_an_opponent() {
        let lobby = lobby();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for i in 0..20 {
            let (id, rx) = join(&lobby, &format!("P{}", i));
            ids.push(id);
            receivers.push(rx);
        }

        let tasks: Vec<_> = ids
            .iter()
            .copied()
            .map(|id| {
                let lobby = lobby.clone();
                tokio::spawn(async move { lobby.request_match(&id) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let rooms = lobby.room_members();
        assert_eq!(rooms.len(), 10);

        let mut seen = HashSet::new();
        for (room_id, members) in rooms {
            assert_ne!(members[0], members[1]);
            for member in members {
                assert!(seen.insert(member), "identity seated twice");
                assert_eq!(lobby.identity(&member).unwrap().room, Some(room_id));
            }
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(lobby.stats().waiting, 0);
    }
}
