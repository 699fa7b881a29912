//! Directory of live rooms and routing of player actions into them
//!
//! The registry is owned by the server loop, which makes every room mutation
//! and every tick strictly sequential. Each operation returns the packets it
//! produced as `Dispatch`es; the network layer only delivers them.

use crate::broadcast::{self, Dispatch};
use crate::config::GameRules;
use crate::error::RoomError;
use crate::room::RoomSession;
use crate::scheduler::{TickRequest, TickScheduler};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Direction, Packet, PlayerId, ROOM_CODE_LEN};
use std::collections::HashMap;
use tokio::sync::mpsc;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

struct RoomEntry {
    session: RoomSession,
    ticker: TickScheduler,
}

pub struct RoomRegistry {
    rooms: HashMap<String, RoomEntry>,
    memberships: HashMap<PlayerId, String>,
    rules: GameRules,
    tick_tx: mpsc::UnboundedSender<TickRequest>,
    next_generation: u64,
    rng: StdRng,
}

impl RoomRegistry {
    pub fn new(rules: GameRules, tick_tx: mpsc::UnboundedSender<TickRequest>) -> Self {
        Self::with_rng(rules, tick_tx, StdRng::from_entropy())
    }

    /// Registry whose room codes and arenas derive from `rng`.
    pub fn with_rng(
        rules: GameRules,
        tick_tx: mpsc::UnboundedSender<TickRequest>,
        rng: StdRng,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            rules,
            tick_tx,
            next_generation: 1,
            rng,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_of(&self, player_id: PlayerId) -> Option<&str> {
        self.memberships.get(&player_id).map(String::as_str)
    }

    pub fn session(&self, room_code: &str) -> Option<&RoomSession> {
        self.rooms
            .get(&normalize_room_code(room_code))
            .map(|entry| &entry.session)
    }

    pub fn is_ticking(&self, room_code: &str) -> bool {
        self.rooms
            .get(&normalize_room_code(room_code))
            .map_or(false, |entry| entry.ticker.is_running())
    }

    pub fn create_room(&mut self, player_id: PlayerId, player_name: String) -> Vec<Dispatch> {
        let mut out = self.leave_room(player_id);

        let code = self.unique_room_code();
        let rng = StdRng::seed_from_u64(self.rng.gen());
        let session = RoomSession::create(
            code.clone(),
            player_id,
            player_name,
            self.rules.clone(),
            rng,
        );

        out.push(Dispatch::to_player(
            player_id,
            Packet::RoomCreated {
                room_code: code.clone(),
            },
        ));
        out.push(Dispatch::to_player(player_id, broadcast::game_grid(&session)));
        out.push(broadcast::game_state(&session, true));

        let ticker = TickScheduler::new(self.rules.tick_period());
        self.rooms.insert(code.clone(), RoomEntry { session, ticker });
        self.memberships.insert(player_id, code);
        out
    }

    pub fn join_room(
        &mut self,
        player_id: PlayerId,
        room_code: &str,
        player_name: String,
    ) -> Vec<Dispatch> {
        let code = normalize_room_code(room_code);

        if self.room_of(player_id) == Some(code.as_str()) {
            let mut out = vec![join_reply(player_id, &code, Ok(()))];
            if let Some(entry) = self.rooms.get(&code) {
                out.push(Dispatch::to_player(
                    player_id,
                    Packet::GameState(broadcast::snapshot(&entry.session, true)),
                ));
            }
            return out;
        }

        let verdict = match self.rooms.get(&code) {
            None => Err(RoomError::RoomNotFound),
            Some(entry) => admission(&entry.session),
        };
        if let Err(err) = verdict {
            debug!("Player {} refused from room {}: {}", player_id, code, err);
            return vec![join_reply(player_id, &code, Err(err))];
        }

        let mut out = self.leave_room(player_id);
        let Some(entry) = self.rooms.get_mut(&code) else {
            out.push(join_reply(player_id, &code, Err(RoomError::RoomNotFound)));
            return out;
        };
        if let Err(err) = entry.session.join(player_id, player_name) {
            out.push(join_reply(player_id, &code, Err(err)));
            return out;
        }
        self.memberships.insert(player_id, code.clone());

        out.push(join_reply(player_id, &code, Ok(())));
        out.push(Dispatch::to_player(
            player_id,
            broadcast::game_grid(&entry.session),
        ));
        out.push(broadcast::player_joined(&entry.session, player_id));
        out.push(broadcast::game_state(&entry.session, false));
        out
    }

    pub fn start_game(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        let Some(code) = self.memberships.get(&player_id).cloned() else {
            return vec![error_reply(player_id, RoomError::NotInRoom)];
        };
        let Some(entry) = self.rooms.get_mut(&code) else {
            return vec![error_reply(player_id, RoomError::NotInRoom)];
        };

        if let Err(err) = entry.session.start() {
            return vec![error_reply(player_id, err)];
        }

        if !entry.ticker.is_running() {
            let generation = self.next_generation;
            self.next_generation += 1;
            entry
                .ticker
                .start(code.clone(), generation, self.tick_tx.clone());
        }
        vec![broadcast::game_state(&entry.session, false)]
    }

    pub fn move_player(&mut self, player_id: PlayerId, direction: Direction) -> Vec<Dispatch> {
        let Some(entry) = self.entry_of(player_id) else {
            return Vec::new();
        };
        if !entry.session.move_player(player_id, direction) {
            return Vec::new();
        }
        vec![broadcast::game_state(&entry.session, false)]
    }

    pub fn place_bomb(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        let Some(entry) = self.entry_of(player_id) else {
            return Vec::new();
        };
        if !entry.session.place_bomb(player_id) {
            return Vec::new();
        }
        vec![broadcast::game_state(&entry.session, false)]
    }

    pub fn reset_game(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        let Some(entry) = self.entry_of(player_id) else {
            return Vec::new();
        };
        entry.ticker.stop();
        entry.session.reset();

        vec![
            Dispatch::to_room(&entry.session, broadcast::game_grid(&entry.session)),
            broadcast::game_state(&entry.session, true),
        ]
    }

    /// Removes a player from whatever room they are in. The last player out
    /// deletes the room and its tick task.
    pub fn leave_room(&mut self, player_id: PlayerId) -> Vec<Dispatch> {
        let Some(code) = self.memberships.remove(&player_id) else {
            return Vec::new();
        };
        let Some(entry) = self.rooms.get_mut(&code) else {
            warn!("Player {} was mapped to missing room {}", player_id, code);
            return Vec::new();
        };

        entry.session.leave(player_id);

        if entry.session.is_empty() {
            entry.ticker.stop();
            self.rooms.remove(&code);
            info!("Room {} deleted", code);
            return Vec::new();
        }

        if !entry.session.is_running() {
            entry.ticker.stop();
        }
        vec![
            broadcast::player_left(&entry.session, player_id),
            broadcast::game_state(&entry.session, false),
        ]
    }

    /// Runs one tick for the requesting room and broadcasts the result.
    ///
    /// Requests for deleted rooms or from a stopped scheduler are dropped.
    pub fn tick(&mut self, request: &TickRequest) -> Vec<Dispatch> {
        let Some(entry) = self.rooms.get_mut(&request.room_code) else {
            return Vec::new();
        };
        if !entry.ticker.accepts(request.generation) {
            debug!(
                "Dropping stale tick {} for room {}",
                request.generation, request.room_code
            );
            return Vec::new();
        }

        entry.session.tick();
        let out = vec![broadcast::game_state(&entry.session, false)];

        if !entry.session.is_running() {
            entry.ticker.stop();
            debug!("Tick loop stopped for room {}", request.room_code);
        }
        out
    }

    fn entry_of(&mut self, player_id: PlayerId) -> Option<&mut RoomEntry> {
        let code = self.memberships.get(&player_id)?;
        self.rooms.get_mut(code)
    }

    fn unique_room_code(&mut self) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| {
                    let index = self.rng.gen_range(0..ROOM_CODE_ALPHABET.len());
                    ROOM_CODE_ALPHABET[index] as char
                })
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

/// Room codes are matched case-insensitively.
pub fn normalize_room_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

fn admission(session: &RoomSession) -> Result<(), RoomError> {
    if session.player_count() >= shared::MAX_PLAYERS {
        return Err(RoomError::RoomFull);
    }
    if session.model().game_started {
        return Err(RoomError::GameInProgress);
    }
    Ok(())
}

fn join_reply(player_id: PlayerId, room_code: &str, result: Result<(), RoomError>) -> Dispatch {
    Dispatch::to_player(
        player_id,
        Packet::RoomJoined {
            room_code: room_code.to_string(),
            success: result.is_ok(),
            message: result.err().map(|err| err.to_string()),
        },
    )
}

fn error_reply(player_id: PlayerId, err: RoomError) -> Dispatch {
    Dispatch::to_player(
        player_id,
        Packet::Error {
            message: err.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Position;

    fn registry() -> (RoomRegistry, mpsc::UnboundedReceiver<TickRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = RoomRegistry::with_rng(GameRules::default(), tx, StdRng::seed_from_u64(99));
        (registry, rx)
    }

    fn created_code(out: &[Dispatch]) -> String {
        out.iter()
            .find_map(|d| match &d.packet {
                Packet::RoomCreated { room_code } => Some(room_code.clone()),
                _ => None,
            })
            .expect("no RoomCreated packet")
    }

    fn join_result(out: &[Dispatch]) -> (bool, Option<String>) {
        out.iter()
            .find_map(|d| match &d.packet {
                Packet::RoomJoined {
                    success, message, ..
                } => Some((*success, message.clone())),
                _ => None,
            })
            .expect("no RoomJoined packet")
    }

    #[test]
    fn test_create_room_replies_and_registers() {
        let (mut registry, _rx) = registry();
        let out = registry.create_room(1, "Ada".into());

        let code = created_code(&out);
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(registry.room_of(1), Some(code.as_str()));
        assert_eq!(registry.room_count(), 1);
        assert!(out
            .iter()
            .any(|d| matches!(d.packet, Packet::GameGrid { .. })));
        assert!(out.iter().any(|d| matches!(
            &d.packet,
            Packet::GameState(snap) if snap.grid.is_some()
        )));
    }

    #[test]
    fn test_room_codes_are_unique() {
        let (mut registry, _rx) = registry();
        let mut codes = std::collections::HashSet::new();
        for id in 1..=50 {
            codes.insert(created_code(&registry.create_room(id, format!("p{}", id))));
        }
        assert_eq!(codes.len(), 50);
        assert_eq!(registry.room_count(), 50);
    }

    #[test]
    fn test_join_is_case_insensitive_and_broadcasts() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "Ada".into()));

        let out = registry.join_room(2, &code.to_lowercase(), "Bo".into());

        assert_eq!(join_result(&out), (true, None));
        let joined = out
            .iter()
            .find(|d| matches!(d.packet, Packet::PlayerJoined { .. }))
            .unwrap();
        assert_eq!(joined.recipients, vec![1, 2]);
        assert_eq!(registry.session(&code).unwrap().player_count(), 2);
    }

    #[test]
    fn test_join_failures() {
        let (mut registry, _rx) = registry();
        let out = registry.join_room(9, "NOPE00", "x".into());
        assert_eq!(join_result(&out), (false, Some("Room not found".into())));

        let code = created_code(&registry.create_room(1, "a".into()));
        for id in 2..=4 {
            registry.join_room(id, &code, format!("p{}", id));
        }
        let out = registry.join_room(5, &code, "e".into());
        assert_eq!(join_result(&out), (false, Some("Room is full".into())));
        assert_eq!(registry.room_of(5), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_refused_while_game_in_progress() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);

        let out = registry.join_room(3, &code, "c".into());
        assert_eq!(
            join_result(&out),
            (false, Some("Game already started".into()))
        );
    }

    #[test]
    fn test_failed_join_keeps_previous_room() {
        let (mut registry, _rx) = registry();
        let home = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(1, "MISSING", "a".into());
        assert_eq!(registry.room_of(1), Some(home.as_str()));
    }

    #[test]
    fn test_start_needs_two_players() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));

        let out = registry.start_game(1);
        match &out[0].packet {
            Packet::Error { message } => assert_eq!(message, "Need at least 2 players to start"),
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(!registry.is_ticking(&code));
    }

    #[test]
    fn test_start_without_room() {
        let (mut registry, _rx) = registry();
        let out = registry.start_game(42);
        assert!(matches!(&out[0].packet, Packet::Error { message } if message == "Not in a room"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_spawns_one_ticker() {
        let (mut registry, mut rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());

        let out = registry.start_game(1);
        assert!(matches!(&out[0].packet, Packet::GameState(s) if s.game_started));
        assert!(registry.is_ticking(&code));

        registry.start_game(2);
        let request = rx.recv().await.unwrap();
        assert_eq!(request.room_code, code);
        assert_eq!(request.generation, 1);

        let out = registry.tick(&request);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_route_to_players_room() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);

        let out = registry.move_player(1, Direction::Right);
        match &out[0].packet {
            Packet::GameState(snap) => {
                assert_eq!(snap.players[&1].position, Position::new(2, 1));
            }
            other => panic!("Unexpected packet {:?}", other),
        }

        // Illegal move: no broadcast.
        assert!(registry.move_player(1, Direction::Up).is_empty());

        assert_eq!(registry.place_bomb(1).len(), 1);
        assert!(registry.place_bomb(1).is_empty());

        // Outsiders do nothing.
        assert!(registry.move_player(77, Direction::Left).is_empty());
        assert!(registry.place_bomb(77).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_ticker_and_resends_grid() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);

        let out = registry.reset_game(2);
        assert!(!registry.is_ticking(&code));
        assert!(matches!(out[0].packet, Packet::GameGrid { .. }));
        assert_eq!(out[0].recipients, vec![1, 2]);
        assert!(matches!(
            &out[1].packet,
            Packet::GameState(s) if !s.game_started && s.grid.is_some()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_ticks_are_dropped() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);
        registry.reset_game(1);
        registry.start_game(1);

        let stale = TickRequest {
            room_code: code.clone(),
            generation: 1,
        };
        assert!(registry.tick(&stale).is_empty());

        let current = TickRequest {
            room_code: code,
            generation: 2,
        };
        assert_eq!(registry.tick(&current).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_leave_deletes_room_and_ticker() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);

        let out = registry.leave_room(2);
        assert!(matches!(out[0].packet, Packet::PlayerLeft { player_id: 2, .. }));
        match &out[1].packet {
            Packet::GameState(snap) => {
                assert!(snap.game_over);
                assert_eq!(snap.winner, Some(1));
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        assert!(!registry.is_ticking(&code));

        assert!(registry.leave_room(1).is_empty());
        assert_eq!(registry.room_count(), 0);
        assert!(registry.session(&code).is_none());
        assert!(registry
            .tick(&TickRequest {
                room_code: code,
                generation: 1
            })
            .is_empty());
    }

    #[test]
    fn test_switching_rooms_leaves_the_old_one() {
        let (mut registry, _rx) = registry();
        let first = created_code(&registry.create_room(1, "a".into()));
        let second = created_code(&registry.create_room(2, "b".into()));

        registry.join_room(1, &second, "a".into());

        assert_eq!(registry.room_of(1), Some(second.as_str()));
        assert!(registry.session(&first).is_none());
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_rejoining_current_room_is_a_resync() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));

        let out = registry.join_room(1, &code, "a".into());
        assert_eq!(join_result(&out), (true, None));
        assert_eq!(registry.session(&code).unwrap().player_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_heartbeat_until_game_over() {
        let (mut registry, _rx) = registry();
        let code = created_code(&registry.create_room(1, "a".into()));
        registry.join_room(2, &code, "b".into());
        registry.start_game(1);
        let request = TickRequest {
            room_code: code.clone(),
            generation: 1,
        };

        // Nothing happens, but every tick still broadcasts.
        for _ in 0..3 {
            let out = registry.tick(&request);
            assert!(matches!(&out[0].packet, Packet::GameState(s) if !s.game_over));
        }
        assert!(registry.is_ticking(&code));
    }
}
