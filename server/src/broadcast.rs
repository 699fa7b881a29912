//! Turns room state into outbound packets

use crate::room::RoomSession;
use shared::{GameSnapshot, Packet, PlayerId, PlayerState};
use std::collections::HashMap;

/// A packet and the players it is addressed to.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipients: Vec<PlayerId>,
    pub packet: Packet,
}

impl Dispatch {
    pub fn to_player(player_id: PlayerId, packet: Packet) -> Self {
        Self {
            recipients: vec![player_id],
            packet,
        }
    }

    pub fn to_room(session: &RoomSession, packet: Packet) -> Self {
        Self {
            recipients: session.player_ids(),
            packet,
        }
    }
}

pub fn players(session: &RoomSession) -> HashMap<PlayerId, PlayerState> {
    session
        .model()
        .players
        .iter()
        .map(|(id, player)| (*id, player.clone()))
        .collect()
}

/// Full observable state of a room. The grid matrix is only attached when
/// the layout is new to the receivers.
pub fn snapshot(session: &RoomSession, include_grid: bool) -> GameSnapshot {
    let model = session.model();
    GameSnapshot {
        players: players(session),
        bombs: model.bombs.clone(),
        explosions: model.explosions.clone(),
        power_ups: model.power_ups.clone(),
        destructible_walls: model.grid.destructible_cells(),
        grid: include_grid.then(|| model.grid.clone()),
        game_started: model.game_started,
        game_over: model.game_over,
        winner: model.winner,
    }
}

pub fn game_state(session: &RoomSession, include_grid: bool) -> Dispatch {
    Dispatch::to_room(session, Packet::GameState(snapshot(session, include_grid)))
}

pub fn game_grid(session: &RoomSession) -> Packet {
    Packet::GameGrid {
        grid: session.grid().clone(),
    }
}

pub fn player_joined(session: &RoomSession, player_id: PlayerId) -> Dispatch {
    Dispatch::to_room(
        session,
        Packet::PlayerJoined {
            player_id,
            players: players(session),
        },
    )
}

pub fn player_left(session: &RoomSession, player_id: PlayerId) -> Dispatch {
    Dispatch::to_room(
        session,
        Packet::PlayerLeft {
            player_id,
            players: players(session),
        },
    )
}
