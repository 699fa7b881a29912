//! Mutable world state for one room

use shared::{Bomb, Explosion, Grid, PlayerId, PlayerState, Position, PowerUp};
use std::collections::BTreeMap;

/// Everything a room simulates.
///
/// Owned by exactly one `RoomSession`; entity ids are allocated
/// monotonically per kind and never reused within a room.
#[derive(Debug, Clone)]
pub struct EntityModel {
    pub grid: Grid,
    pub players: BTreeMap<PlayerId, PlayerState>,
    /// Live bombs in placement order.
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub power_ups: Vec<PowerUp>,
    pub game_started: bool,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    next_bomb_id: u32,
    next_explosion_id: u32,
    next_power_up_id: u32,
}

impl EntityModel {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            players: BTreeMap::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            power_ups: Vec::new(),
            game_started: false,
            game_over: false,
            winner: None,
            next_bomb_id: 1,
            next_explosion_id: 1,
            next_power_up_id: 1,
        }
    }

    pub fn alloc_bomb_id(&mut self) -> u32 {
        let id = self.next_bomb_id;
        self.next_bomb_id += 1;
        id
    }

    pub fn alloc_explosion_id(&mut self) -> u32 {
        let id = self.next_explosion_id;
        self.next_explosion_id += 1;
        id
    }

    pub fn alloc_power_up_id(&mut self) -> u32 {
        let id = self.next_power_up_id;
        self.next_power_up_id += 1;
        id
    }

    /// True while actions and ticks have an effect.
    pub fn is_running(&self) -> bool {
        self.game_started && !self.game_over
    }

    pub fn bomb_at(&self, pos: Position) -> Option<&Bomb> {
        self.bombs.iter().find(|bomb| bomb.position == pos)
    }

    pub fn power_up_index_at(&self, pos: Position) -> Option<usize> {
        self.power_ups.iter().position(|p| p.position == pos)
    }

    /// An alive player other than `except` standing on `pos`.
    pub fn alive_player_at(&self, pos: Position, except: PlayerId) -> Option<PlayerId> {
        self.players
            .values()
            .find(|p| p.id != except && p.alive && p.position == pos)
            .map(|p| p.id)
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Ends a started game once at most one player is alive.
    ///
    /// Returns true only on the transition into game over.
    pub fn evaluate_win_condition(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        if self.alive_count() > 1 {
            return false;
        }

        self.game_over = true;
        self.winner = self.players.values().find(|p| p.alive).map(|p| p.id);
        true
    }

    /// Drops every bomb, explosion and power-up.
    pub fn clear_entities(&mut self) {
        self.bombs.clear();
        self.explosions.clear();
        self.power_ups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::GRID_SIZE;

    fn model_with_players(count: u32) -> EntityModel {
        let mut model = EntityModel::new(Grid::bordered(GRID_SIZE));
        for id in 1..=count {
            let slot = (id - 1) as usize;
            model.players.insert(
                id,
                PlayerState::new(id, format!("p{}", id), slot, Position::new(id as i32, 1)),
            );
        }
        model
    }

    #[test]
    fn test_ids_are_monotonic_per_kind() {
        let mut model = EntityModel::new(Grid::bordered(GRID_SIZE));
        assert_eq!(model.alloc_bomb_id(), 1);
        assert_eq!(model.alloc_bomb_id(), 2);
        assert_eq!(model.alloc_explosion_id(), 1);
        assert_eq!(model.alloc_power_up_id(), 1);
        assert_eq!(model.alloc_explosion_id(), 2);

        model.clear_entities();
        assert_eq!(model.alloc_bomb_id(), 3);
    }

    #[test]
    fn test_win_condition_requires_started_game() {
        let mut model = model_with_players(2);
        model.players.get_mut(&2).unwrap().alive = false;
        assert!(!model.evaluate_win_condition());
        assert!(!model.game_over);
    }

    #[test]
    fn test_win_condition_single_survivor() {
        let mut model = model_with_players(3);
        model.game_started = true;
        model.players.get_mut(&1).unwrap().alive = false;
        assert_eq!(model.alive_count(), 2);
        assert!(!model.evaluate_win_condition());

        model.players.get_mut(&3).unwrap().alive = false;
        assert!(model.evaluate_win_condition());
        assert!(model.game_over);
        assert_eq!(model.winner, Some(2));

        // Already over: no second transition.
        assert!(!model.evaluate_win_condition());
    }

    #[test]
    fn test_win_condition_nobody_left() {
        let mut model = model_with_players(2);
        model.game_started = true;
        for player in model.players.values_mut() {
            player.alive = false;
        }
        assert!(model.evaluate_win_condition());
        assert_eq!(model.winner, None);
    }

    #[test]
    fn test_alive_player_lookup_skips_dead_and_self() {
        let mut model = model_with_players(2);
        let pos = Position::new(2, 1);
        assert_eq!(model.alive_player_at(pos, 1), Some(2));
        assert_eq!(model.alive_player_at(pos, 2), None);

        model.players.get_mut(&2).unwrap().alive = false;
        assert_eq!(model.alive_player_at(pos, 1), None);
    }
}
