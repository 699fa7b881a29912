//! One room: membership, validated player actions and the game lifecycle

use crate::config::GameRules;
use crate::error::RoomError;
use crate::grid;
use crate::model::EntityModel;
use crate::simulation::{self, TickReport};
use log::{debug, info};
use rand::rngs::StdRng;
use shared::{Bomb, Cell, Direction, Grid, PlayerId, PlayerState, MAX_PLAYERS, MIN_PLAYERS_TO_START};

/// Sole owner and mutator of a room's `EntityModel`.
///
/// Lifecycle calls report refusals as `RoomError`. Per-tick actions
/// (`move_player`, `place_bomb`) never fail: an illegal action is dropped and
/// the return value only says whether anything changed.
pub struct RoomSession {
    code: String,
    model: EntityModel,
    rules: GameRules,
    rng: StdRng,
}

impl RoomSession {
    /// Opens a room with a fresh arena and the host in spawn slot 0.
    pub fn create(
        code: String,
        host_id: PlayerId,
        host_name: String,
        rules: GameRules,
        mut rng: StdRng,
    ) -> Self {
        let grid = fresh_grid(&rules, &mut rng);
        let mut model = EntityModel::new(grid);
        let spawn = grid::spawn_position(0, rules.grid_size);
        let mut host = PlayerState::new(host_id, host_name, 0, spawn);
        host.reset_stats(rules.initial_explosion_range, rules.initial_max_bombs);
        model.players.insert(host_id, host);

        info!("Room {} created by player {}", code, host_id);
        Self {
            code,
            model,
            rules,
            rng,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn model(&self) -> &EntityModel {
        &self.model
    }

    pub fn grid(&self) -> &Grid {
        &self.model.grid
    }

    pub fn is_running(&self) -> bool {
        self.model.is_running()
    }

    pub fn player_count(&self) -> usize {
        self.model.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model.players.is_empty()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.model.players.keys().copied().collect()
    }

    /// Admits a player into the lowest free spawn slot.
    pub fn join(&mut self, player_id: PlayerId, name: String) -> Result<&PlayerState, RoomError> {
        if self.model.players.len() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }
        if self.model.game_started {
            return Err(RoomError::GameInProgress);
        }

        let slot = (0..MAX_PLAYERS)
            .find(|slot| self.model.players.values().all(|p| p.slot != *slot))
            .ok_or(RoomError::RoomFull)?;
        let spawn = grid::spawn_position(slot, self.rules.grid_size);
        let mut player = PlayerState::new(player_id, name, slot, spawn);
        player.reset_stats(
            self.rules.initial_explosion_range,
            self.rules.initial_max_bombs,
        );

        info!(
            "Player {} joined room {} in slot {}",
            player_id, self.code, slot
        );
        Ok(self.model.players.entry(player_id).or_insert(player))
    }

    /// Removes a player. Ends a running game when at most one player is left
    /// alive. Returns false if the player was not in the room.
    pub fn leave(&mut self, player_id: PlayerId) -> bool {
        let Some(player) = self.model.players.remove(&player_id) else {
            return false;
        };
        info!("Player {} ({}) left room {}", player_id, player.name, self.code);

        if self.model.evaluate_win_condition() {
            info!(
                "Game in room {} ended after a departure, winner: {:?}",
                self.code, self.model.winner
            );
        }
        true
    }

    pub fn start(&mut self) -> Result<(), RoomError> {
        if self.model.players.len() < MIN_PLAYERS_TO_START {
            return Err(RoomError::InsufficientPlayers);
        }

        // Leftover bombs would otherwise detonate against fresh bomb counts.
        self.model.clear_entities();
        for player in self.model.players.values_mut() {
            player.position = grid::spawn_position(player.slot, self.rules.grid_size);
            player.reset_stats(
                self.rules.initial_explosion_range,
                self.rules.initial_max_bombs,
            );
        }
        self.model.game_started = true;
        self.model.game_over = false;
        self.model.winner = None;

        info!(
            "Game started in room {} with {} players",
            self.code,
            self.model.players.len()
        );
        Ok(())
    }

    /// New arena, no entities, everyone back on their own spawn slot.
    pub fn reset(&mut self) {
        self.model.grid = fresh_grid(&self.rules, &mut self.rng);
        self.model.clear_entities();
        for player in self.model.players.values_mut() {
            player.position = grid::spawn_position(player.slot, self.rules.grid_size);
            player.reset_stats(
                self.rules.initial_explosion_range,
                self.rules.initial_max_bombs,
            );
        }
        self.model.game_started = false;
        self.model.game_over = false;
        self.model.winner = None;

        info!("Room {} reset", self.code);
    }

    /// Moves a player one cell, collecting any power-up on the target.
    pub fn move_player(&mut self, player_id: PlayerId, direction: Direction) -> bool {
        if !self.model.is_running() {
            return false;
        }
        let Some(player) = self.model.players.get(&player_id) else {
            return false;
        };
        if !player.alive {
            return false;
        }

        let target = player.position.step(direction, 1);
        if !self.model.grid.is_interior(target) {
            return false;
        }
        if matches!(
            self.model.grid.get(target),
            Some(Cell::Wall) | Some(Cell::Destructible) | None
        ) {
            return false;
        }
        if self.model.bomb_at(target).is_some() {
            return false;
        }
        if self.model.alive_player_at(target, player_id).is_some() {
            return false;
        }

        let collected = self
            .model
            .power_up_index_at(target)
            .map(|index| self.model.power_ups.remove(index));

        let Some(player) = self.model.players.get_mut(&player_id) else {
            return false;
        };
        player.position = target;
        if let Some(power_up) = collected {
            player.apply_power_up(power_up.kind);
            debug!(
                "Player {} collected {:?} in room {}",
                player_id, power_up.kind, self.code
            );
        }
        true
    }

    /// Drops a bomb on the player's cell with their current range.
    pub fn place_bomb(&mut self, player_id: PlayerId) -> bool {
        if !self.model.is_running() {
            return false;
        }
        let Some(player) = self.model.players.get(&player_id) else {
            return false;
        };
        if !player.can_place_bomb() {
            return false;
        }
        let position = player.position;
        let range = player.explosion_range;
        if self.model.bomb_at(position).is_some() {
            return false;
        }

        let id = self.model.alloc_bomb_id();
        self.model.bombs.push(Bomb {
            id,
            position,
            timer: self.rules.bomb_fuse_ms,
            owner: player_id,
            range,
        });
        if let Some(player) = self.model.players.get_mut(&player_id) {
            player.bomb_count += 1;
        }

        debug!(
            "Player {} placed bomb {} at ({}, {}) in room {}",
            player_id, id, position.x, position.y, self.code
        );
        true
    }

    /// Runs one simulation step; a stopped game does not advance.
    pub fn tick(&mut self) -> TickReport {
        if !self.model.is_running() {
            return TickReport::default();
        }

        let report = simulation::step(&mut self.model, &self.rules, &mut self.rng);
        if report.game_ended {
            info!(
                "Game over in room {}, winner: {:?}",
                self.code, self.model.winner
            );
        }
        report
    }
}

fn fresh_grid(rules: &GameRules, rng: &mut StdRng) -> Grid {
    let reserved = grid::spawn_reservations(rules.grid_size);
    let (grid, _) = grid::generate(
        rules.grid_size,
        &reserved,
        rules.destructible_chance,
        rng,
    );
    grid
}
