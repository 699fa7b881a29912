use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CLIENT_VERSION: u32 = 1;
pub const MAX_PACKET_SIZE: usize = 8192;

pub const GRID_SIZE: usize = 13;
pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS_TO_START: usize = 2;
pub const MAX_NAME_LEN: usize = 16;
pub const ROOM_CODE_LEN: usize = 6;

pub const TICK_INTERVAL_MS: u32 = 100;
pub const BOMB_FUSE_MS: u32 = 3000;
pub const EXPLOSION_DURATION_MS: u32 = 500;
pub const DEFAULT_EXPLOSION_RANGE: u32 = 2;
pub const DEFAULT_MAX_BOMBS: u32 = 1;
pub const DESTRUCTIBLE_CHANCE: f64 = 0.3;
pub const POWER_UP_CHANCE: f64 = 0.3;
pub const SCORE_PER_WALL: u32 = 10;

/// Connection-scoped player identity handed out by the server.
pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    CreateRoom {
        player_name: String,
    },
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    StartGame,
    MovePlayer {
        direction: Direction,
    },
    PlaceBomb,
    ResetGame,
    LeaveRoom,
    Disconnect,

    Connected {
        client_id: PlayerId,
    },
    Disconnected {
        reason: String,
    },
    RoomCreated {
        room_code: String,
    },
    RoomJoined {
        room_code: String,
        success: bool,
        message: Option<String>,
    },
    PlayerJoined {
        player_id: PlayerId,
        players: HashMap<PlayerId, PlayerState>,
    },
    PlayerLeft {
        player_id: PlayerId,
        players: HashMap<PlayerId, PlayerState>,
    },
    GameGrid {
        grid: Grid,
    },
    GameState(GameSnapshot),
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction, distance: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit offset in grid coordinates; y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Wall,
    Destructible,
}

/// Square cell matrix, indexed `cells[y][x]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Vec<Cell>>,
}

impl Grid {
    /// An empty arena enclosed by a wall border.
    pub fn bordered(size: usize) -> Self {
        let mut cells = vec![vec![Cell::Empty; size]; size];
        for i in 0..size {
            cells[0][i] = Cell::Wall;
            cells[size - 1][i] = Cell::Wall;
            cells[i][0] = Cell::Wall;
            cells[i][size - 1] = Cell::Wall;
        }
        Self { cells }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        let size = self.size() as i32;
        pos.x >= 0 && pos.y >= 0 && pos.x < size && pos.y < size
    }

    /// True for cells a player may ever stand on: `1..=size-2` on both axes.
    pub fn is_interior(&self, pos: Position) -> bool {
        let max = self.size() as i32 - 2;
        pos.x >= 1 && pos.y >= 1 && pos.x <= max && pos.y <= max
    }

    pub fn get(&self, pos: Position) -> Option<Cell> {
        if !self.contains(pos) {
            return None;
        }
        Some(self.cells[pos.y as usize][pos.x as usize])
    }

    /// Overwrites a cell. Returns false when `pos` lies outside the grid.
    pub fn set(&mut self, pos: Position, cell: Cell) -> bool {
        if !self.contains(pos) {
            return false;
        }
        self.cells[pos.y as usize][pos.x as usize] = cell;
        true
    }

    /// Destructible cells in row-major order.
    pub fn destructible_cells(&self) -> Vec<Position> {
        let mut out = Vec::new();
        for (y, row) in self.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if *cell == Cell::Destructible {
                    out.push(Position::new(x as i32, y as i32));
                }
            }
        }
        out
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
}

impl PlayerColor {
    pub fn for_slot(slot: usize) -> Self {
        match slot % 4 {
            0 => PlayerColor::Red,
            1 => PlayerColor::Blue,
            2 => PlayerColor::Green,
            _ => PlayerColor::Yellow,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PowerUpKind {
    RangeBoost,
    BombCapacity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    pub alive: bool,
    pub color: PlayerColor,
    pub slot: usize,
    pub score: u32,
    /// Bombs this player currently has on the field.
    pub bomb_count: u32,
    pub explosion_range: u32,
    pub max_bombs: u32,
}

impl PlayerState {
    pub fn new(id: PlayerId, name: String, slot: usize, spawn: Position) -> Self {
        Self {
            id,
            name,
            position: spawn,
            alive: true,
            color: PlayerColor::for_slot(slot),
            slot,
            score: 0,
            bomb_count: 0,
            explosion_range: DEFAULT_EXPLOSION_RANGE,
            max_bombs: DEFAULT_MAX_BOMBS,
        }
    }

    /// Restores the per-game stats; position is left alone.
    pub fn reset_stats(&mut self, explosion_range: u32, max_bombs: u32) {
        self.alive = true;
        self.score = 0;
        self.bomb_count = 0;
        self.explosion_range = explosion_range.max(1);
        self.max_bombs = max_bombs.max(1);
    }

    pub fn can_place_bomb(&self) -> bool {
        self.alive && self.bomb_count < self.max_bombs
    }

    pub fn apply_power_up(&mut self, kind: PowerUpKind) {
        match kind {
            PowerUpKind::RangeBoost => self.explosion_range += 1,
            PowerUpKind::BombCapacity => self.max_bombs += 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Bomb {
    pub id: u32,
    pub position: Position,
    /// Remaining fuse in milliseconds.
    pub timer: u32,
    pub owner: PlayerId,
    pub range: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Explosion {
    pub id: u32,
    pub position: Position,
    pub timer: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PowerUp {
    pub id: u32,
    pub position: Position,
    pub kind: PowerUpKind,
}

/// Full observable state of one room.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameSnapshot {
    pub players: HashMap<PlayerId, PlayerState>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub power_ups: Vec<PowerUp>,
    pub destructible_walls: Vec<Position>,
    /// Present on creation, reset and other full syncs.
    pub grid: Option<Grid>,
    pub game_started: bool,
    pub game_over: bool,
    pub winner: Option<PlayerId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_step() {
        let origin = Position::new(5, 5);
        assert_eq!(origin.step(Direction::Up, 1), Position::new(5, 4));
        assert_eq!(origin.step(Direction::Down, 2), Position::new(5, 7));
        assert_eq!(origin.step(Direction::Left, 3), Position::new(2, 5));
        assert_eq!(origin.step(Direction::Right, 0), origin);
    }

    #[test]
    fn test_direction_deltas_are_unit_vectors() {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            assert_eq!(dx.abs() + dy.abs(), 1);
        }
    }

    #[test]
    fn test_bordered_grid() {
        let grid = Grid::bordered(GRID_SIZE);
        assert_eq!(grid.size(), GRID_SIZE);
        assert_eq!(grid.get(Position::new(0, 0)), Some(Cell::Wall));
        assert_eq!(grid.get(Position::new(12, 6)), Some(Cell::Wall));
        assert_eq!(grid.get(Position::new(6, 6)), Some(Cell::Empty));
        assert_eq!(grid.get(Position::new(-1, 6)), None);
        assert_eq!(grid.get(Position::new(6, 13)), None);
        assert!(grid.destructible_cells().is_empty());
    }

    #[test]
    fn test_grid_interior_bounds() {
        let grid = Grid::bordered(GRID_SIZE);
        assert!(grid.is_interior(Position::new(1, 1)));
        assert!(grid.is_interior(Position::new(11, 11)));
        assert!(!grid.is_interior(Position::new(0, 5)));
        assert!(!grid.is_interior(Position::new(12, 5)));
    }

    #[test]
    fn test_grid_set_and_destructible_listing() {
        let mut grid = Grid::bordered(GRID_SIZE);
        assert!(grid.set(Position::new(3, 1), Cell::Destructible));
        assert!(grid.set(Position::new(1, 3), Cell::Destructible));
        assert!(!grid.set(Position::new(20, 1), Cell::Destructible));

        assert_eq!(
            grid.destructible_cells(),
            vec![Position::new(3, 1), Position::new(1, 3)]
        );
    }

    #[test]
    fn test_player_creation() {
        let player = PlayerState::new(7, "Ada".to_string(), 1, Position::new(11, 11));
        assert_eq!(player.id, 7);
        assert_eq!(player.color, PlayerColor::Blue);
        assert!(player.alive);
        assert_eq!(player.explosion_range, DEFAULT_EXPLOSION_RANGE);
        assert_eq!(player.max_bombs, DEFAULT_MAX_BOMBS);
        assert!(player.can_place_bomb());
    }

    #[test]
    fn test_player_power_ups_and_reset() {
        let mut player = PlayerState::new(1, "Bo".to_string(), 0, Position::new(1, 1));
        player.apply_power_up(PowerUpKind::RangeBoost);
        player.apply_power_up(PowerUpKind::BombCapacity);
        player.bomb_count = 2;
        player.score = 40;
        player.alive = false;
        assert_eq!(player.explosion_range, DEFAULT_EXPLOSION_RANGE + 1);
        assert_eq!(player.max_bombs, DEFAULT_MAX_BOMBS + 1);
        assert!(!player.can_place_bomb());

        player.reset_stats(DEFAULT_EXPLOSION_RANGE, DEFAULT_MAX_BOMBS);
        assert!(player.alive);
        assert_eq!(player.score, 0);
        assert_eq!(player.bomb_count, 0);
        assert_eq!(player.explosion_range, DEFAULT_EXPLOSION_RANGE);
        assert_eq!(player.max_bombs, DEFAULT_MAX_BOMBS);
    }

    #[test]
    fn test_reset_stats_keeps_minimums() {
        let mut player = PlayerState::new(1, "Cy".to_string(), 0, Position::new(1, 1));
        player.reset_stats(0, 0);
        assert_eq!(player.explosion_range, 1);
        assert_eq!(player.max_bombs, 1);
    }

    #[test]
    fn test_packet_serialization_join_room() {
        let packet = Packet::JoinRoom {
            room_code: "ABC123".to_string(),
            player_name: "Dee".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::JoinRoom {
                room_code,
                player_name,
            } => {
                assert_eq!(room_code, "ABC123");
                assert_eq!(player_name, "Dee");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_game_state() {
        let mut players = HashMap::new();
        players.insert(
            1,
            PlayerState::new(1, "Eve".to_string(), 0, Position::new(1, 1)),
        );

        let snapshot = GameSnapshot {
            players,
            bombs: vec![Bomb {
                id: 1,
                position: Position::new(2, 1),
                timer: BOMB_FUSE_MS,
                owner: 1,
                range: 2,
            }],
            explosions: vec![],
            power_ups: vec![PowerUp {
                id: 1,
                position: Position::new(3, 1),
                kind: PowerUpKind::RangeBoost,
            }],
            destructible_walls: vec![Position::new(5, 1)],
            grid: Some(Grid::bordered(GRID_SIZE)),
            game_started: true,
            game_over: false,
            winner: None,
        };

        let serialized = bincode::serialize(&Packet::GameState(snapshot.clone())).unwrap();
        assert!(serialized.len() < MAX_PACKET_SIZE);

        match bincode::deserialize::<Packet>(&serialized).unwrap() {
            Packet::GameState(decoded) => assert_eq!(decoded, snapshot),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
