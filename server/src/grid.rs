//! Arena layout: structural walls, spawn slots and destructible scatter

use rand::Rng;
use shared::{Cell, Grid, Position, MAX_PLAYERS};
use std::collections::HashSet;

/// Starting cell for a spawn slot, one per grid corner.
///
/// Slots are handed out in join order: top-left, bottom-right, bottom-left,
/// top-right.
pub fn spawn_position(slot: usize, size: usize) -> Position {
    let far = size as i32 - 2;
    match slot % MAX_PLAYERS {
        0 => Position::new(1, 1),
        1 => Position::new(far, far),
        2 => Position::new(1, far),
        _ => Position::new(far, 1),
    }
}

/// The spawn cell plus its two neighbours toward the arena interior.
pub fn spawn_zone(slot: usize, size: usize) -> [Position; 3] {
    let spawn = spawn_position(slot, size);
    let dx = if spawn.x == 1 { 1 } else { -1 };
    let dy = if spawn.y == 1 { 1 } else { -1 };
    [
        spawn,
        Position::new(spawn.x + dx, spawn.y),
        Position::new(spawn.x, spawn.y + dy),
    ]
}

/// Every cell that must stay clear so each slot can move and bomb safely.
pub fn spawn_reservations(size: usize) -> HashSet<Position> {
    (0..MAX_PLAYERS)
        .flat_map(|slot| spawn_zone(slot, size))
        .collect()
}

/// Fixed pillar pattern: both coordinates even, at least 2 from each border.
pub fn is_pillar(pos: Position, size: usize) -> bool {
    let limit = size as i32 - 1;
    let inner = |v: i32| v >= 2 && v < limit && v % 2 == 0;
    inner(pos.x) && inner(pos.y)
}

/// Builds a fresh arena.
///
/// Border and pillars are deterministic. Every other empty cell outside
/// `reserved` independently becomes destructible with probability
/// `destructible_chance`. Returns the grid and its destructible cells in
/// row-major order.
pub fn generate<R: Rng + ?Sized>(
    size: usize,
    reserved: &HashSet<Position>,
    destructible_chance: f64,
    rng: &mut R,
) -> (Grid, Vec<Position>) {
    let mut grid = Grid::bordered(size);
    let chance = destructible_chance.clamp(0.0, 1.0);
    let mut destructible = Vec::new();

    for y in 1..size as i32 - 1 {
        for x in 1..size as i32 - 1 {
            let pos = Position::new(x, y);
            if is_pillar(pos, size) {
                grid.set(pos, Cell::Wall);
                continue;
            }
            if reserved.contains(&pos) {
                continue;
            }
            if rng.gen_bool(chance) {
                grid.set(pos, Cell::Destructible);
                destructible.push(pos);
            }
        }
    }

    (grid, destructible)
}
