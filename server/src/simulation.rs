//! Fixed-step simulation: fuses, blasts, eliminations and the win check

use crate::config::GameRules;
use crate::model::EntityModel;
use log::{debug, info};
use rand::Rng;
use shared::{Bomb, Cell, Direction, Explosion, PlayerId, Position, PowerUp, PowerUpKind};

/// What one tick changed, for logging and callers that care.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub detonated: Vec<u32>,
    pub destroyed: Vec<Position>,
    pub eliminated: Vec<PlayerId>,
    pub game_ended: bool,
}

/// Cells covered by a single detonation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Blast {
    /// Every cell that received an explosion, origin first.
    pub cells: Vec<Position>,
    /// Destructible cells cleared by this blast.
    pub destroyed: Vec<Position>,
}

enum Burn {
    Spread,
    Consumed,
    Blocked,
}

/// Advances the world by one tick of `rules.tick_interval_ms`.
pub fn step<R: Rng + ?Sized>(
    model: &mut EntityModel,
    rules: &GameRules,
    rng: &mut R,
) -> TickReport {
    let mut report = TickReport::default();
    let interval = rules.tick_interval_ms;

    let mut expired = Vec::new();
    model.bombs.retain_mut(|bomb| {
        bomb.timer = bomb.timer.saturating_sub(interval);
        if bomb.timer == 0 {
            expired.push(bomb.clone());
            false
        } else {
            true
        }
    });

    let mut fresh = Vec::new();
    for bomb in &expired {
        if let Some(owner) = model.players.get_mut(&bomb.owner) {
            owner.bomb_count = owner.bomb_count.saturating_sub(1);
        }
        let blast = detonate(model, bomb, rules, rng);
        debug!(
            "Bomb {} detonated at ({}, {}) covering {} cells",
            bomb.id,
            bomb.position.x,
            bomb.position.y,
            blast.cells.len()
        );
        report.detonated.push(bomb.id);
        report.destroyed.extend(blast.destroyed);
        fresh.extend(blast.cells);
    }

    for player in model.players.values_mut() {
        if player.alive && fresh.contains(&player.position) {
            player.alive = false;
            info!("Player {} ({}) was eliminated", player.id, player.name);
            report.eliminated.push(player.id);
        }
    }

    report.game_ended = model.evaluate_win_condition();

    model.explosions.retain_mut(|explosion| {
        explosion.timer = explosion.timer.saturating_sub(interval);
        explosion.timer > 0
    });

    report
}

/// Spreads one bomb's blast from its cell along the four cardinal directions.
///
/// Walls and the grid edge stop a direction without burning. A destructible
/// cell burns, turns empty, may drop a power-up and ends its direction.
pub fn detonate<R: Rng + ?Sized>(
    model: &mut EntityModel,
    bomb: &Bomb,
    rules: &GameRules,
    rng: &mut R,
) -> Blast {
    let mut blast = Blast::default();

    if let Burn::Blocked = burn(model, bomb.position, bomb.owner, rules, rng, &mut blast) {
        return blast;
    }

    for direction in Direction::ALL {
        for distance in 1..=bomb.range as i32 {
            let pos = bomb.position.step(direction, distance);
            match burn(model, pos, bomb.owner, rules, rng, &mut blast) {
                Burn::Spread => {}
                Burn::Consumed | Burn::Blocked => break,
            }
        }
    }

    blast
}

fn burn<R: Rng + ?Sized>(
    model: &mut EntityModel,
    pos: Position,
    owner: PlayerId,
    rules: &GameRules,
    rng: &mut R,
    blast: &mut Blast,
) -> Burn {
    let cell = match model.grid.get(pos) {
        Some(Cell::Wall) | None => return Burn::Blocked,
        Some(cell) => cell,
    };

    let id = model.alloc_explosion_id();
    model.explosions.push(Explosion {
        id,
        position: pos,
        timer: rules.explosion_duration_ms,
    });
    blast.cells.push(pos);

    if cell != Cell::Destructible {
        return Burn::Spread;
    }

    model.grid.set(pos, Cell::Empty);
    blast.destroyed.push(pos);
    if let Some(player) = model.players.get_mut(&owner) {
        player.score += rules.score_per_wall;
    }

    if rng.gen_bool(rules.power_up_chance.clamp(0.0, 1.0)) {
        let kind = if rng.gen_bool(0.5) {
            PowerUpKind::RangeBoost
        } else {
            PowerUpKind::BombCapacity
        };
        let id = model.alloc_power_up_id();
        model.power_ups.push(PowerUp {
            id,
            position: pos,
            kind,
        });
        debug!("Power-up {:?} dropped at ({}, {})", kind, pos.x, pos.y);
    }

    Burn::Consumed
}
