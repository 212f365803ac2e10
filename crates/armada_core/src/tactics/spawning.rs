//! Production control: when to spawn, when to hoard ore.

use tracing::info;

use crate::board::{Board, PlayerId, ShipyardAction};
use crate::turn::Turn;

/// Whether the game is already decided on ore alone: even if the opponent
/// harvested the entire remaining board, they could not catch up.
#[must_use]
pub fn is_inevitable_victory(board: &Board, me: PlayerId) -> bool {
    let opponents = board.opponents_of(me);
    if opponents.is_empty() {
        return true;
    }
    if board.steps_left() > 100 {
        return false;
    }

    let board_ore = board.grid.total_ore()
        * (1.0 + board.config.regen_rate).powi(board.steps_left() as i32);
    let mine = board.player(me).map_or(0.0, |p| p.ore) + board.fleet_expected_ore(me);
    let theirs = opponents
        .iter()
        .map(|p| p.ore + board.fleet_expected_ore(p.id))
        .fold(f64::NEG_INFINITY, f64::max);
    mine > theirs + board_ore
}

fn opponent_ship_count(turn: &Turn<'_>) -> u32 {
    turn.board
        .opponents_of(turn.me)
        .iter()
        .map(|p| turn.board.ship_count(p.id))
        .sum()
}

fn max_ships_to_control(turn: &Turn<'_>) -> u32 {
    (3 * opponent_ship_count(turn)).max(100)
}

pub(crate) fn need_more_ships(turn: &Turn<'_>, ship_count: u32) -> bool {
    let board = turn.board;
    if board.steps_left() < 10 {
        return false;
    }
    if ship_count > max_ships_to_control(turn) {
        return false;
    }
    if board.steps_left() < 50 && is_inevitable_victory(board, turn.me) {
        return false;
    }
    if board.steps_left() < 100
        && f64::from(board.ship_count(turn.me)) > 1.5 * f64::from(opponent_ship_count(turn))
    {
        return false;
    }
    true
}

fn should_greedy_spawn(turn: &Turn<'_>) -> bool {
    let board = turn.board;
    if board.player(turn.me).map_or(0.0, |p| p.ore) < 300.0 {
        return false;
    }
    let op_ships = board
        .opponents_of(turn.me)
        .iter()
        .map(|p| board.ship_count(p.id))
        .max()
        .unwrap_or(0);
    let op_ore = board
        .opponents_of(turn.me)
        .iter()
        .map(|p| p.ore)
        .fold(0.0, f64::max);
    let ore_surplus = turn.available_ore() - op_ore;
    let potential = (ore_surplus / board.config.spawn_cost).floor();
    let ship_surplus = f64::from(board.ship_count(turn.me)) - f64::from(op_ships) * 1.2;
    if ship_surplus < 0.0 && potential > -ship_surplus {
        info!("ore-rich but behind in ships, spawning greedily");
        return true;
    }
    false
}

/// Whether a later spawn pass may still act on this yard: untouched yards
/// and yards parked on `Hold` qualify.
fn spawnable(turn: &Turn<'_>, id: &str) -> bool {
    matches!(turn.action(id), None | Some(ShipyardAction::Hold))
}

/// Outspend an ore-rich position: spawn at yards that would otherwise sit
/// on their ore, even before the mining pass has had its say.
pub fn greedy_spawn(turn: &mut Turn<'_>) {
    let board = turn.board;
    if !need_more_ships(turn, board.ship_count(turn.me)) {
        return;
    }

    let mut ship_count = board.ship_count(turn.me);
    let max_ship_count = max_ships_to_control(turn);
    let can_greedy = should_greedy_spawn(turn);
    let num_yards = board.yards_of(turn.me).count().max(1);

    let yards: Vec<_> = board.shipyards_of(turn.me).collect();
    for sy in yards {
        if !spawnable(turn, &sy.id) {
            continue;
        }
        if board.incoming_allied_fleets(turn.me, sy.pos).count() <= 1 && sy.ships >= 21 {
            continue;
        }
        if !can_greedy
            && f64::from(sy.ships)
                > f64::from(board.ship_count(turn.me)) * 0.2 / num_yards as f64
        {
            continue;
        }
        let spawned = turn.try_spawn(sy);
        if spawned == 0 {
            continue;
        }
        info!(yard = %sy.id, spawned, "greedy spawn");
        ship_count += spawned;
        if ship_count > max_ship_count {
            return;
        }
    }
}

/// The terminal spawn pass: every yard still free spawns what it can.
pub fn spawn(turn: &mut Turn<'_>) {
    let board = turn.board;
    if !need_more_ships(turn, board.ship_count(turn.me)) {
        return;
    }

    let mut ship_count = board.ship_count(turn.me);
    let max_ship_count = max_ships_to_control(turn);
    let yards: Vec<_> = board.shipyards_of(turn.me).collect();
    for sy in yards {
        if !spawnable(turn, &sy.id) {
            continue;
        }
        ship_count += turn.spawn_or_hold(sy);
        if ship_count > max_ship_count {
            return;
        }
    }
}

/// Hoard early when comfortably ahead or at the very end.
pub fn conservative_save_ore(turn: &mut Turn<'_>) {
    let ahead = f64::from(turn.board.ship_count(turn.me))
        > 1.1 * f64::from(opponent_ship_count(turn));
    if ahead {
        save_ore(turn);
    }
    if turn.board.steps_left() < 10 {
        save_ore(turn);
    }
}

/// Near the end ore is the score: reserve enough to stay ahead of the
/// richest opponent.
pub fn save_ore(turn: &mut Turn<'_>) {
    if turn.board.steps_left() >= 25 {
        return;
    }
    let op_ore: f64 = turn
        .board
        .opponents_of(turn.me)
        .iter()
        .map(|p| p.ore)
        .sum();
    let amount = turn.available_ore().min(1.25 * op_ore);
    turn.reserve_ore(amount);
    info!(reserve = turn.ore_reserve(), "holding ore back from spawning");
}
