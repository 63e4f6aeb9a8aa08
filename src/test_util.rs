// Test utilities that cannot be moved to the "tests" folder, because unit
// tests in src/ use them as well.

use std::time::Duration;

use crate::cards::{AbilityCard, CustomMoveTable, Offset};
use crate::coord::Coord;
use crate::force::Force;
use crate::game::{GameError, GameState};
use crate::grid::Grid;
use crate::piece::{PieceKind, PieceOnBoard};


// Parses "e4" into a board square.
pub fn algebraic(square: &str) -> Coord {
    let mut chars = square.chars();
    let file = chars.next().unwrap();
    let rank = chars.next().unwrap().to_digit(10).unwrap() as u8;
    assert!(chars.next().is_none(), "bad square: {square}");
    Coord::from_xy(file as u8 - b'a', 8 - rank)
}

// Builds a position from scratch; pieces are marked as already moved so that
// pawn double pushes do not sneak into constructed endgames.
pub fn grid_from_pieces(pieces: &[(&str, PieceKind, Force)]) -> Grid {
    let mut grid = Grid::empty();
    for &(square, kind, force) in pieces {
        let mut piece = PieceOnBoard::new(kind, force);
        piece.has_moved = true;
        grid[algebraic(square)] = Some(piece);
    }
    grid
}

pub fn sample_card(
    piece_kind: PieceKind, moves: Vec<Offset>, attacks: Vec<Offset>,
) -> AbilityCard {
    AbilityCard { piece_kind, moves, attacks, enabled: true }
}

// Replays "e2 e4"-style square pairs, alternating sides from the current
// position. Stops at the first rejected move.
pub fn replay_moves(
    game: &mut GameState, moves: &[(&str, &str)], table: &CustomMoveTable,
) -> Result<(), GameError> {
    for &(from, to) in moves {
        let force = game.active_force();
        game.try_move(force, algebraic(from), algebraic(to), table, Duration::ZERO)?;
    }
    Ok(())
}
