mod common;

use card_chess::board::{
    base_destinations, is_in_check, legal_destinations, position_verdicts, Board, ChessGameStatus,
    TurnError, VictoryReason,
};
use card_chess::cards::CustomMoveTable;
use card_chess::clock::TimeControl;
use card_chess::force::Force;
use card_chess::game::{GameError, GameState};
use card_chess::grid::Grid;
use card_chess::piece::{PieceKind, PieceOnBoard};
use card_chess::test_util::{algebraic, replay_moves, sample_card};
use common::parse_grid;
use pretty_assertions::assert_eq;

use Force::{Black, White};


fn no_cards() -> CustomMoveTable { CustomMoveTable::default() }

fn sorted(mut squares: Vec<card_chess::coord::Coord>) -> Vec<card_chess::coord::Coord> {
    squares.sort_by_key(|pos| (pos.row.to_zero_based(), pos.col.to_zero_based()));
    squares
}

fn squares(names: &[&str]) -> Vec<card_chess::coord::Coord> {
    sorted(names.iter().map(|name| algebraic(name)).collect())
}

#[test]
fn pawn_opening_moves() {
    let grid = Grid::starting();
    let destinations = base_destinations(&grid, algebraic("e2"));
    assert_eq!(sorted(destinations.moves), squares(&["e3", "e4"]));
    assert!(destinations.attacks.is_empty());
}

#[test]
fn pawn_capture_is_diagonal_only() {
    let mut grid = Grid::starting();
    grid[algebraic("d3")] = Some(PieceOnBoard::new(PieceKind::Pawn, Black));
    grid[algebraic("e3")] = Some(PieceOnBoard::new(PieceKind::Pawn, Black));
    let destinations = base_destinations(&grid, algebraic("e2"));
    // The front blocker stops both the push and the double push.
    assert!(destinations.moves.is_empty());
    assert_eq!(sorted(destinations.attacks), squares(&["d3"]));
}

#[test]
fn sliding_piece_stops_at_blockers() {
    let grid = parse_grid(
        "
        . . . . . . . k
        . . . . . . . .
        . . . P . . . .
        . . . . . . . .
        . . . R . . p .
        . . . . . . . .
        . . . . . . . .
        K . . . . . . .
        ",
    );
    let destinations = base_destinations(&grid, algebraic("d4"));
    // Up the file the friendly pawn on d6 blocks after d5; right along the
    // rank the enemy pawn on g4 is capturable and ends the ray.
    assert_eq!(
        sorted(destinations.moves),
        squares(&["a4", "b4", "c4", "d1", "d2", "d3", "d5", "e4", "f4"]),
    );
    assert_eq!(sorted(destinations.attacks), squares(&["g4"]));
}

#[test]
fn knight_jumps_over_pieces() {
    let grid = Grid::starting();
    let destinations = base_destinations(&grid, algebraic("b1"));
    assert_eq!(sorted(destinations.moves), squares(&["a3", "c3"]));
    assert!(destinations.attacks.is_empty());
}

#[test]
fn pinned_piece_cannot_expose_king() {
    let grid = parse_grid(
        "
        . . . . r . . k
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . R . . .
        . . . . K . . .
        ",
    );
    let table = no_cards();
    let destinations = legal_destinations(&grid, algebraic("e2"), &table);
    // The rook may slide along the e-file, up to capturing the pinner, but
    // never sideways.
    assert_eq!(sorted(destinations.moves), squares(&["e3", "e4", "e5", "e6", "e7"]));
    assert_eq!(sorted(destinations.attacks), squares(&["e8"]));
}

#[test]
fn back_rank_mate() {
    let grid = parse_grid(
        "
        R . . . . . k .
        . . . . . p p p
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . K .
        ",
    );
    let table = no_cards();
    assert!(is_in_check(&grid, Black, &table));
    assert_eq!(position_verdicts(&grid, Black, &table), [true, false, false]);
}

#[test]
fn stalemate_is_not_mate() {
    let grid = parse_grid(
        "
        k . . . . . . .
        . . Q . . . . .
        . K . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        ",
    );
    let table = no_cards();
    assert!(!is_in_check(&grid, Black, &table));
    assert_eq!(position_verdicts(&grid, Black, &table), [false, true, false]);
}

#[test]
fn card_moves_require_empty_squares() {
    let mut table = no_cards();
    let card = sample_card(PieceKind::Rook, vec![(1, 1)], vec![(-1, -1)]);
    table[White][PieceKind::Rook] = card_chess::cards::OffsetSet {
        moves: card.moves.clone(),
        attacks: card.attacks.clone(),
    };
    let mut grid = parse_grid(
        "
        . . . . . . . k
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        . . . R . . . .
        . . . . . . . .
        . . . . . . . .
        K . . . . . . .
        ",
    );
    let from = algebraic("d4");
    // (1, 1) in wire space points one file right and one rank down.
    let destinations = legal_destinations(&grid, from, &table);
    assert!(destinations.moves.contains(&algebraic("e3")));
    // The attack offset needs an enemy piece on the target square.
    assert!(!destinations.attacks.contains(&algebraic("c5")));
    assert!(!destinations.moves.contains(&algebraic("c5")));

    grid[algebraic("c5")] = Some(PieceOnBoard::new(PieceKind::Pawn, Black));
    let destinations = legal_destinations(&grid, from, &table);
    assert!(destinations.attacks.contains(&algebraic("c5")));

    // A friendly piece blocks both kinds of offsets.
    grid[algebraic("e3")] = Some(PieceOnBoard::new(PieceKind::Pawn, White));
    let destinations = legal_destinations(&grid, from, &table);
    assert!(!destinations.moves.contains(&algebraic("e3")));
}

#[test]
fn card_attacks_count_as_check() {
    let grid = parse_grid(
        "
        . . . . . . . k
        . . . . . . . .
        . . . p . . . .
        . . . . . . . .
        . . . K . . . .
        . . . . . . . .
        . . . . . . . .
        . . . . . . . .
        ",
    );
    assert!(!is_in_check(&grid, White, &no_cards()));
    let mut table = no_cards();
    table[Black][PieceKind::Pawn].attacks.push((0, 2));
    assert!(is_in_check(&grid, White, &table));
}

#[test]
fn promotion_suspends_the_turn() {
    let mut game = GameState::new(TimeControl::default());
    let table = no_cards();
    replay_moves(
        &mut game,
        &[
            ("a2", "a4"),
            ("b7", "b5"),
            ("a4", "b5"),
            ("d7", "d5"),
            ("b5", "b6"),
            ("d5", "d4"),
            ("b6", "b7"),
            ("d4", "d3"),
        ],
        &table,
    )
    .unwrap();
    let outcome = game
        .try_move(White, algebraic("b7"), algebraic("c8"), &table, std::time::Duration::ZERO)
        .unwrap();
    assert!(outcome.promotion_pending);
    assert_eq!(game.promotion_pending(), Some(algebraic("c8")));
    // The turn has not passed; no other action is accepted.
    assert_eq!(game.active_force(), White);
    assert_eq!(
        game.try_move(White, algebraic("e2"), algebraic("e4"), &table, std::time::Duration::ZERO),
        Err(GameError::Turn(TurnError::PromotionPending))
    );
    assert_eq!(
        game.choose_promotion(White, PieceKind::King, &table, std::time::Duration::ZERO),
        Err(GameError::Turn(TurnError::InvalidPromotionTarget))
    );
    let outcome = game
        .choose_promotion(White, PieceKind::Queen, &table, std::time::Duration::ZERO)
        .unwrap();
    assert_eq!(outcome.promotion, Some(PieceKind::Queen));
    assert_eq!(game.active_force(), Black);
    assert_eq!(game.move_log().last().unwrap().notation, "b7xc8=Q");
    let promoted = game.grid()[algebraic("c8")].unwrap();
    assert_eq!(promoted.kind, PieceKind::Queen);
    assert_eq!(promoted.force, White);
}

#[test]
fn moving_marks_the_piece_moved() {
    let mut game = GameState::new(TimeControl::default());
    let table = no_cards();
    replay_moves(&mut game, &[("e2", "e4")], &table).unwrap();
    let pawn = game.grid()[algebraic("e4")].unwrap();
    assert!(pawn.has_moved);
    assert_eq!(game.active_force(), Black);
    // No double push the second time around.
    replay_moves(&mut game, &[("d7", "d5")], &table).unwrap();
    assert_eq!(
        game.try_move(White, algebraic("e4"), algebraic("e6"), &table, std::time::Duration::ZERO),
        Err(GameError::Turn(TurnError::IllegalMove))
    );
}

#[test]
fn king_capture_ends_the_game() {
    let grid = parse_grid(
        "
        . . . . . . . .
        . . . . . . . .
        . . . k . . . .
        . . . . . . . .
        . . . Q . . . .
        . . . . . . . .
        . . . . . . . .
        K . . . . . . .
        ",
    );
    let mut board = Board::from_grid(grid, White);
    let table = no_cards();
    board.try_move(algebraic("d4"), algebraic("d6"), &table).unwrap();
    assert_eq!(board.status(), ChessGameStatus::Victory(White, VictoryReason::KingCaptured));
    // Nothing moves after the game ended.
    assert_eq!(
        board.try_move(algebraic("a1"), algebraic("a2"), &table),
        Err(TurnError::GameNotActive)
    );
}

#[test]
fn selection_errors() {
    let mut board = Board::from_grid(Grid::starting(), White);
    let table = no_cards();
    assert_eq!(
        board.try_move(algebraic("e4"), algebraic("e5"), &table),
        Err(TurnError::InvalidSelection)
    );
    assert_eq!(
        board.try_move(algebraic("e7"), algebraic("e5"), &table),
        Err(TurnError::InvalidSelection)
    );
    assert_eq!(
        board.try_move(algebraic("e2"), algebraic("e5"), &table),
        Err(TurnError::IllegalMove)
    );
}
