use serde::{Deserialize, Serialize};

use crate::cards::CustomMoveTable;
use crate::coord::Coord;
use crate::force::Force;
use crate::grid::Grid;
use crate::piece::{PieceKind, PieceOnBoard};


pub const KNIGHT_OFFSETS: [(i8, i8); 8] =
    [(-2, -1), (-2, 1), (-1, -2), (-1, 2), (1, -2), (1, 2), (2, -1), (2, 1)];
pub const KING_OFFSETS: [(i8, i8); 8] =
    [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];


// Candidate destinations for one piece. `moves` land on empty squares,
// `attacks` on enemy-occupied squares; the two sets never mix.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct DestinationSet {
    pub moves: Vec<Coord>,
    pub attacks: Vec<Coord>,
}

impl DestinationSet {
    pub fn is_empty(&self) -> bool { self.moves.is_empty() && self.attacks.is_empty() }
    pub fn contains(&self, pos: Coord) -> bool {
        self.moves.contains(&pos) || self.attacks.contains(&pos)
    }
}

fn ray_destinations(grid: &Grid, from: Coord, force: Force, directions: &[(i8, i8)], dst: &mut DestinationSet) {
    for &dir in directions {
        let mut pos = from;
        while let Some(next) = pos.shifted(dir) {
            match grid[next] {
                None => dst.moves.push(next),
                Some(blocker) => {
                    if blocker.force != force {
                        dst.attacks.push(next);
                    }
                    break;
                }
            }
            pos = next;
        }
    }
}

fn jump_destinations(grid: &Grid, from: Coord, force: Force, offsets: &[(i8, i8)], dst: &mut DestinationSet) {
    for &offset in offsets {
        if let Some(next) = from.shifted(offset) {
            match grid[next] {
                None => dst.moves.push(next),
                Some(target) if target.force != force => dst.attacks.push(next),
                Some(_) => {}
            }
        }
    }
}

// Standard chess geometry only. No en passant and no castling in this
// variant; edge squares are excluded by bounds checks, never by wraparound.
pub fn base_destinations(grid: &Grid, from: Coord) -> DestinationSet {
    let mut dst = DestinationSet::default();
    let Some(piece) = grid[from] else {
        return dst;
    };
    match piece.kind {
        PieceKind::Pawn => {
            let dir = piece.force.forward();
            if let Some(step) = from.shifted((0, dir)) {
                if grid[step].is_none() {
                    dst.moves.push(step);
                    if !piece.has_moved {
                        if let Some(double) = from.shifted((0, dir * 2)) {
                            if grid[double].is_none() {
                                dst.moves.push(double);
                            }
                        }
                    }
                }
            }
            for dx in [-1, 1] {
                if let Some(diag) = from.shifted((dx, dir)) {
                    if matches!(grid[diag], Some(target) if target.force != piece.force) {
                        dst.attacks.push(diag);
                    }
                }
            }
        }
        PieceKind::Knight => jump_destinations(grid, from, piece.force, &KNIGHT_OFFSETS, &mut dst),
        PieceKind::King => jump_destinations(grid, from, piece.force, &KING_OFFSETS, &mut dst),
        PieceKind::Rook => ray_destinations(grid, from, piece.force, &ROOK_DIRECTIONS, &mut dst),
        PieceKind::Bishop => ray_destinations(grid, from, piece.force, &BISHOP_DIRECTIONS, &mut dst),
        PieceKind::Queen => {
            ray_destinations(grid, from, piece.force, &ROOK_DIRECTIONS, &mut dst);
            ray_destinations(grid, from, piece.force, &BISHOP_DIRECTIONS, &mut dst);
        }
    }
    dst
}

// Base geometry plus the ability-card offsets for this (color, piece type).
// A custom "move" offset is realized only onto an empty square and a custom
// "attack" offset only onto an enemy piece; offsets are never reclassified.
pub fn augmented_destinations(grid: &Grid, from: Coord, table: &CustomMoveTable) -> DestinationSet {
    let mut dst = base_destinations(grid, from);
    let Some(piece) = grid[from] else {
        return dst;
    };
    let custom = &table[piece.force][piece.kind];
    for &offset in &custom.moves {
        if let Some(next) = from.shifted(offset) {
            if grid[next].is_none() && !dst.moves.contains(&next) {
                dst.moves.push(next);
            }
        }
    }
    for &offset in &custom.attacks {
        if let Some(next) = from.shifted(offset) {
            if matches!(grid[next], Some(target) if target.force != piece.force)
                && !dst.attacks.contains(&next)
            {
                dst.attacks.push(next);
            }
        }
    }
    dst
}

pub fn is_square_attacked(grid: &Grid, target: Coord, by: Force, table: &CustomMoveTable) -> bool {
    grid.pieces()
        .filter(|&(_, piece)| piece.force == by)
        .any(|(from, _)| augmented_destinations(grid, from, table).attacks.contains(&target))
}

// A missing king is treated as "not in check": boards in that state are only
// reachable after a king capture ended the game.
pub fn is_in_check(grid: &Grid, force: Force, table: &CustomMoveTable) -> bool {
    match grid.find_king(force) {
        None => false,
        Some(king_pos) => is_square_attacked(grid, king_pos, force.opponent(), table),
    }
}

// Simulates each candidate on a scratch copy and discards destinations that
// leave the mover's own king in check. This is the sole self-check mechanism;
// there is no pinned-piece precomputation.
pub fn filter_legal(
    grid: &Grid, from: Coord, candidates: DestinationSet, table: &CustomMoveTable,
) -> DestinationSet {
    let Some(piece) = grid[from] else {
        return DestinationSet::default();
    };
    let survives = |to: &Coord| {
        let mut scratch = grid.clone();
        scratch[from] = None;
        scratch[*to] = Some(piece);
        !is_in_check(&scratch, piece.force, table)
    };
    DestinationSet {
        moves: candidates.moves.into_iter().filter(|to| survives(to)).collect(),
        attacks: candidates.attacks.into_iter().filter(|to| survives(to)).collect(),
    }
}

pub fn legal_destinations(grid: &Grid, from: Coord, table: &CustomMoveTable) -> DestinationSet {
    filter_legal(grid, from, augmented_destinations(grid, from, table), table)
}

pub fn has_legal_move(grid: &Grid, force: Force, table: &CustomMoveTable) -> bool {
    grid.pieces()
        .filter(|&(_, piece)| piece.force == force)
        .any(|(from, _)| !legal_destinations(grid, from, table).is_empty())
}

pub fn is_checkmate(grid: &Grid, force: Force, table: &CustomMoveTable) -> bool {
    is_in_check(grid, force, table) && !has_legal_move(grid, force, table)
}

pub fn is_stalemate(grid: &Grid, force: Force, table: &CustomMoveTable) -> bool {
    !is_in_check(grid, force, table) && !has_legal_move(grid, force, table)
}


#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryReason {
    Checkmate,
    KingCaptured,
    Resignation,
    Flag,
    Abandonment,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    Agreement,
    Stalemate,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ChessGameStatus {
    Active,
    Victory(Force, VictoryReason),
    Draw(DrawReason),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TurnError {
    GameNotActive,
    // No piece at the source square, or the piece belongs to the opponent.
    InvalidSelection,
    // Destination not in the legality-filtered set for the selected piece.
    IllegalMove,
    // A promotion choice is pending; no other action is accepted.
    PromotionPending,
    NotPromotionTime,
    InvalidPromotionTarget,
}

// The result of one committed (or promotion-suspended) half-move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TurnOutcome {
    pub piece_kind: PieceKind,
    pub captured: Option<PieceOnBoard>,
    pub promotion: Option<PieceKind>,
    // Turn did not pass yet; a `choose_promotion` must follow.
    pub promotion_pending: bool,
    pub check: bool,
    pub checkmate: bool,
    pub stalemate: bool,
}

#[derive(Clone, Debug)]
pub struct Board {
    grid: Grid,
    active_force: Force,
    status: ChessGameStatus,
    promotion_pending: Option<Coord>,
}

impl Board {
    pub fn new() -> Board {
        Board {
            grid: Grid::starting(),
            active_force: Force::White,
            status: ChessGameStatus::Active,
            promotion_pending: None,
        }
    }

    // Starts from an arbitrary position; used by constructed-position tests.
    pub fn from_grid(grid: Grid, active_force: Force) -> Board {
        Board {
            grid,
            active_force,
            status: ChessGameStatus::Active,
            promotion_pending: None,
        }
    }

    pub fn grid(&self) -> &Grid { &self.grid }
    pub fn active_force(&self) -> Force { self.active_force }
    pub fn status(&self) -> ChessGameStatus { self.status }
    pub fn is_active(&self) -> bool { self.status == ChessGameStatus::Active }
    pub fn promotion_pending(&self) -> Option<Coord> { self.promotion_pending }

    pub fn set_status(&mut self, status: ChessGameStatus) { self.status = status; }

    // Observer query: no state change.
    pub fn valid_destinations(&self, from: Coord, table: &CustomMoveTable) -> DestinationSet {
        legal_destinations(&self.grid, from, table)
    }

    pub fn try_move(
        &mut self, from: Coord, to: Coord, table: &CustomMoveTable,
    ) -> Result<TurnOutcome, TurnError> {
        if !self.is_active() {
            return Err(TurnError::GameNotActive);
        }
        if self.promotion_pending.is_some() {
            return Err(TurnError::PromotionPending);
        }
        let piece = self.grid[from].ok_or(TurnError::InvalidSelection)?;
        if piece.force != self.active_force {
            return Err(TurnError::InvalidSelection);
        }
        if !self.valid_destinations(from, table).contains(to) {
            return Err(TurnError::IllegalMove);
        }

        let captured = self.grid[to];
        let mut moved_piece = piece;
        moved_piece.has_moved = true;
        self.grid[from] = None;
        self.grid[to] = Some(moved_piece);

        // Capturing a king ends the game on the spot. Unreachable through the
        // legality filter above, but kept as a terminal condition in its own
        // right so that no rule extension can ever leave a kingless game
        // running (the original clients relied on this).
        if matches!(captured, Some(target) if target.kind == PieceKind::King) {
            self.status = ChessGameStatus::Victory(self.active_force, VictoryReason::KingCaptured);
            return Ok(TurnOutcome {
                piece_kind: moved_piece.kind,
                captured,
                promotion: None,
                promotion_pending: false,
                check: false,
                checkmate: false,
                stalemate: false,
            });
        }

        if moved_piece.kind == PieceKind::Pawn && to.row == promotion_row(moved_piece.force) {
            // Suspend the turn until a promotion target is chosen.
            self.promotion_pending = Some(to);
            return Ok(TurnOutcome {
                piece_kind: moved_piece.kind,
                captured,
                promotion: None,
                promotion_pending: true,
                check: false,
                checkmate: false,
                stalemate: false,
            });
        }

        Ok(self.finish_turn(moved_piece.kind, captured, None, table))
    }

    pub fn choose_promotion(
        &mut self, kind: PieceKind, table: &CustomMoveTable,
    ) -> Result<TurnOutcome, TurnError> {
        if !self.is_active() {
            return Err(TurnError::GameNotActive);
        }
        let pos = self.promotion_pending.ok_or(TurnError::NotPromotionTime)?;
        if !kind.is_valid_promotion_target() {
            return Err(TurnError::InvalidPromotionTarget);
        }
        let pawn = self.grid[pos].expect("promotion-pending square must hold the pawn");
        self.grid[pos] = Some(PieceOnBoard { kind, ..pawn });
        self.promotion_pending = None;
        Ok(self.finish_turn(PieceKind::Pawn, None, Some(kind), table))
    }

    fn finish_turn(
        &mut self, piece_kind: PieceKind, captured: Option<PieceOnBoard>,
        promotion: Option<PieceKind>, table: &CustomMoveTable,
    ) -> TurnOutcome {
        self.active_force = self.active_force.opponent();
        let check = is_in_check(&self.grid, self.active_force, table);
        let any_move = has_legal_move(&self.grid, self.active_force, table);
        let checkmate = check && !any_move;
        let stalemate = !check && !any_move;
        if checkmate {
            self.status =
                ChessGameStatus::Victory(self.active_force.opponent(), VictoryReason::Checkmate);
        } else if stalemate {
            self.status = ChessGameStatus::Draw(DrawReason::Stalemate);
        }
        TurnOutcome {
            piece_kind,
            captured,
            promotion,
            promotion_pending: false,
            check,
            checkmate,
            stalemate,
        }
    }
}

fn promotion_row(force: Force) -> crate::coord::Row {
    match force {
        Force::White => crate::coord::Row::from_zero_based(0),
        Force::Black => crate::coord::Row::from_zero_based(7),
    }
}

// Sanity check used by tests: for the side to move in an unconcluded game,
// exactly one of checkmate / stalemate / has-a-legal-move holds.
pub fn position_verdicts(grid: &Grid, force: Force, table: &CustomMoveTable) -> [bool; 3] {
    [
        is_checkmate(grid, force, table),
        is_stalemate(grid, force, table),
        has_legal_move(grid, force, table),
    ]
}
