use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::{
    Board, ChessGameStatus, DestinationSet, DrawReason, TurnError, TurnOutcome, VictoryReason,
};
use crate::cards::CustomMoveTable;
use crate::clock::{Clock, TimeControl, WireTimers};
use crate::coord::Coord;
use crate::force::Force;
use crate::grid::Grid;
use crate::piece::PieceKind;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameError {
    Turn(TurnError),
    // The intent came from the seat whose color is not to move.
    NotYourTurn,
    OfferAlreadyPending,
    NoPendingOffer,
    NothingToUndo,
    GameOver,
}

impl From<TurnError> for GameError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::GameNotActive => GameError::GameOver,
            err => GameError::Turn(err),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HalfMove {
    pub number: u32, // full-move number, starting at 1
    pub force: Force,
    pub notation: String,
    pub from: Coord,
    pub to: Coord,
}

// A committed position. The stack of these backs undo: no replay, no
// per-half-move reconstruction.
#[derive(Clone, Debug)]
struct Snapshot {
    board: Board,
    clock: Clock,
}

// One room's authoritative game. All mutation goes through intents validated
// here; wall-clock deltas are passed in by the caller so that the state
// machine itself stays deterministic.
#[derive(Clone, Debug)]
pub struct GameState {
    board: Board,
    clock: Clock,
    move_log: Vec<HalfMove>,
    history: Vec<Snapshot>,
    pending_draw_offer: Option<Force>,
    pending_undo_request: Option<Force>,
    // Notation of a half-move suspended on promotion choice.
    pending_notation: Option<(Coord, Coord, String)>,
}

impl GameState {
    pub fn new(time_control: TimeControl) -> Self {
        let board = Board::new();
        let clock = Clock::new(time_control);
        let initial = Snapshot { board: board.clone(), clock: clock.clone() };
        GameState {
            board,
            clock,
            move_log: Vec::new(),
            history: vec![initial],
            pending_draw_offer: None,
            pending_undo_request: None,
            pending_notation: None,
        }
    }

    pub fn grid(&self) -> &Grid { self.board.grid() }
    pub fn active_force(&self) -> Force { self.board.active_force() }
    pub fn status(&self) -> ChessGameStatus { self.board.status() }
    pub fn is_active(&self) -> bool { self.board.is_active() }
    pub fn timers(&self) -> WireTimers { self.clock.timers() }
    pub fn move_log(&self) -> &[HalfMove] { &self.move_log }
    pub fn promotion_pending(&self) -> Option<Coord> { self.board.promotion_pending() }
    pub fn pending_draw_offer(&self) -> Option<Force> { self.pending_draw_offer }
    pub fn pending_undo_request(&self) -> Option<Force> { self.pending_undo_request }

    // Pure query, available to observers as well.
    pub fn valid_destinations(&self, from: Coord, table: &CustomMoveTable) -> DestinationSet {
        self.board.valid_destinations(from, table)
    }

    pub fn try_move(
        &mut self, force: Force, from: Coord, to: Coord, table: &CustomMoveTable,
        elapsed: Duration,
    ) -> Result<TurnOutcome, GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        if force != self.board.active_force() {
            return Err(GameError::NotYourTurn);
        }
        self.charge_active(elapsed);
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        let outcome = self.board.try_move(from, to, table)?;
        let mut notation = format!(
            "{}{}{}{}",
            outcome.piece_kind.to_algebraic(),
            from.to_algebraic(),
            if outcome.captured.is_some() { "x" } else { "-" },
            to.to_algebraic(),
        );
        if outcome.promotion_pending {
            self.pending_notation = Some((from, to, notation));
        } else {
            if outcome.checkmate {
                notation.push('#');
            } else if outcome.check {
                notation.push('+');
            }
            self.commit_half_move(force, from, to, notation);
        }
        Ok(outcome)
    }

    pub fn choose_promotion(
        &mut self, force: Force, kind: PieceKind, table: &CustomMoveTable, elapsed: Duration,
    ) -> Result<TurnOutcome, GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        if force != self.board.active_force() {
            return Err(GameError::NotYourTurn);
        }
        self.charge_active(elapsed);
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        let outcome = self.board.choose_promotion(kind, table)?;
        let (from, to, mut notation) =
            self.pending_notation.take().expect("promotion commit without a suspended half-move");
        notation.push_str(&format!("={}", kind.to_algebraic()));
        if outcome.checkmate {
            notation.push('#');
        } else if outcome.check {
            notation.push('+');
        }
        self.commit_half_move(force, from, to, notation);
        Ok(outcome)
    }

    fn commit_half_move(&mut self, force: Force, from: Coord, to: Coord, notation: String) {
        self.clock.apply_increment(force);
        let number = (self.move_log.len() as u32) / 2 + 1;
        self.move_log.push(HalfMove { number, force, notation, from, to });
        self.history.push(Snapshot { board: self.board.clone(), clock: self.clock.clone() });
        // A committed move supersedes pending table offers.
        self.pending_draw_offer = None;
    }

    // Charges the side to move and converts a flag fall into a terminal state.
    // Called on each server tick and before each move commit, never in between.
    // The clock does not pause while a promotion choice is pending: the turn
    // has not passed, so the mover keeps paying for the suspension.
    pub fn charge_active(&mut self, elapsed: Duration) {
        if !self.is_active() {
            return;
        }
        let force = self.board.active_force();
        self.clock.charge(force, elapsed);
        if self.clock.is_flagged(force) {
            self.board
                .set_status(ChessGameStatus::Victory(force.opponent(), VictoryReason::Flag));
        }
    }

    pub fn resign(&mut self, force: Force) -> Result<(), GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        self.board
            .set_status(ChessGameStatus::Victory(force.opponent(), VictoryReason::Resignation));
        Ok(())
    }

    pub fn forfeit_by_abandonment(&mut self, force: Force) {
        if self.is_active() {
            self.board
                .set_status(ChessGameStatus::Victory(force.opponent(), VictoryReason::Abandonment));
        }
    }

    pub fn offer_draw(&mut self, force: Force) -> Result<(), GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        if force != self.board.active_force() {
            return Err(GameError::NotYourTurn);
        }
        if self.pending_draw_offer.is_some() {
            return Err(GameError::OfferAlreadyPending);
        }
        self.pending_draw_offer = Some(force);
        Ok(())
    }

    pub fn respond_draw(&mut self, force: Force, accept: bool) -> Result<bool, GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        match self.pending_draw_offer {
            None => Err(GameError::NoPendingOffer),
            Some(offerer) if offerer == force => Err(GameError::NoPendingOffer),
            Some(_) => {
                self.pending_draw_offer = None;
                if accept {
                    self.board.set_status(ChessGameStatus::Draw(DrawReason::Agreement));
                }
                Ok(accept)
            }
        }
    }

    pub fn request_undo(&mut self, force: Force) -> Result<(), GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        if force != self.board.active_force() {
            return Err(GameError::NotYourTurn);
        }
        if self.move_log.is_empty() {
            return Err(GameError::NothingToUndo);
        }
        if self.pending_undo_request.is_some() {
            return Err(GameError::OfferAlreadyPending);
        }
        self.pending_undo_request = Some(force);
        Ok(())
    }

    // Rolls back one full turn pair (or the single opening half-move). The
    // promotion-suspended state never rolls back: the request is rejected
    // until the choice lands.
    pub fn respond_undo(&mut self, force: Force, accept: bool) -> Result<bool, GameError> {
        if !self.is_active() {
            return Err(GameError::GameOver);
        }
        if self.promotion_pending().is_some() {
            return Err(GameError::Turn(TurnError::PromotionPending));
        }
        match self.pending_undo_request {
            None => Err(GameError::NoPendingOffer),
            Some(requester) if requester == force => Err(GameError::NoPendingOffer),
            Some(_) => {
                self.pending_undo_request = None;
                if !accept {
                    return Ok(false);
                }
                let half_moves = self.move_log.len().min(2);
                if half_moves == 0 {
                    return Err(GameError::NothingToUndo);
                }
                self.history.truncate(self.history.len() - half_moves);
                self.move_log.truncate(self.move_log.len() - half_moves);
                let snapshot = self.history.last().expect("initial snapshot is never popped");
                self.board = snapshot.board.clone();
                self.clock = snapshot.clock.clone();
                Ok(true)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NO_TIME: Duration = Duration::ZERO;

    fn xy(x: u8, y: u8) -> Coord { Coord::from_xy(x, y) }

    fn new_game() -> (GameState, CustomMoveTable) {
        (GameState::new(TimeControl::default()), CustomMoveTable::default())
    }

    #[test]
    fn move_log_notation() {
        let (mut game, table) = new_game();
        game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME).unwrap();
        game.try_move(Force::Black, xy(3, 1), xy(3, 3), &table, NO_TIME).unwrap();
        game.try_move(Force::White, xy(4, 4), xy(3, 3), &table, NO_TIME).unwrap();
        let notations: Vec<_> = game.move_log().iter().map(|hm| hm.notation.as_str()).collect();
        assert_eq!(notations, vec!["e2-e4", "d7-d5", "e4xd5"]);
        assert_eq!(game.move_log()[2].number, 2);
    }

    #[test]
    fn undo_restores_previous_board() {
        let (mut game, table) = new_game();
        let before = game.grid().clone();
        game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME).unwrap();
        game.try_move(Force::Black, xy(4, 1), xy(4, 3), &table, NO_TIME).unwrap();
        game.request_undo(Force::White).unwrap();
        assert!(game.respond_undo(Force::Black, true).unwrap());
        assert_eq!(game.grid(), &before);
        assert_eq!(game.active_force(), Force::White);
        assert!(game.move_log().is_empty());
    }

    #[test]
    fn undo_single_half_move() {
        let (mut game, table) = new_game();
        let before = game.grid().clone();
        game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME).unwrap();
        game.request_undo(Force::Black).unwrap();
        assert!(game.respond_undo(Force::White, true).unwrap());
        assert_eq!(game.grid(), &before);
        assert_eq!(game.active_force(), Force::White);
    }

    #[test]
    fn undo_needs_a_move_and_a_peer_response() {
        let (mut game, table) = new_game();
        assert_eq!(game.request_undo(Force::White), Err(GameError::NothingToUndo));
        game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME).unwrap();
        assert_eq!(game.request_undo(Force::White), Err(GameError::NotYourTurn));
        game.request_undo(Force::Black).unwrap();
        // The requester cannot answer their own request.
        assert_eq!(game.respond_undo(Force::Black, true), Err(GameError::NoPendingOffer));
        assert!(!game.respond_undo(Force::White, false).unwrap());
        assert_eq!(game.respond_undo(Force::White, true), Err(GameError::NoPendingOffer));
    }

    #[test]
    fn draw_agreement() {
        let (mut game, _) = new_game();
        game.offer_draw(Force::White).unwrap();
        assert_eq!(game.offer_draw(Force::White), Err(GameError::OfferAlreadyPending));
        assert_eq!(game.offer_draw(Force::Black), Err(GameError::NotYourTurn));
        assert!(game.respond_draw(Force::Black, true).unwrap());
        assert_eq!(game.status(), ChessGameStatus::Draw(DrawReason::Agreement));
    }

    #[test]
    fn draw_offer_cleared_by_commit() {
        let (mut game, table) = new_game();
        game.offer_draw(Force::White).unwrap();
        game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME).unwrap();
        assert_eq!(game.respond_draw(Force::Black, true), Err(GameError::NoPendingOffer));
    }

    #[test]
    fn flag_fall_ends_game() {
        let mut game = GameState::new(TimeControl {
            starting_time: Duration::from_secs(5),
            increment: Duration::ZERO,
        });
        game.charge_active(Duration::from_secs(6));
        assert_eq!(
            game.status(),
            ChessGameStatus::Victory(Force::Black, VictoryReason::Flag)
        );
        let table = CustomMoveTable::default();
        assert_eq!(
            game.try_move(Force::White, xy(4, 6), xy(4, 4), &table, NO_TIME),
            Err(GameError::GameOver)
        );
    }

    #[test]
    fn flag_falls_during_promotion_pending() {
        let mut game = GameState::new(TimeControl {
            starting_time: Duration::from_secs(5),
            increment: Duration::ZERO,
        });
        let table = CustomMoveTable::default();
        let moves = [
            ((0, 6), (0, 4)),
            ((1, 1), (1, 3)),
            ((0, 4), (1, 3)),
            ((3, 1), (3, 3)),
            ((1, 3), (1, 2)),
            ((3, 3), (3, 4)),
            ((1, 2), (1, 1)),
            ((3, 4), (3, 5)),
        ];
        for ((fx, fy), (tx, ty)) in moves {
            let force = game.active_force();
            game.try_move(force, xy(fx, fy), xy(tx, ty), &table, NO_TIME).unwrap();
        }
        game.try_move(Force::White, xy(1, 1), xy(2, 0), &table, NO_TIME).unwrap();
        assert!(game.promotion_pending().is_some());
        // Stalling on the promotion choice still burns the mover's clock.
        game.charge_active(Duration::from_secs(6));
        assert_eq!(
            game.status(),
            ChessGameStatus::Victory(Force::Black, VictoryReason::Flag)
        );
        assert_eq!(
            game.choose_promotion(Force::White, PieceKind::Queen, &table, NO_TIME),
            Err(GameError::GameOver)
        );
    }

    #[test]
    fn resignation() {
        let (mut game, _) = new_game();
        game.resign(Force::Black).unwrap();
        assert_eq!(
            game.status(),
            ChessGameStatus::Victory(Force::White, VictoryReason::Resignation)
        );
        assert_eq!(game.resign(Force::White), Err(GameError::GameOver));
    }
}
