use enum_map::EnumMap;
use serde::{Deserialize, Serialize};

use crate::board::{ChessGameStatus, DrawReason, VictoryReason};
use crate::cards::{AbilityCard, CardsByName, CustomMoveTable};
use crate::clock::WireTimers;
use crate::coord::Coord;
use crate::force::Force;
use crate::game::HalfMove;
use crate::grid::Grid;
use crate::piece::{PieceKind, PieceOnBoard};
use crate::player::{PlayerId, Seat};


pub type WireCards = EnumMap<Force, CardsByName>;

// The message taxonomy, matched exhaustively on both ends. Replaces the
// string-tag dispatch of earlier client revisions; the `type` field on the
// wire is unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    // Seats the sender in a room, creating the room on first join. Reconnects
    // use the same message with the same player id.
    Join {
        room_id: String,
        player_id: PlayerId,
    },
    JoinQueue {
        player_id: PlayerId,
        rating: u32,
    },
    LeaveQueue,
    Move {
        from: Coord,
        to: Coord,
    },
    ChoosePromotion {
        piece: PieceKind,
    },
    GetValidMoves {
        position: Coord,
    },
    Resign,
    OfferDraw,
    DrawResponse {
        accept: bool,
    },
    RequestUndo,
    UndoResponse {
        accept: bool,
    },
    Chat {
        message: String,
    },
    SaveCard {
        color: Force,
        name: String,
        card_data: AbilityCard,
    },
    ToggleCard {
        color: Force,
        name: String,
        enabled: bool,
    },
    DeleteCard {
        color: Force,
        name: String,
    },
    ResetCustomMoves,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Checkmate,
    Stalemate,
    Resign,
    Draw,
    Timeout,
    KingCaptured,
    Abandonment,
}

// `game_over` payload derived from a terminal status. `None` for active games.
pub fn game_over_event(status: ChessGameStatus) -> Option<ServerEvent> {
    let (reason, winner) = match status {
        ChessGameStatus::Active => return None,
        ChessGameStatus::Victory(force, reason) => {
            let reason = match reason {
                VictoryReason::Checkmate => GameOverReason::Checkmate,
                VictoryReason::KingCaptured => GameOverReason::KingCaptured,
                VictoryReason::Resignation => GameOverReason::Resign,
                VictoryReason::Flag => GameOverReason::Timeout,
                VictoryReason::Abandonment => GameOverReason::Abandonment,
            };
            (reason, Some(force))
        }
        ChessGameStatus::Draw(DrawReason::Stalemate) => (GameOverReason::Stalemate, None),
        ChessGameStatus::Draw(DrawReason::Agreement) => (GameOverReason::Draw, None),
    };
    Some(ServerEvent::GameOver { reason, winner })
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    // Destination not in the legality-filtered set; state unchanged.
    IllegalMove,
    // Intent from a seat whose color does not match the side to move.
    NotYourTurn,
    // No piece at the source square, or an opponent's piece.
    InvalidSelection,
    // Message for a room that no longer exists.
    StaleConnection,
    // Observers cannot act on the game.
    NotSeated,
    // Offer/undo bookkeeping violations and other per-message rejections.
    BadRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    // Full authoritative state; sent on join and on reconnect replay.
    Init {
        color: Seat,
        board: Grid,
        current_player: Force,
        custom_moves: CustomMoveTable,
        ability_cards: WireCards,
        timers: WireTimers,
        players_count: usize,
        move_log: Vec<HalfMove>,
        promotion_pending: Option<Coord>,
    },
    ValidMoves {
        position: Coord,
        moves: Vec<Coord>,
        attacks: Vec<Coord>,
    },
    Move {
        board: Grid,
        from: Coord,
        to: Coord,
        current_player: Force,
        timers: WireTimers,
        check: bool,
        checkmate: bool,
        stalemate: bool,
        captured: Option<PieceOnBoard>,
        promotion: Option<PieceKind>,
        promotion_pending: bool,
    },
    PromotionPending {
        at: Coord,
    },
    CardsUpdated {
        ability_cards: WireCards,
        custom_moves: CustomMoveTable,
    },
    CustomMovesUpdated {
        custom_moves: CustomMoveTable,
    },
    PlayerJoined {
        players_count: usize,
    },
    PlayerLeft {
        players_count: usize,
    },
    GameOver {
        reason: GameOverReason,
        winner: Option<Force>,
    },
    DrawOffered,
    DrawDeclined,
    UndoRequested,
    UndoAccepted {
        board: Grid,
        current_player: Force,
        timers: WireTimers,
        move_log: Vec<HalfMove>,
    },
    UndoDeclined,
    Chat {
        message: String,
    },
    Queued {
        rating: u32,
    },
    QueueUpdate {
        position: usize,
        queue_size: usize,
    },
    MatchFound {
        room_id: String,
    },
    Rejection {
        reason: RejectionReason,
        message: String,
    },
}
