use derive_new::new;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::force::Force;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub fn to_algebraic(self) -> &'static str {
        match self {
            PieceKind::Pawn => "",
            PieceKind::Knight => "N",
            PieceKind::Bishop => "B",
            PieceKind::Rook => "R",
            PieceKind::Queen => "Q",
            PieceKind::King => "K",
        }
    }

    pub fn is_valid_promotion_target(self) -> bool {
        !matches!(self, PieceKind::Pawn | PieceKind::King)
    }
}

// A piece is owned by exactly one grid cell; moving it is a transfer between
// cells. Promotion overwrites `kind` in place.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, new, Serialize, Deserialize)]
pub struct PieceOnBoard {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    #[serde(rename = "color")]
    pub force: Force,
    #[serde(rename = "moved", default)]
    #[new(value = "false")]
    pub has_moved: bool,
}
