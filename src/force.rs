use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Force {
    White,
    Black,
}

impl Force {
    pub fn opponent(self) -> Force {
        match self {
            Force::White => Force::Black,
            Force::Black => Force::White,
        }
    }

    // Direction of pawn travel along the row axis. Row 0 is Black's back rank
    // in storage orientation, so White pawns walk towards smaller rows.
    pub fn forward(self) -> i8 {
        match self {
            Force::White => -1,
            Force::Black => 1,
        }
    }
}
