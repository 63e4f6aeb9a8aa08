use serde::{Deserialize, Serialize};

use crate::force::Force;


// Client-generated opaque identity; survives reconnects.
pub type PlayerId = String;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    White,
    Black,
    Observer,
}

impl Seat {
    pub fn force(self) -> Option<Force> {
        match self {
            Seat::White => Some(Force::White),
            Seat::Black => Some(Force::Black),
            Seat::Observer => None,
        }
    }
}

impl From<Force> for Seat {
    fn from(force: Force) -> Self {
        match force {
            Force::White => Seat::White,
            Force::Black => Seat::Black,
        }
    }
}
