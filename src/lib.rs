#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod board;
pub mod cards;
pub mod clock;
pub mod coord;
pub mod event;
pub mod force;
pub mod game;
pub mod grid;
pub mod matchmaking;
pub mod piece;
pub mod player;
pub mod server;
pub mod test_util;
