use std::fmt;
use std::ops;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};


pub const NUM_ROWS: u8 = 8;
pub const NUM_COLS: u8 = 8;


// Rank in storage orientation: row 0 is the top of the board (Black's back
// rank), row 7 the bottom. Display flips are a client concern.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Row {
    idx: u8, // 0-based
}

impl Row {
    pub const fn from_zero_based(idx: u8) -> Self {
        assert!(idx < NUM_ROWS);
        Self { idx }
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub fn all() -> impl Iterator<Item = Self> + Clone {
        (0..NUM_ROWS).map(Self::from_zero_based)
    }
}

impl ops::Add<i8> for Row {
    type Output = Self;
    fn add(self, other: i8) -> Self::Output {
        Self::from_zero_based((self.to_zero_based() as i8 + other) as u8)
    }
}

impl ops::Sub for Row {
    type Output = i8;
    fn sub(self, other: Self) -> Self::Output {
        (self.to_zero_based() as i8) - (other.to_zero_based() as i8)
    }
}


// File: col 0 is the leftmost file in storage orientation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Col {
    idx: u8, // 0-based
}

impl Col {
    pub const fn from_zero_based(idx: u8) -> Col {
        assert!(idx < NUM_COLS);
        Col { idx }
    }
    pub const fn to_zero_based(self) -> u8 { self.idx }
    pub fn all() -> impl Iterator<Item = Self> + Clone {
        (0..NUM_COLS).map(Self::from_zero_based)
    }
}

impl ops::Add<i8> for Col {
    type Output = Self;
    fn add(self, other: i8) -> Self::Output {
        Self::from_zero_based((self.to_zero_based() as i8 + other) as u8)
    }
}

impl ops::Sub for Col {
    type Output = i8;
    fn sub(self, other: Self) -> Self::Output {
        (self.to_zero_based() as i8) - (other.to_zero_based() as i8)
    }
}


#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: Row,
    pub col: Col,
}

impl Coord {
    pub const fn new(row: Row, col: Col) -> Self { Self { row, col } }

    // Wire order: (file, rank).
    pub const fn from_xy(x: u8, y: u8) -> Self {
        Self { row: Row::from_zero_based(y), col: Col::from_zero_based(x) }
    }

    pub fn all() -> impl Iterator<Item = Coord> {
        (0..NUM_ROWS).flat_map(|row| {
            (0..NUM_COLS).map(move |col| {
                Coord { row: Row::from_zero_based(row), col: Col::from_zero_based(col) }
            })
        })
    }

    // Standard notation with White at the bottom: row 7 is rank 1.
    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.col.to_zero_based()) as char;
        let rank = NUM_ROWS - self.row.to_zero_based();
        format!("{file}{rank}")
    }

    // Bounds-checked offset application; offsets are (d_col, d_row) to match
    // the wire coordinate order.
    pub fn shifted(self, (dx, dy): (i8, i8)) -> Option<Coord> {
        let x = self.col.to_zero_based() as i8 + dx;
        let y = self.row.to_zero_based() as i8 + dy;
        if (0..NUM_COLS as i8).contains(&x) && (0..NUM_ROWS as i8).contains(&y) {
            Some(Coord::from_xy(x as u8, y as u8))
        } else {
            None
        }
    }
}

impl ops::Sub for Coord {
    type Output = (i8, i8);
    fn sub(self, other: Self) -> Self::Output {
        (self.col - other.col, self.row - other.row)
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord[{},{}]", self.col.to_zero_based(), self.row.to_zero_based())
    }
}

// Serialized as `[x, y]` to match the client protocol.
impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.col.to_zero_based())?;
        tup.serialize_element(&self.row.to_zero_based())?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordVisitor;
        impl<'de> Visitor<'de> for CoordVisitor {
            type Value = Coord;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a [file, rank] pair with both values in 0..8")
            }
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Coord, A::Error> {
                let x: u8 = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let y: u8 = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if x >= NUM_COLS || y >= NUM_ROWS {
                    return Err(de::Error::custom(format!("square [{x},{y}] is off the board")));
                }
                Ok(Coord::from_xy(x, y))
            }
        }
        deserializer.deserialize_tuple(2, CoordVisitor)
    }
}
