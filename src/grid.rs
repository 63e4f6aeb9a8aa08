use std::fmt;
use std::ops;

use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::coord::{Col, Coord, Row, NUM_COLS, NUM_ROWS};
use crate::force::Force;
use crate::piece::{PieceKind, PieceOnBoard};


// Pure container: 64 cells, each empty or owning one piece. No rule knowledge.
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    data: [[Option<PieceOnBoard>; NUM_COLS as usize]; NUM_ROWS as usize],
}

impl Grid {
    pub fn empty() -> Grid { Grid { data: Default::default() } }

    pub fn starting() -> Grid {
        use PieceKind::*;
        let back_row = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        let mut grid = Grid::empty();
        for (col, kind) in Col::all().zip(back_row) {
            grid[Coord::new(Row::from_zero_based(0), col)] =
                Some(PieceOnBoard::new(kind, Force::Black));
            grid[Coord::new(Row::from_zero_based(7), col)] =
                Some(PieceOnBoard::new(kind, Force::White));
        }
        for col in Col::all() {
            grid[Coord::new(Row::from_zero_based(1), col)] =
                Some(PieceOnBoard::new(Pawn, Force::Black));
            grid[Coord::new(Row::from_zero_based(6), col)] =
                Some(PieceOnBoard::new(Pawn, Force::White));
        }
        grid
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Coord, PieceOnBoard)> + '_ {
        Coord::all().filter_map(|pos| self[pos].map(|piece| (pos, piece)))
    }

    pub fn find_king(&self, force: Force) -> Option<Coord> {
        self.pieces()
            .find(|(_, piece)| piece.kind == PieceKind::King && piece.force == force)
            .map(|(pos, _)| pos)
    }
}

impl ops::Index<Coord> for Grid {
    type Output = Option<PieceOnBoard>;
    fn index(&self, pos: Coord) -> &Self::Output {
        &self.data[pos.row.to_zero_based() as usize][pos.col.to_zero_based() as usize]
    }
}

impl ops::IndexMut<Coord> for Grid {
    fn index_mut(&mut self, pos: Coord) -> &mut Self::Output {
        &mut self.data[pos.row.to_zero_based() as usize][pos.col.to_zero_based() as usize]
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Grid ")?;
        f.debug_map()
            .entries(self.pieces().map(|(pos, piece)| {
                (format!("{pos:?}"), format!("{:?}-{:?}", piece.force, piece.kind))
            }))
            .finish()
    }
}

// The wire format is file-major: `board[x][y]`, inherited from the clients.
impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let columns: Vec<Vec<Option<PieceOnBoard>>> = Col::all()
            .map(|col| Row::all().map(|row| self[Coord::new(row, col)]).collect())
            .collect();
        columns.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Grid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let columns: Vec<Vec<Option<PieceOnBoard>>> = Vec::deserialize(deserializer)?;
        if columns.len() != NUM_COLS as usize
            || columns.iter().any(|rows| rows.len() != NUM_ROWS as usize)
        {
            return Err(D::Error::custom("board must be an 8x8 array"));
        }
        let mut grid = Grid::empty();
        for (x, rows) in columns.into_iter().enumerate() {
            for (y, piece) in rows.into_iter().enumerate() {
                grid[Coord::from_xy(x as u8, y as u8)] = piece;
            }
        }
        Ok(grid)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starting_layout() {
        let grid = Grid::starting();
        assert_eq!(grid.pieces().count(), 32);
        assert_eq!(grid.find_king(Force::White), Some(Coord::from_xy(4, 7)));
        assert_eq!(grid.find_king(Force::Black), Some(Coord::from_xy(4, 0)));
        let e2 = grid[Coord::from_xy(4, 6)].unwrap();
        assert_eq!((e2.kind, e2.force, e2.has_moved), (PieceKind::Pawn, Force::White, false));
    }

    #[test]
    fn wire_roundtrip() {
        let grid = Grid::starting();
        let encoded = serde_json::to_value(&grid).unwrap();
        // File-major: board[0][0] is the a8 rook in storage orientation.
        assert_eq!(encoded[0][0]["type"], "rook");
        assert_eq!(encoded[0][0]["color"], "black");
        assert_eq!(encoded[0][2], serde_json::Value::Null);
        let decoded: Grid = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, grid);
    }
}
