// Improvement potential. Combine integration tests together:
//   https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

use card_chess::coord::Coord;
use card_chess::force::Force;
use card_chess::grid::Grid;
use card_chess::piece::{PieceKind, PieceOnBoard};
use itertools::Itertools;


#[allow(dead_code)]
pub fn piece_from_ascii(ch: char) -> Option<(PieceKind, Force)> {
    let force = if ch.is_ascii_uppercase() { Force::White } else { Force::Black };
    let kind = match ch.to_ascii_uppercase() {
        'P' => PieceKind::Pawn,
        'N' => PieceKind::Knight,
        'B' => PieceKind::Bishop,
        'R' => PieceKind::Rook,
        'Q' => PieceKind::Queen,
        'K' => PieceKind::King,
        _ => return None,
    };
    Some((kind, force))
}

// Rows top to bottom, the way Black sees the board from across the table:
// row 0 is Black's back rank. Pieces are marked as already moved so that
// constructed positions do not grant pawn double pushes.
#[allow(dead_code)]
pub fn parse_grid(board_str: &str) -> Grid {
    let rows = board_str
        .split('\n')
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.split_ascii_whitespace().collect_vec())
        .collect_vec();
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|row| row.len() == 8));
    let mut grid = Grid::empty();
    for (y, row) in rows.iter().enumerate() {
        for (x, piece_str) in row.iter().enumerate() {
            assert_eq!(piece_str.chars().count(), 1, "invalid piece: {piece_str}");
            let ch = piece_str.chars().next().unwrap();
            if ch == '.' {
                continue;
            }
            let (kind, force) =
                piece_from_ascii(ch).unwrap_or_else(|| panic!("invalid piece: {ch}"));
            let mut piece = PieceOnBoard::new(kind, force);
            piece.has_moved = true;
            grid[Coord::from_xy(x as u8, y as u8)] = Some(piece);
        }
    }
    grid
}
