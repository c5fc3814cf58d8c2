use crate::position::{Color, Piece};

/// A set of tiles, bit `i` standing for tile `i` (a1 = 0, h1 = 7, a8 = 56).
pub type Bitboard = u64;

const TILE_NAMES: [&str; 64] = [
    "a1", "b1", "c1", "d1", "e1", "f1", "g1", "h1",
    "a2", "b2", "c2", "d2", "e2", "f2", "g2", "h2",
    "a3", "b3", "c3", "d3", "e3", "f3", "g3", "h3",
    "a4", "b4", "c4", "d4", "e4", "f4", "g4", "h4",
    "a5", "b5", "c5", "d5", "e5", "f5", "g5", "h5",
    "a6", "b6", "c6", "d6", "e6", "f6", "g6", "h6",
    "a7", "b7", "c7", "d7", "e7", "f7", "g7", "h7",
    "a8", "b8", "c8", "d8", "e8", "f8", "g8", "h8",
];

// Indexed by [Color][Piece], piece order matching `Piece::ALL`.
const PIECE_SYMBOLS: [[char; 6]; 2] = [
    ['K', 'Q', 'B', 'N', 'R', 'P'],
    ['k', 'q', 'b', 'n', 'r', 'p'],
];

#[inline]
pub fn one_hot(tile: u8) -> Bitboard {
    1u64 << tile
}

#[inline]
pub fn tile(file: u8, rank: u8) -> u8 {
    file + 8 * rank
}

#[inline]
pub fn file_of(tile: u8) -> u8 {
    tile % 8
}

#[inline]
pub fn rank_of(tile: u8) -> u8 {
    tile / 8
}

/// Offsets a tile by whole files and ranks, returning `None` off the board.
pub fn offset(tile: u8, files: i8, ranks: i8) -> Option<u8> {
    let file = file_of(tile) as i8 + files;
    let rank = rank_of(tile) as i8 + ranks;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some((file + 8 * rank) as u8)
    } else {
        None
    }
}

/// Algebraic name of a tile, e.g. `e4`.
///
/// Panics if `tile >= 64`.
pub fn tile_name(tile: u8) -> &'static str {
    TILE_NAMES[tile as usize]
}

pub fn parse_tile(name: &str) -> Option<u8> {
    let bytes = name.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let (file, rank) = (bytes[0], bytes[1]);
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }
    Some(tile(file - b'a', rank - b'1'))
}

/// FEN letter for a piece: uppercase for white, lowercase for black.
pub fn piece_symbol(color: Color, piece: Piece) -> char {
    PIECE_SYMBOLS[color.index()][piece.index()]
}

pub fn piece_from_symbol(symbol: char) -> Option<(Color, Piece)> {
    for color in [Color::White, Color::Black] {
        for piece in Piece::ALL {
            if piece_symbol(color, piece) == symbol {
                return Some((color, piece));
            }
        }
    }
    None
}

/// Iterates over the tiles of a bitboard, lowest tile first.
pub fn tiles(bb: Bitboard) -> Tiles {
    Tiles(bb)
}

#[derive(Debug, Clone, Copy)]
pub struct Tiles(Bitboard);

impl Iterator for Tiles {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.0 == 0 {
            return None;
        }
        let tile = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(tile)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Tiles {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_enumerates_in_order() {
        let bb = one_hot(63) | one_hot(0) | one_hot(28);
        assert_eq!(tiles(bb).collect::<Vec<_>>(), vec![0, 28, 63]);
        assert_eq!(tiles(bb).len(), 3);
        assert_eq!(tiles(0).next(), None);
    }

    #[test]
    fn test_tile_names() {
        assert_eq!(tile_name(0), "a1");
        assert_eq!(tile_name(tile(4, 3)), "e4");
        assert_eq!(tile_name(63), "h8");
        assert_eq!(parse_tile("e4"), Some(28));
        assert_eq!(parse_tile("h8"), Some(63));
        assert_eq!(parse_tile("i1"), None);
        assert_eq!(parse_tile("a9"), None);
        assert_eq!(parse_tile("a"), None);
    }

    #[test]
    fn test_offset_clips_at_edges() {
        assert_eq!(offset(0, -1, 0), None);
        assert_eq!(offset(7, 1, 0), None);
        assert_eq!(offset(56, 0, 1), None);
        assert_eq!(offset(27, 1, 2), Some(44));
    }

    #[test]
    fn test_piece_symbols() {
        assert_eq!(piece_symbol(Color::White, Piece::Knight), 'N');
        assert_eq!(piece_symbol(Color::Black, Piece::Queen), 'q');
        assert_eq!(piece_from_symbol('k'), Some((Color::Black, Piece::King)));
        assert_eq!(piece_from_symbol('P'), Some((Color::White, Piece::Pawn)));
        assert_eq!(piece_from_symbol('x'), None);
    }
}
