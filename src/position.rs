use std::fmt;

use crate::bitboard::{
    file_of, one_hot, parse_tile, piece_from_symbol, piece_symbol, rank_of, tile, tile_name,
    Bitboard,
};
use crate::error::FenError;
use crate::movegen::Move;

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Piece {
    King,
    Queen,
    Bishop,
    Knight,
    Rook,
    Pawn,
}

impl Piece {
    /// Scan order used by the move generator and by `Position::query`.
    pub const ALL: [Piece; 6] = [
        Piece::King,
        Piece::Queen,
        Piece::Bishop,
        Piece::Knight,
        Piece::Rook,
        Piece::Pawn,
    ];

    /// Pieces a pawn may promote to, most valuable first.
    pub const PROMOTIONS: [Piece; 4] = [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// +1 for white, -1 for black.
    pub fn sign(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_kingside: true,
        white_queenside: true,
        black_kingside: true,
        black_queenside: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_kingside: false,
        white_queenside: false,
        black_kingside: false,
        black_queenside: false,
    };

    pub fn kingside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_kingside,
            Color::Black => self.black_kingside,
        }
    }

    pub fn queenside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_queenside,
            Color::Black => self.black_queenside,
        }
    }

    pub fn any(&self) -> bool {
        self.white_kingside || self.white_queenside || self.black_kingside || self.black_queenside
    }

    fn clear(&mut self, color: Color) {
        match color {
            Color::White => {
                self.white_kingside = false;
                self.white_queenside = false;
            }
            Color::Black => {
                self.black_kingside = false;
                self.black_queenside = false;
            }
        }
    }

    // A move touching a rook's home corner, from or to, ends that right.
    fn clear_corner(&mut self, square: u8) {
        match square {
            0 => self.white_queenside = false,
            7 => self.white_kingside = false,
            56 => self.black_queenside = false,
            63 => self.black_kingside = false,
            _ => {}
        }
    }

    fn from_fen(field: &str) -> Result<Self, FenError> {
        let mut rights = CastlingRights::NONE;
        if field == "-" {
            return Ok(rights);
        }
        for c in field.chars() {
            let slot = match c {
                'K' => &mut rights.white_kingside,
                'Q' => &mut rights.white_queenside,
                'k' => &mut rights.black_kingside,
                'q' => &mut rights.black_queenside,
                _ => {
                    return Err(FenError::InvalidCastlingRights(format!(
                        "invalid character '{}' in '{}'",
                        c, field
                    )))
                }
            };
            if *slot {
                return Err(FenError::InvalidCastlingRights(format!(
                    "duplicate '{}' in '{}'",
                    c, field
                )));
            }
            *slot = true;
        }
        Ok(rights)
    }

    fn to_fen(self) -> String {
        if !self.any() {
            return "-".to_string();
        }
        let mut field = String::with_capacity(4);
        if self.white_kingside {
            field.push('K');
        }
        if self.white_queenside {
            field.push('Q');
        }
        if self.black_kingside {
            field.push('k');
        }
        if self.black_queenside {
            field.push('q');
        }
        field
    }
}

/// Full board state: where the pieces are plus the rights and clocks FEN carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub colors: [Bitboard; 2],  // White, Black
    pub pieces: [Bitboard; 6],  // King, Queen, Bishop, Knight, Rook, Pawn
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<u8>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    pub fn startpos() -> Self {
        Self {
            colors: [
                0x0000_0000_0000_FFFF,
                0xFFFF_0000_0000_0000,
            ],
            pieces: [
                0x1000_0000_0000_0010,  // Kings
                0x0800_0000_0000_0008,  // Queens
                0x2400_0000_0000_0024,  // Bishops
                0x4200_0000_0000_0042,  // Knights
                0x8100_0000_0000_0081,  // Rooks
                0x00FF_0000_0000_FF00,  // Pawns
            ],
            side_to_move: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    fn empty() -> Self {
        Self {
            colors: [0; 2],
            pieces: [0; 6],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(FenError::InvalidFieldCount(fields.len()));
        }

        let mut position = Position::empty();
        position.place_pieces(fields[0])?;

        position.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidSideToMove(other.to_string())),
        };

        position.castling = CastlingRights::from_fen(fields[2])?;

        position.en_passant = match fields[3] {
            "-" => None,
            square => {
                let ep = parse_tile(square)
                    .filter(|&t| rank_of(t) == 2 || rank_of(t) == 5)
                    .ok_or_else(|| FenError::InvalidEnPassantSquare(square.to_string()))?;
                Some(ep)
            }
        };

        position.halfmove_clock = fields[4]
            .parse::<u32>()
            .map_err(|_| FenError::InvalidHalfmoveClock(fields[4].to_string()))?;

        position.fullmove_number = fields[5]
            .parse::<u32>()
            .ok()
            .filter(|&n| n >= 1)
            .ok_or_else(|| FenError::InvalidFullmoveNumber(fields[5].to_string()))?;

        for (color, name) in [(Color::White, "white"), (Color::Black, "black")] {
            let kings = position.pieces_of(color, Piece::King).count_ones();
            if kings != 1 {
                return Err(FenError::KingCount(name, kings));
            }
        }

        Ok(position)
    }

    fn place_pieces(&mut self, placement: &str) -> Result<(), FenError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        for (i, text) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "invalid run length '{}' in rank {}",
                            c,
                            rank + 1
                        )));
                    }
                    file += skip as u8;
                } else {
                    let (color, piece) = piece_from_symbol(c).ok_or_else(|| {
                        FenError::InvalidPiecePlacement(format!(
                            "invalid character '{}' in rank {}",
                            c,
                            rank + 1
                        ))
                    })?;
                    if file >= 8 {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "rank {} has more than 8 files",
                            rank + 1
                        )));
                    }
                    let mask = one_hot(tile(file, rank));
                    self.colors[color.index()] |= mask;
                    self.pieces[piece.index()] |= mask;
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "rank {} has more than 8 files",
                        rank + 1
                    )));
                }
            }
            if file != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} does not cover 8 files",
                    rank + 1
                )));
            }
        }
        Ok(())
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.query(tile(file, rank)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece_symbol(color, piece));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        let ep = self.en_passant.map_or("-", tile_name);

        format!(
            "{} {} {} {} {} {}",
            fen,
            side,
            self.castling.to_fen(),
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    #[inline]
    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn pieces_of(&self, color: Color, piece: Piece) -> Bitboard {
        self.colors[color.index()] & self.pieces[piece.index()]
    }

    pub fn king_tile(&self, color: Color) -> Option<u8> {
        let kings = self.pieces_of(color, Piece::King);
        (kings != 0).then(|| kings.trailing_zeros() as u8)
    }

    /// What stands on `square`, if anything.
    pub fn query(&self, square: u8) -> Option<(Color, Piece)> {
        let mask = one_hot(square);
        for piece in Piece::ALL {
            if self.pieces[piece.index()] & mask != 0 {
                let color = if self.colors[Color::White.index()] & mask != 0 {
                    Color::White
                } else {
                    Color::Black
                };
                return Some((color, piece));
            }
        }
        None
    }

    /// Plays one ply in place.
    ///
    /// The move is trusted: it should come from the legal move generator.
    /// Panics if the side to move has no piece on `mv.from`, which only
    /// happens on a corrupted position or a generator bug.
    pub fn apply(&mut self, mv: Move) {
        let us = self.side_to_move;
        let them = us.opposite();
        let from_mask = one_hot(mv.from);
        let to_mask = one_hot(mv.to);

        let piece = match self.query(mv.from) {
            Some((color, piece)) if color == us => piece,
            _ => panic!("apply {}: no {:?} piece on {}", mv, us, tile_name(mv.from)),
        };

        let mut captured = self.colors[them.index()] & to_mask != 0;

        // Lift the mover
        self.colors[us.index()] &= !from_mask;
        self.pieces[piece.index()] &= !from_mask;

        // En passant: the captured pawn sits behind the target tile
        let (ep_rank, behind) = match us {
            Color::White => (5, -8),
            Color::Black => (2, 8),
        };
        if piece == Piece::Pawn
            && Some(mv.to) == self.en_passant
            && rank_of(mv.to) == ep_rank
            && file_of(mv.from) != file_of(mv.to)
        {
            let victim = (mv.to as i8 + behind) as u8;
            let victim_mask = one_hot(victim);
            if self.pieces_of(them, Piece::Pawn) & victim_mask != 0 {
                self.colors[them.index()] &= !victim_mask;
                self.pieces[Piece::Pawn.index()] &= !victim_mask;
                captured = true;
            }
        }

        // Whatever stood on the destination is gone
        for bb in self.pieces.iter_mut() {
            *bb &= !to_mask;
        }
        self.colors[them.index()] &= !to_mask;

        let last_rank = match us {
            Color::White => 7,
            Color::Black => 0,
        };
        let placed = if piece == Piece::Pawn && rank_of(mv.to) == last_rank {
            mv.promotion.unwrap_or(Piece::Queen)
        } else {
            piece
        };
        self.colors[us.index()] |= to_mask;
        self.pieces[placed.index()] |= to_mask;

        if piece == Piece::King {
            if let Some((rook_from, rook_to)) = self.castling_rook_path(mv, us) {
                let rook_from_mask = one_hot(rook_from);
                let rook_to_mask = one_hot(rook_to);
                self.colors[us.index()] = (self.colors[us.index()] & !rook_from_mask) | rook_to_mask;
                self.pieces[Piece::Rook.index()] =
                    (self.pieces[Piece::Rook.index()] & !rook_from_mask) | rook_to_mask;
            }
            self.castling.clear(us);
        }
        self.castling.clear_corner(mv.from);
        self.castling.clear_corner(mv.to);

        self.en_passant = None;
        if piece == Piece::Pawn && mv.from.abs_diff(mv.to) == 16 {
            self.en_passant = Some((mv.from + mv.to) / 2);
        }

        if piece == Piece::Pawn || captured {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if us == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        self.side_to_move = them;
    }

    // Rook hop for a king move that is a castle the side still has the right to.
    fn castling_rook_path(&self, mv: Move, us: Color) -> Option<(u8, u8)> {
        let home = match us {
            Color::White => 4,
            Color::Black => 60,
        };
        if mv.from != home {
            return None;
        }
        let (rook_from, rook_to) = if mv.to == home + 2 && self.castling.kingside(us) {
            (home + 3, home + 1)
        } else if mv.to == home - 2 && self.castling.queenside(us) {
            (home - 4, home - 1)
        } else {
            return None;
        };
        // The lifted king already left `home`, so only the rook is checked
        (self.pieces_of(us, Piece::Rook) & one_hot(rook_from) != 0).then_some((rook_from, rook_to))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut result = String::new();
        for rank in (0..8).rev() {
            result.push((b'1' + rank) as char);
            result.push(' ');
            for file in 0..8 {
                match self.query(tile(file, rank)) {
                    Some((color, piece)) => result.push(piece_symbol(color, piece)),
                    None => result.push('.'),
                }
                if file < 7 {
                    result.push(' ');
                }
            }
            result.push('\n');
        }
        result.push_str("  a b c d e f g h\n");
        write!(f, "{}", result)
    }
}
