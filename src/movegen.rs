use std::fmt;
use std::str::FromStr;

use crate::bitboard::{offset, one_hot, parse_tile, piece_symbol, rank_of, tile_name, tiles, Bitboard};
use crate::error::MoveParseError;
use crate::position::{Color, Piece, Position};

/// Plies without a capture or pawn move after which the game is drawn.
pub const FIFTY_MOVE_LIMIT: u32 = 100;

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1), (0, 1),
    (1, -1), (1, 0), (1, 1),
];

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2), (-1, 2), (1, -2), (-1, -2),
    (2, 1), (-2, 1), (2, -1), (-2, -1),
];

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (-1, 1), (1, -1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// A move from one tile to another, optionally promoting a pawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<Piece>,
}

impl Move {
    pub fn new(from: u8, to: u8) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn new_promotion(from: u8, to: u8, promotion: Piece) -> Self {
        Self {
            from,
            to,
            promotion: Some(promotion),
        }
    }

    /// Long algebraic notation, e.g. `e2e4` or `e7e8q`.
    pub fn to_uci(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.from >= 64 || self.to >= 64 {
            return write!(f, "0000");
        }
        write!(f, "{}{}", tile_name(self.from), tile_name(self.to))?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece_symbol(Color::Black, piece))?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = MoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MoveParseError::Malformed(s.to_string());
        if !s.is_ascii() || (s.len() != 4 && s.len() != 5) {
            return Err(malformed());
        }
        let from = parse_tile(&s[0..2]).ok_or_else(malformed)?;
        let to = parse_tile(&s[2..4]).ok_or_else(malformed)?;
        let promotion = match s.as_bytes().get(4) {
            None => None,
            Some(b'q') => Some(Piece::Queen),
            Some(b'r') => Some(Piece::Rook),
            Some(b'b') => Some(Piece::Bishop),
            Some(b'n') => Some(Piece::Knight),
            Some(_) => return Err(malformed()),
        };
        Ok(Move { from, to, promotion })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Ongoing,
    Checkmate(Color),  // Color is the winner
    Stalemate,
    FiftyMoveRule,
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameState::Ongoing)
    }

    /// +1 if white won, -1 if black won, 0 for draws and unfinished games.
    pub fn status(&self) -> i8 {
        match self {
            GameState::Checkmate(winner) => winner.sign(),
            _ => 0,
        }
    }
}

/// Pseudo-legal generation plus the clone-and-check legality filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveGenerator;

impl MoveGenerator {
    pub fn new() -> Self {
        Self
    }

    /// All legal moves for the side to move.
    pub fn generate_moves(&self, board: &Position) -> Vec<Move> {
        self.generate(board, false, false)
    }

    /// Moves for the side to move, in piece scan order then tile order.
    ///
    /// `ignore_pins` skips the self-check filter (pseudo-legal moves only);
    /// `ignore_castling` leaves castling out, which is what attack probing needs.
    pub fn generate(&self, board: &Position, ignore_pins: bool, ignore_castling: bool) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        let us = board.side_to_move;
        let own = board.color_bb(us);
        let enemy = board.color_bb(us.opposite());

        for piece in Piece::ALL {
            for from in tiles(board.pieces_of(us, piece)) {
                match piece {
                    Piece::King => push_steps(from, &KING_OFFSETS, own, &mut moves),
                    Piece::Queen => {
                        push_slides(from, &DIAGONALS, own, enemy, &mut moves);
                        push_slides(from, &ORTHOGONALS, own, enemy, &mut moves);
                    }
                    Piece::Bishop => push_slides(from, &DIAGONALS, own, enemy, &mut moves),
                    Piece::Knight => push_steps(from, &KNIGHT_OFFSETS, own, &mut moves),
                    Piece::Rook => push_slides(from, &ORTHOGONALS, own, enemy, &mut moves),
                    Piece::Pawn => self.push_pawn_moves(board, from, &mut moves),
                }
            }
            if piece == Piece::King && !ignore_castling {
                self.push_castling_moves(board, &mut moves);
            }
        }

        if !ignore_pins {
            moves.retain(|mv| self.is_move_valid(board, mv, false));
        }
        moves
    }

    fn push_pawn_moves(&self, board: &Position, from: u8, moves: &mut Vec<Move>) {
        let us = board.side_to_move;
        let occupied = board.occupied();
        let enemy = board.color_bb(us.opposite());
        // (forward, start rank, rank an en passant target may sit on)
        let (forward, start_rank, ep_rank) = match us {
            Color::White => (1, 1, 5),
            Color::Black => (-1, 6, 2),
        };

        if let Some(one) = offset(from, 0, forward) {
            if occupied & one_hot(one) == 0 {
                push_pawn_move(from, one, moves);
                if rank_of(from) == start_rank {
                    if let Some(two) = offset(from, 0, 2 * forward) {
                        if occupied & one_hot(two) == 0 {
                            moves.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for side in [-1, 1] {
            if let Some(to) = offset(from, side, forward) {
                let en_passant = board.en_passant == Some(to) && rank_of(to) == ep_rank;
                if enemy & one_hot(to) != 0 || en_passant {
                    push_pawn_move(from, to, moves);
                }
            }
        }
    }

    fn push_castling_moves(&self, board: &Position, moves: &mut Vec<Move>) {
        let us = board.side_to_move;
        let them = us.opposite();
        let home = match us {
            Color::White => 4,
            Color::Black => 60,
        };
        if board.pieces_of(us, Piece::King) & one_hot(home) == 0 {
            return;
        }
        let occupied = board.occupied();
        let rooks = board.pieces_of(us, Piece::Rook);
        let safe = |path: [u8; 3]| {
            path.iter().all(|&t| !self.is_square_under_attack(board, t, them))
        };

        if board.castling.kingside(us)
            && rooks & one_hot(home + 3) != 0
            && occupied & (one_hot(home + 1) | one_hot(home + 2)) == 0
            && safe([home, home + 1, home + 2])
        {
            moves.push(Move::new(home, home + 2));
        }

        if board.castling.queenside(us)
            && rooks & one_hot(home - 4) != 0
            && occupied & (one_hot(home - 1) | one_hot(home - 2) | one_hot(home - 3)) == 0
            && safe([home, home - 1, home - 2])
        {
            moves.push(Move::new(home, home - 2));
        }
    }

    /// Checks a single candidate move.
    ///
    /// Rejects tiles off the board, a source without a piece of the side to
    /// move and a destination holding one. Unless `ignore_pins` is set, the
    /// move is then played on a copy and rejected if it leaves the mover's
    /// king attacked. Movement rules are not checked here; that is the
    /// generator's job.
    pub fn is_move_valid(&self, board: &Position, mv: &Move, ignore_pins: bool) -> bool {
        if mv.from >= 64 || mv.to >= 64 {
            return false;
        }
        let own = board.color_bb(board.side_to_move);
        if own & one_hot(mv.from) == 0 || own & one_hot(mv.to) != 0 {
            return false;
        }
        if ignore_pins {
            return true;
        }

        let mut next = board.clone();
        next.apply(*mv);
        match next.king_tile(board.side_to_move) {
            Some(king) => !self.is_attacked(&next, king),
            None => true,
        }
    }

    /// Whether a piece of `attacker_color` attacks `square`.
    ///
    /// Pins and castling play no part, and pawns attack diagonally only.
    pub fn is_square_under_attack(&self, board: &Position, square: u8, attacker_color: Color) -> bool {
        let attackers = |piece: Piece| board.pieces_of(attacker_color, piece);

        // An attacking pawn stands one rank behind the square, seen from its side
        let behind = match attacker_color {
            Color::White => -1,
            Color::Black => 1,
        };
        let pawns = attackers(Piece::Pawn);
        for side in [-1, 1] {
            if let Some(t) = offset(square, side, behind) {
                if pawns & one_hot(t) != 0 {
                    return true;
                }
            }
        }

        if steps_hit(square, &KNIGHT_OFFSETS, attackers(Piece::Knight))
            || steps_hit(square, &KING_OFFSETS, attackers(Piece::King))
        {
            return true;
        }

        let occupied = board.occupied();
        let queens = attackers(Piece::Queen);
        rays_hit(square, &DIAGONALS, occupied, attackers(Piece::Bishop) | queens)
            || rays_hit(square, &ORTHOGONALS, occupied, attackers(Piece::Rook) | queens)
    }

    /// Whether the side to move attacks `square`.
    pub fn is_attacked(&self, board: &Position, square: u8) -> bool {
        self.is_square_under_attack(board, square, board.side_to_move)
    }

    pub fn is_king_in_check(&self, board: &Position, color: Color) -> bool {
        match board.king_tile(color) {
            Some(king) => self.is_square_under_attack(board, king, color.opposite()),
            None => false,  // No king found (malformed position)
        }
    }

    pub fn game_state(&self, board: &Position) -> GameState {
        let moves = self.generate_moves(board);
        self.classify(board, &moves)
    }

    /// Classifies a position whose legal moves are already known.
    pub fn classify(&self, board: &Position, legal_moves: &[Move]) -> GameState {
        if legal_moves.is_empty() {
            if self.is_king_in_check(board, board.side_to_move) {
                GameState::Checkmate(board.side_to_move.opposite())
            } else {
                GameState::Stalemate
            }
        } else if board.halfmove_clock >= FIFTY_MOVE_LIMIT {
            GameState::FiftyMoveRule
        } else {
            GameState::Ongoing
        }
    }

    /// `(is_terminal, status)` where status is +1 white won, -1 black won, 0 otherwise.
    pub fn is_done(&self, board: &Position) -> (bool, i8) {
        let state = self.game_state(board);
        (state.is_terminal(), state.status())
    }

    /// Reads a move in long algebraic notation and accepts it only if it is legal.
    pub fn legal_move_from_uci(&self, board: &Position, text: &str) -> Result<Move, MoveParseError> {
        let mv: Move = text.parse()?;
        if self.generate_moves(board).contains(&mv) {
            Ok(mv)
        } else {
            Err(MoveParseError::Illegal(text.to_string(), board.to_fen()))
        }
    }
}

fn push_pawn_move(from: u8, to: u8, moves: &mut Vec<Move>) {
    if rank_of(to) == 0 || rank_of(to) == 7 {
        for piece in Piece::PROMOTIONS {
            moves.push(Move::new_promotion(from, to, piece));
        }
    } else {
        moves.push(Move::new(from, to));
    }
}

fn push_steps(from: u8, offsets: &[(i8, i8)], own: Bitboard, moves: &mut Vec<Move>) {
    for &(df, dr) in offsets {
        if let Some(to) = offset(from, df, dr) {
            if own & one_hot(to) == 0 {
                moves.push(Move::new(from, to));
            }
        }
    }
}

fn push_slides(from: u8, directions: &[(i8, i8)], own: Bitboard, enemy: Bitboard, moves: &mut Vec<Move>) {
    for &(df, dr) in directions {
        let mut current = from;
        while let Some(to) = offset(current, df, dr) {
            let mask = one_hot(to);
            if own & mask != 0 {
                break;
            }
            moves.push(Move::new(from, to));
            if enemy & mask != 0 {
                break;
            }
            current = to;
        }
    }
}

fn steps_hit(square: u8, offsets: &[(i8, i8)], attackers: Bitboard) -> bool {
    offsets
        .iter()
        .filter_map(|&(df, dr)| offset(square, df, dr))
        .any(|t| attackers & one_hot(t) != 0)
}

// Walks out from `square`; the first occupied tile on each ray decides.
fn rays_hit(square: u8, directions: &[(i8, i8)], occupied: Bitboard, attackers: Bitboard) -> bool {
    for &(df, dr) in directions {
        let mut current = square;
        while let Some(t) = offset(current, df, dr) {
            let mask = one_hot(t);
            if occupied & mask != 0 {
                if attackers & mask != 0 {
                    return true;
                }
                break;
            }
            current = t;
        }
    }
    false
}
