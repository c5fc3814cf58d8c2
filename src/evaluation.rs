use std::cmp::Ordering;
use std::fmt;

use crate::bitboard::{file_of, rank_of, tiles};
use crate::movegen::{GameState, Move, MoveGenerator};
use crate::position::{Color, Piece, Position};

/// How good a position is for white.
///
/// Compares from white's point of view: a white mate beats every score,
/// every score beats a draw, and a draw beats a black mate. Quicker white
/// mates rank higher; slower black mates rank higher. Scores compare with
/// `f32::total_cmp`, with `-0.0` treated as `0.0`.
#[derive(Debug, Clone, Copy)]
pub enum Evaluation {
    /// Heuristic score in pawns, positive when white is better.
    Score(f32),
    Draw,
    /// Forced mate for `winner`, `plies` half-moves away (0: already mated).
    Mate { winner: Color, plies: u32 },
}

impl Evaluation {
    pub const NEUTRAL: Evaluation = Evaluation::Score(0.0);

    pub fn is_mate(&self) -> bool {
        matches!(self, Evaluation::Mate { .. })
    }

    /// The same evaluation seen one ply further up the tree.
    pub fn deepened(self) -> Evaluation {
        match self {
            Evaluation::Mate { winner, plies } => Evaluation::Mate {
                winner,
                plies: plies + 1,
            },
            other => other,
        }
    }

    fn class(&self) -> u8 {
        match self {
            Evaluation::Mate { winner: Color::Black, .. } => 0,
            Evaluation::Draw => 1,
            Evaluation::Score(_) => 2,
            Evaluation::Mate { winner: Color::White, .. } => 3,
        }
    }
}

impl Ord for Evaluation {
    fn cmp(&self, other: &Self) -> Ordering {
        use Evaluation::*;
        match (self, other) {
            // Adding 0.0 folds -0.0 into 0.0 so the two compare equal
            (Score(a), Score(b)) => (a + 0.0).total_cmp(&(b + 0.0)),
            (Mate { winner: Color::White, plies: a }, Mate { winner: Color::White, plies: b }) => {
                b.cmp(a)
            }
            (Mate { winner: Color::Black, plies: a }, Mate { winner: Color::Black, plies: b }) => {
                a.cmp(b)
            }
            _ => self.class().cmp(&other.class()),
        }
    }
}

impl PartialOrd for Evaluation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Evaluation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Evaluation {}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Evaluation::Score(score) => write!(f, "{:+.2}", score),
            Evaluation::Draw => write!(f, "draw"),
            Evaluation::Mate { winner: Color::White, plies } => write!(f, "M+{}", plies),
            Evaluation::Mate { winner: Color::Black, plies } => write!(f, "M-{}", plies),
        }
    }
}

/// Static evaluation: material, centralisation, castling rights, mobility
/// and pressure on central squares and the enemy king.
pub struct Evaluator {
    move_generator: MoveGenerator,

    // Piece values, in pawns
    pub queen_value: f32,
    pub bishop_value: f32,
    pub knight_value: f32,
    pub rook_value: f32,
    pub pawn_value: f32,

    // Castling rights still held
    pub kingside_castle_bonus: f32,
    pub queenside_castle_bonus: f32,

    pub tempo_bonus: f32,
    pub mobility_weight: f32,
    pub king_attack_bonus: f32,

    // Standing on a tile is worth (value * occupancy_weight + occupancy_base) * center
    pub occupancy_base: f32,
    pub occupancy_weight: f32,

    // Reaching a tile is worth reach_weight * center, shrinking with each extra move there
    pub reach_weight: f32,
    pub reach_decay: f32,

    // 1 / (1 + dx^2 + dy^2) with dx, dy the scaled distance from the middle
    pub center_table: [[f32; 8]; 8],
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            move_generator: MoveGenerator::new(),

            queen_value: 9.0,
            bishop_value: 3.15,
            knight_value: 3.0,
            rook_value: 5.0,
            pawn_value: 1.0,

            kingside_castle_bonus: 0.4,
            queenside_castle_bonus: 0.3,

            tempo_bonus: 0.15,
            mobility_weight: 0.1,
            king_attack_bonus: 0.5,

            occupancy_base: 0.13,
            occupancy_weight: 0.03,

            reach_weight: 0.08,
            reach_decay: 0.3,

            center_table: [
                [0.33, 0.40, 0.46, 0.49, 0.49, 0.46, 0.40, 0.33],
                [0.40, 0.49, 0.59, 0.65, 0.65, 0.59, 0.49, 0.40],
                [0.46, 0.59, 0.73, 0.83, 0.83, 0.73, 0.59, 0.46],
                [0.49, 0.65, 0.83, 0.96, 0.96, 0.83, 0.65, 0.49],
                [0.49, 0.65, 0.83, 0.96, 0.96, 0.83, 0.65, 0.49],
                [0.46, 0.59, 0.73, 0.83, 0.83, 0.73, 0.59, 0.46],
                [0.40, 0.49, 0.59, 0.65, 0.65, 0.59, 0.49, 0.40],
                [0.33, 0.40, 0.46, 0.49, 0.49, 0.46, 0.40, 0.33],
            ],
        }
    }

    /// Scores a position without searching.
    ///
    /// Finished games come back as `Draw` or a mate at distance zero.
    pub fn eval_static(&self, board: &Position) -> Evaluation {
        let moves = self.move_generator.generate_moves(board);
        match self.move_generator.classify(board, &moves) {
            GameState::Checkmate(winner) => return Evaluation::Mate { winner, plies: 0 },
            GameState::Stalemate | GameState::FiftyMoveRule => return Evaluation::Draw,
            GameState::Ongoing => {}
        }

        let white = self.side_score(board, Color::White, &moves);
        let black = self.side_score(board, Color::Black, &moves);
        Evaluation::Score(white - black)
    }

    // `on_move` holds the legal moves of the side to move.
    fn side_score(&self, board: &Position, color: Color, on_move: &[Move]) -> f32 {
        let mut score = self.material_and_placement(board, color);

        if board.castling.kingside(color) {
            score += self.kingside_castle_bonus;
        }
        if board.castling.queenside(color) {
            score += self.queenside_castle_bonus;
        }

        if board.side_to_move == color {
            score += self.tempo_bonus;
            score += self.activity(board, color, on_move);
        } else {
            // Hand the move over to see what this side could do
            let mut turned = board.clone();
            turned.side_to_move = color;
            turned.en_passant = None;
            let moves = self.move_generator.generate_moves(&turned);
            score += self.activity(&turned, color, &moves);
        }

        score
    }

    fn material_and_placement(&self, board: &Position, color: Color) -> f32 {
        let mut score = 0.0;
        for piece in Piece::ALL {
            let value = self.piece_value(piece);
            for square in tiles(board.pieces_of(color, piece)) {
                score += value;
                score += (value * self.occupancy_weight + self.occupancy_base) * self.center(square);
            }
        }
        score
    }

    fn activity(&self, board: &Position, color: Color, moves: &[Move]) -> f32 {
        let mut score = self.mobility_weight * moves.len() as f32;

        let mut reached = [0u8; 64];
        for mv in moves {
            let already = reached[mv.to as usize] as f32;
            score += self.reach_weight * self.center(mv.to) / (1.0 + self.reach_decay * already);
            reached[mv.to as usize] += 1;
        }

        if let Some(king) = board.king_tile(color.opposite()) {
            if self.move_generator.is_square_under_attack(board, king, color) {
                score += self.king_attack_bonus;
            }
        }

        score
    }

    fn piece_value(&self, piece: Piece) -> f32 {
        match piece {
            Piece::King => 0.0,
            Piece::Queen => self.queen_value,
            Piece::Bishop => self.bishop_value,
            Piece::Knight => self.knight_value,
            Piece::Rook => self.rook_value,
            Piece::Pawn => self.pawn_value,
        }
    }

    fn center(&self, square: u8) -> f32 {
        self.center_table[rank_of(square) as usize][file_of(square) as usize]
    }
}
