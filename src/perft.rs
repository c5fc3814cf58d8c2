//! Move path enumeration, used to check the generator against known counts.

use crate::movegen::{Move, MoveGenerator};
use crate::position::Position;

/// Number of leaf positions `depth` plies below `board`.
pub fn perft(generator: &MoveGenerator, board: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generator.generate_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for mv in moves {
        let mut next = board.clone();
        next.apply(mv);
        nodes += perft(generator, &next, depth - 1);
    }
    nodes
}

/// Perft split by root move, in generation order.
pub fn divide(generator: &MoveGenerator, board: &Position, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }
    generator
        .generate_moves(board)
        .into_iter()
        .map(|mv| {
            let mut next = board.clone();
            next.apply(mv);
            (mv, perft(generator, &next, depth - 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perft_initial_position() {
        let board = Position::startpos();
        let generator = MoveGenerator::new();

        assert_eq!(perft(&generator, &board, 0), 1);
        assert_eq!(perft(&generator, &board, 1), 20);
        assert_eq!(perft(&generator, &board, 2), 400);
        assert_eq!(perft(&generator, &board, 3), 8902);
    }

    #[test]
    fn test_perft_initial_position_depth_4() {
        let generator = MoveGenerator::new();
        assert_eq!(perft(&generator, &Position::startpos(), 4), 197_281);
    }

    #[test]
    fn test_perft_kiwipete() {
        // Castling, en passant, promotions and pins all show up here
        let board = Position::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let generator = MoveGenerator::new();
        assert_eq!(perft(&generator, &board, 1), 48);
        assert_eq!(perft(&generator, &board, 2), 2039);
    }

    #[test]
    fn test_perft_endgame_en_passant() {
        let board = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        let generator = MoveGenerator::new();
        assert_eq!(perft(&generator, &board, 1), 14);
        assert_eq!(perft(&generator, &board, 2), 191);
        assert_eq!(perft(&generator, &board, 3), 2812);
    }

    #[test]
    fn test_perft_promotions() {
        let board = Position::from_fen(
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        )
        .unwrap();
        let generator = MoveGenerator::new();
        assert_eq!(perft(&generator, &board, 1), 6);
        assert_eq!(perft(&generator, &board, 2), 264);
        assert_eq!(perft(&generator, &board, 3), 9467);
    }

    #[test]
    fn test_divide_sums_to_perft() {
        let board = Position::startpos();
        let generator = MoveGenerator::new();
        let split = divide(&generator, &board, 2);
        assert_eq!(split.len(), 20);
        assert!(split.iter().all(|&(_, n)| n == 20));
        assert_eq!(split.iter().map(|&(_, n)| n).sum::<u64>(), 400);
    }
}
