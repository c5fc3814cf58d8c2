use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::evaluation::{Evaluation, Evaluator};
use crate::movegen::{GameState, Move, MoveGenerator};
use crate::position::{Color, Position};

/// Outcome of a root search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    /// `None` when the root position has no legal moves.
    pub best_move: Option<Move>,
    pub evaluation: Evaluation,
    pub nodes: u64,
    pub depth: u32,
}

/// Fixed-depth minimax without pruning.
pub struct Search {
    evaluator: Evaluator,
    move_generator: MoveGenerator,
    nodes_searched: u64,
    stop: Option<Arc<AtomicBool>>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::new(),
            move_generator: MoveGenerator::new(),
            nodes_searched: 0,
            stop: None,
        }
    }

    /// A search that checks `stop` between root moves.
    pub fn with_stop_flag(stop: Arc<AtomicBool>) -> Self {
        Self {
            stop: Some(stop),
            ..Self::new()
        }
    }

    pub fn get_nodes_searched(&self) -> u64 {
        self.nodes_searched
    }

    /// Best move by static evaluation of every reply.
    pub fn find_best_one_ply(&mut self, board: &Position) -> (Option<Move>, Evaluation) {
        self.nodes_searched += 1;
        let moves = self.move_generator.generate_moves(board);
        if let Some(evaluation) = self.finished(board, &moves) {
            return (None, evaluation);
        }

        let mut best: Option<(Move, Evaluation)> = None;
        for mv in moves {
            let mut next = board.clone();
            next.apply(mv);
            self.nodes_searched += 1;
            let evaluation = self.evaluator.eval_static(&next).deepened();
            if improves(board.side_to_move, evaluation, best.map(|(_, e)| e)) {
                best = Some((mv, evaluation));
            }
        }
        split(best)
    }

    /// Best move `depth` plies deep.
    pub fn find_best_at_depth(&mut self, board: &Position, depth: u32) -> (Option<Move>, Evaluation) {
        if depth <= 1 {
            return self.find_best_one_ply(board);
        }

        self.nodes_searched += 1;
        let moves = self.move_generator.generate_moves(board);
        if let Some(evaluation) = self.finished(board, &moves) {
            return (None, evaluation);
        }

        let mut best: Option<(Move, Evaluation)> = None;
        for mv in moves {
            let evaluation = self.score_move(board, mv, depth);
            if improves(board.side_to_move, evaluation, best.map(|(_, e)| e)) {
                best = Some((mv, evaluation));
            }
        }
        split(best)
    }

    /// Root search. Stops early between root moves once the stop flag is
    /// raised, but always finishes the first one.
    pub fn find_best_move(&mut self, board: &Position, depth: u32) -> SearchResult {
        let depth = depth.max(1);
        self.nodes_searched = 1;
        info!(depth, fen = %board.to_fen(), "search started");

        let moves = self.move_generator.generate_moves(board);
        // A drawn-by-clock root still gets a move to play; only an empty move list ends here
        if moves.is_empty() {
            let evaluation = self.finished(board, &moves).unwrap_or(Evaluation::Draw);
            info!(%evaluation, "no legal moves");
            return SearchResult {
                best_move: None,
                evaluation,
                nodes: self.nodes_searched,
                depth,
            };
        }

        let mut best: Option<(Move, Evaluation)> = None;
        for (i, mv) in moves.into_iter().enumerate() {
            if i > 0 && self.stop_requested() {
                info!(searched = i, "search stopped");
                break;
            }

            let evaluation = if depth == 1 {
                let mut next = board.clone();
                next.apply(mv);
                self.nodes_searched += 1;
                self.evaluator.eval_static(&next).deepened()
            } else {
                self.score_move(board, mv, depth)
            };
            debug!(%mv, %evaluation, "root move");

            if improves(board.side_to_move, evaluation, best.map(|(_, e)| e)) {
                best = Some((mv, evaluation));
            }
        }

        let (best_move, evaluation) = split(best);
        info!(
            best = %best_move.map_or_else(|| "0000".to_string(), |m| m.to_uci()),
            %evaluation,
            nodes = self.nodes_searched,
            "search finished"
        );
        SearchResult {
            best_move,
            evaluation,
            nodes: self.nodes_searched,
            depth,
        }
    }

    // Value of `mv` searched to `depth` plies, seen from `board`.
    fn score_move(&mut self, board: &Position, mv: Move, depth: u32) -> Evaluation {
        let mut next = board.clone();
        next.apply(mv);
        let (_, evaluation) = self.find_best_at_depth(&next, depth - 1);
        evaluation.deepened()
    }

    // Mate, stalemate and the fifty-move rule all end the line here.
    fn finished(&self, board: &Position, moves: &[Move]) -> Option<Evaluation> {
        match self.move_generator.classify(board, moves) {
            GameState::Checkmate(winner) => Some(Evaluation::Mate { winner, plies: 0 }),
            GameState::Stalemate | GameState::FiftyMoveRule => Some(Evaluation::Draw),
            GameState::Ongoing => None,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::Relaxed))
    }
}

// White maximises, black minimises; ties keep the earlier move.
fn improves(side: Color, candidate: Evaluation, best: Option<Evaluation>) -> bool {
    match (best, side) {
        (None, _) => true,
        (Some(best), Color::White) => candidate > best,
        (Some(best), Color::Black) => candidate < best,
    }
}

fn split(best: Option<(Move, Evaluation)>) -> (Option<Move>, Evaluation) {
    match best {
        Some((mv, evaluation)) => (Some(mv), evaluation),
        None => (None, Evaluation::NEUTRAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE_MATES: &str = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";
    const BLACK_MATES: &str = "r5k1/8/8/8/8/8/5PPP/6K1 b - - 0 1";

    #[test]
    fn test_mate_in_one_at_depth_one() {
        let board = Position::from_fen(WHITE_MATES).unwrap();
        let mut search = Search::new();
        let (mv, evaluation) = search.find_best_one_ply(&board);
        assert_eq!(mv.unwrap().to_uci(), "a1a8");
        assert_eq!(
            evaluation,
            Evaluation::Mate {
                winner: Color::White,
                plies: 1
            }
        );
    }

    #[test]
    fn test_mate_in_one_preferred_deeper() {
        let board = Position::from_fen(WHITE_MATES).unwrap();
        let mut search = Search::new();
        for depth in [2, 3] {
            let result = search.find_best_move(&board, depth);
            assert_eq!(result.best_move.unwrap().to_uci(), "a1a8", "depth {}", depth);
            assert_eq!(
                result.evaluation,
                Evaluation::Mate {
                    winner: Color::White,
                    plies: 1
                }
            );
        }
    }

    #[test]
    fn test_black_finds_mate() {
        let board = Position::from_fen(BLACK_MATES).unwrap();
        let mut search = Search::new();
        let result = search.find_best_move(&board, 2);
        assert_eq!(result.best_move.unwrap().to_uci(), "a8a1");
        assert_eq!(
            result.evaluation,
            Evaluation::Mate {
                winner: Color::Black,
                plies: 1
            }
        );
    }

    #[test]
    fn test_terminal_root() {
        let mut search = Search::new();

        let mated = Position::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        let result = search.find_best_move(&mated, 3);
        assert_eq!(result.best_move, None);
        assert_eq!(
            result.evaluation,
            Evaluation::Mate {
                winner: Color::Black,
                plies: 0
            }
        );

        let stalemate = Position::from_fen("8/8/8/8/8/1q6/2k5/K7 w - - 0 1").unwrap();
        assert_eq!(search.find_best_one_ply(&stalemate), (None, Evaluation::Draw));
        assert_eq!(search.find_best_at_depth(&stalemate, 3), (None, Evaluation::Draw));
    }

    #[test]
    fn test_fifty_move_draw_ends_the_line() {
        let board = Position::from_fen("4k3/8/8/7p/8/8/8/4K2R b - - 99 80").unwrap();
        let mut drawn = board.clone();
        drawn.apply("e8d8".parse().unwrap());
        assert_eq!(drawn.halfmove_clock, 100);

        let mut search = Search::new();
        // A capture below would reset the clock; it must not be searched
        for depth in 1..=3 {
            assert_eq!(search.find_best_at_depth(&drawn, depth), (None, Evaluation::Draw));
        }

        let shallow = search.find_best_move(&board, 1);
        let deep = search.find_best_move(&board, 2);
        assert_eq!(shallow.evaluation, Evaluation::Draw);
        assert_eq!(deep.evaluation, Evaluation::Draw);
        assert_eq!(shallow.best_move, deep.best_move);
    }

    #[test]
    fn test_fifty_move_root_still_returns_a_move() {
        let board = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 100 80").unwrap();
        let result = Search::new().find_best_move(&board, 2);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn test_depth_one_matches_one_ply() {
        let board = Position::startpos();
        let mut search = Search::new();
        let (mv, evaluation) = search.find_best_at_depth(&board, 1);
        let result = search.find_best_move(&board, 1);
        assert_eq!(result.best_move, mv);
        assert_eq!(result.evaluation, evaluation);
        assert_eq!(result.depth, 1);
    }

    #[test]
    fn test_search_is_deterministic() {
        let board = Position::from_fen(
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
        )
        .unwrap();
        let first = Search::new().find_best_move(&board, 2);
        let second = Search::new().find_best_move(&board, 2);
        assert_eq!(first, second);
        assert!(first.nodes > 1);
    }

    #[test]
    fn test_raised_stop_flag_still_returns_a_move() {
        let board = Position::startpos();
        let stop = Arc::new(AtomicBool::new(true));
        let mut search = Search::with_stop_flag(stop);

        let result = search.find_best_move(&board, 3);
        let first = MoveGenerator::new().generate_moves(&board)[0];
        assert_eq!(result.best_move, Some(first));

        let mut unstopped = Search::new();
        assert!(unstopped.find_best_move(&board, 3).nodes > result.nodes);
    }
}
