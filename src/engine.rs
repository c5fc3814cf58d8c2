//! Shared engine state: one position, the last search result and a stop flag.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::evaluation::Evaluation;
use crate::movegen::Move;
use crate::position::Position;
use crate::search::{Search, SearchResult};

pub const DEFAULT_DEPTH: u32 = 3;
pub const MAX_DEPTH: u32 = 8;

/// Search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn with_depth(depth: u32) -> Self {
        Self {
            depth: clamp_depth(depth),
        }
    }
}

pub fn clamp_depth(depth: u32) -> u32 {
    depth.clamp(1, MAX_DEPTH)
}

struct EngineState {
    position: Position,
    best_move: Option<Move>,
    evaluation: Option<Evaluation>,
}

/// Engine shared between the command reader and a search thread.
///
/// `search` holds the state lock until it returns; `cancel` does not take
/// the lock, so another thread can stop a running search.
pub struct Engine {
    state: Mutex<EngineState>,
    stop: Arc<AtomicBool>,
    depth: AtomicU32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(EngineState {
                position: Position::startpos(),
                best_move: None,
                evaluation: None,
            }),
            stop: Arc::new(AtomicBool::new(false)),
            depth: AtomicU32::new(clamp_depth(config.depth)),
        }
    }

    // Every field is overwritten as a whole, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the position and forgets the previous result.
    pub fn set_position(&self, position: Position) {
        let mut state = self.lock();
        state.position = position;
        state.best_move = None;
        state.evaluation = None;
        self.stop.store(false, Ordering::SeqCst);
    }

    /// Searches the current position at the configured depth and stores the result.
    pub fn search(&self) -> SearchResult {
        let mut state = self.lock();
        let mut search = Search::with_stop_flag(Arc::clone(&self.stop));
        let result = search.find_best_move(&state.position, self.depth());
        state.best_move = result.best_move;
        state.evaluation = Some(result.evaluation);
        self.stop.store(false, Ordering::SeqCst);
        result
    }

    /// Asks a running search to stop after its current root move.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Drops a stop request that arrived after the search it targeted had ended.
    pub fn clear_cancel(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn position(&self) -> Position {
        self.lock().position.clone()
    }

    pub fn best_move(&self) -> Option<Move> {
        self.lock().best_move
    }

    pub fn evaluation(&self) -> Option<Evaluation> {
        self.lock().evaluation
    }

    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }

    /// Sets the search depth, clamped to `1..=MAX_DEPTH`.
    pub fn set_depth(&self, depth: u32) {
        self.depth.store(clamp_depth(depth), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::MoveGenerator;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_config_defaults_and_clamping() {
        assert_eq!(EngineConfig::default().depth, DEFAULT_DEPTH);
        assert_eq!(EngineConfig::with_depth(0).depth, 1);
        assert_eq!(EngineConfig::with_depth(99).depth, MAX_DEPTH);

        let engine = Engine::default();
        engine.set_depth(0);
        assert_eq!(engine.depth(), 1);
        engine.set_depth(5);
        assert_eq!(engine.depth(), 5);
    }

    #[test]
    fn test_search_stores_result_and_set_position_resets_it() {
        let engine = Engine::new(EngineConfig::with_depth(1));
        assert_eq!(engine.best_move(), None);
        assert_eq!(engine.evaluation(), None);

        let result = engine.search();
        assert!(result.best_move.is_some());
        assert_eq!(engine.best_move(), result.best_move);
        assert_eq!(engine.evaluation(), Some(result.evaluation));

        let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        engine.set_position(position.clone());
        assert_eq!(engine.position(), position);
        assert_eq!(engine.best_move(), None);
        assert_eq!(engine.evaluation(), None);
    }

    #[test]
    fn test_cancel_before_search_is_cleared_by_set_position() {
        let engine = Engine::new(EngineConfig::with_depth(2));
        engine.cancel();
        engine.set_position(Position::startpos());
        let full = engine.search();
        assert_eq!(engine.best_move(), full.best_move);
        // A cancelled search visits the first root move only
        engine.cancel();
        let partial = engine.search();
        assert!(partial.nodes < full.nodes);
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let engine = Arc::new(Engine::new(EngineConfig::with_depth(4)));
        let worker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.search())
        };

        thread::sleep(Duration::from_millis(50));
        engine.cancel();
        let result = worker.join().unwrap();

        let legal = MoveGenerator::new().generate_moves(&Position::startpos());
        assert!(legal.contains(&result.best_move.unwrap()));
        assert_eq!(engine.best_move(), result.best_move);
    }
}
