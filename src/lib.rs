pub mod bitboard;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod movegen;
pub mod perft;
pub mod position;
pub mod search;
pub mod uci;

pub use engine::{Engine, EngineConfig};
pub use error::{FenError, MoveParseError};
pub use evaluation::{Evaluation, Evaluator};
pub use movegen::{GameState, Move, MoveGenerator};
pub use position::{CastlingRights, Color, Piece, Position};
pub use search::{Search, SearchResult};
