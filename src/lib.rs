// Forced-mate puzzle generation: random positions, mate proofs, UCI engine adapter
pub mod board;
pub mod engine;
pub mod error;
pub mod perft;
pub mod puzzle;
pub mod search;
pub mod source;
pub mod uci;

pub use board::Position;
pub use error::{EngineError, LineError, PuzzleError, RulesError, SearchError, SourceError};
pub use puzzle::{make_puzzle, PuzzleGenerator, PuzzleParams, PuzzleRecord, PuzzleResult};
