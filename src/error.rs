use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineState;

/// Failures reported by the rules adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RulesError {
    #[error("FEN error: {0}")]
    InvalidFen(String),
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// Failures loading candidate positions from outside the process.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Why a candidate line failed replay from its starting FEN.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,
    #[error("FEN error: {0}")]
    InvalidFen(String),
    #[error("illegal move {mv} at ply {ply}")]
    IllegalMove { ply: usize, mv: String },
    #[error("line does not end in checkmate")]
    NotCheckmate,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine startup failed: {0}")]
    StartupFailed(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("search timed out after {elapsed_ms} ms")]
    SearchTimeout { elapsed_ms: u64 },
    #[error("no {0} from engine in time")]
    NoResponse(String),
    #[error("engine not ready (state {0:?})")]
    NotReady(EngineState),
    #[error("a search is already outstanding")]
    Busy,
    #[error("search request has no depth, movetime or mate limit")]
    Unbounded,
}

impl EngineError {
    pub(crate) fn timeout(elapsed: Duration) -> Self {
        EngineError::SearchTimeout { elapsed_ms: elapsed.as_millis() as u64 }
    }

    /// True when retrying on this session is pointless. A timed-out session
    /// is terminated but [`crate::engine::EngineSession::start`] respawns it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::SearchTimeout { .. } | EngineError::Unbounded | EngineError::Busy)
    }
}

/// What a mate search may fail with. "No mate" is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("engine line unplayable at ply {ply}: {mv}")]
    BadLine { ply: usize, mv: String },
}

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("no puzzle found after {attempts} attempts")]
    NoPuzzleFound { attempts: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}
