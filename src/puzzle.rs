//! Puzzle assembly: candidate position, mate proof, replay validation, retry.

use cozy_chess::Move;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::board::{validate_line, Position};
use crate::error::{EngineError, LineError, PuzzleError, SearchError};
use crate::search::{MateProver, MateSearch};
use crate::source::{PositionSource, RandomWalk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PuzzleParams {
    pub attempts: usize,
    pub min_ply: u32,
    pub max_ply: u32,
    pub ply_budget: u32,
    /// Reject lines shorter than `ply_budget`.
    pub require_full_line: bool,
}

impl Default for PuzzleParams {
    fn default() -> Self {
        Self { attempts: 50, min_ply: 3, max_ply: 6, ply_budget: 3, require_full_line: true }
    }
}

/// A validated puzzle: replaying `moves` from `fen` is legal and ends in mate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleResult {
    fen: String,
    moves: Vec<Move>,
}

impl PuzzleResult {
    /// Builds a result only if the line replays to checkmate.
    pub fn new(fen: String, moves: Vec<Move>) -> Result<Self, LineError> {
        validate_line(&fen, &moves)?;
        Ok(Self { fen, moves })
    }

    pub fn fen(&self) -> &str { &self.fen }

    pub fn moves(&self) -> &[Move] { &self.moves }

    pub fn solution_uci(&self) -> Vec<String> {
        let mut pos = match Position::from_fen(&self.fen) {
            Ok(p) => p,
            Err(_) => return self.moves.iter().map(|m| format!("{}", m)).collect(),
        };
        let mut out = Vec::with_capacity(self.moves.len());
        for &mv in &self.moves {
            out.push(pos.uci(mv));
            let _ = pos.apply_legal(mv);
        }
        out
    }

    pub fn to_record(&self) -> PuzzleRecord {
        PuzzleRecord { fen: self.fen.clone(), solution: self.solution_uci() }
    }
}

/// JSON shape of a puzzle: `{"fen": "...", "solution": ["e2e8", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    pub fen: String,
    pub solution: Vec<String>,
}

impl PuzzleRecord {
    /// Parses and re-validates a stored puzzle.
    pub fn into_result(self) -> Result<PuzzleResult, LineError> {
        let pos = Position::from_fen(&self.fen).map_err(|e| LineError::InvalidFen(e.to_string()))?;
        let moves = pos.uci_line_to_moves(&self.solution)
            .map_err(|(ply, mv)| LineError::IllegalMove { ply, mv })?;
        PuzzleResult::new(self.fen, moves)
    }
}

/// Per-run attempt counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStats {
    pub attempts: usize,
    pub no_mate: usize,
    pub too_short: usize,
    pub validation_failed: usize,
    pub timeouts: usize,
}

/// Runs the retry loop over a position source and a mate search.
pub struct PuzzleGenerator<S, M> {
    source: S,
    search: M,
    stats: AttemptStats,
}

impl<S: PositionSource, M: MateSearch> PuzzleGenerator<S, M> {
    pub fn new(source: S, search: M) -> Self {
        Self { source, search, stats: AttemptStats::default() }
    }

    pub fn stats(&self) -> AttemptStats { self.stats }

    pub fn search_mut(&mut self) -> &mut M { &mut self.search }

    pub fn into_parts(self) -> (S, M) { (self.source, self.search) }

    pub fn make_puzzle(&mut self, params: &PuzzleParams) -> Result<PuzzleResult, PuzzleError> {
        for attempt in 1..=params.attempts {
            self.stats.attempts += 1;
            let mut pos = self.source.generate(params.min_ply, params.max_ply);
            let fen = pos.fen();
            let line = match self.search.find_forced_mate(&mut pos, params.ply_budget) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("attempt {attempt}: no forced mate from {fen}");
                    self.stats.no_mate += 1;
                    continue;
                }
                Err(SearchError::BadLine { ply, mv }) => {
                    warn!("attempt {attempt}: engine line unplayable at ply {ply} ({mv}) from {fen}");
                    self.stats.validation_failed += 1;
                    continue;
                }
                Err(SearchError::Engine(e @ EngineError::SearchTimeout { .. })) => {
                    warn!("attempt {attempt}: {e}");
                    self.stats.timeouts += 1;
                    continue;
                }
                Err(SearchError::Engine(e)) => return Err(PuzzleError::Engine(e)),
            };
            if params.require_full_line && (line.len() as u32) < params.ply_budget {
                debug!("attempt {attempt}: mate in {} plies is shorter than {}", line.len(), params.ply_budget);
                self.stats.too_short += 1;
                continue;
            }
            match PuzzleResult::new(fen, line) {
                Ok(puzzle) => {
                    info!("puzzle found on attempt {attempt}: {}", puzzle.fen());
                    return Ok(puzzle);
                }
                Err(e) => {
                    warn!("attempt {attempt}: line failed validation: {e}");
                    self.stats.validation_failed += 1;
                }
            }
        }
        debug!("no puzzle: {:?}", self.stats);
        Err(PuzzleError::NoPuzzleFound { attempts: params.attempts })
    }
}

/// One-shot controller run.
pub fn make_puzzle<S: PositionSource, M: MateSearch>(source: S, search: M, params: &PuzzleParams) -> Result<PuzzleResult, PuzzleError> {
    PuzzleGenerator::new(source, search).make_puzzle(params)
}

/// Generates `count` puzzles in parallel with the exhaustive prover. Puzzle
/// `i` uses a random walk seeded with `seed + i`, so output is reproducible.
pub fn generate_batch(count: usize, params: &PuzzleParams, seed: u64) -> Vec<Result<PuzzleResult, PuzzleError>> {
    (0..count).into_par_iter().map(|i| {
        let source = RandomWalk::seeded(seed.wrapping_add(i as u64));
        make_puzzle(source, MateProver::default(), params)
    }).collect()
}
