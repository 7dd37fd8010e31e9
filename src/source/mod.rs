//! Candidate starting positions for the puzzle controller.

use std::path::Path;

use cozy_chess::Move;
use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::Position;
use crate::error::{RulesError, SourceError};

/// Produces candidate starting positions. Implementations never retry; the
/// controller decides whether a candidate is usable.
pub trait PositionSource {
    fn generate(&mut self, min_ply: u32, max_ply: u32) -> Position;
}

impl<T: PositionSource + ?Sized> PositionSource for Box<T> {
    fn generate(&mut self, min_ply: u32, max_ply: u32) -> Position { (**self).generate(min_ply, max_ply) }
}

/// Uniform random legal walk from the initial position.
pub struct RandomWalk {
    rng: SmallRng,
}

impl RandomWalk {
    pub fn seeded(seed: u64) -> Self { Self { rng: SmallRng::seed_from_u64(seed) } }

    pub fn from_entropy() -> Self { Self { rng: SmallRng::from_entropy() } }
}

impl PositionSource for RandomWalk {
    /// The walk length is drawn from `[min_ply, max_ply]`. A walk that reaches
    /// a position without legal moves stops early.
    fn generate(&mut self, min_ply: u32, max_ply: u32) -> Position {
        let (lo, hi) = if min_ply <= max_ply { (min_ply, max_ply) } else { (max_ply, min_ply) };
        let target = self.rng.gen_range(lo..=hi);
        let mut pos = Position::startpos();
        for _ in 0..target {
            match select_random_move(&pos, &mut self.rng) {
                Some(mv) => { let _ = pos.apply_legal(mv); }
                None => break,
            }
        }
        debug!("random walk: {} of {} plies -> {}", pos.ply(), target, pos.fen());
        pos
    }
}

fn select_random_move(pos: &Position, rng: &mut SmallRng) -> Option<Move> {
    let moves = pos.legal_moves();
    if moves.is_empty() { None } else { Some(moves[rng.gen_range(0..moves.len())]) }
}

/// Externally supplied positions, handed out in order and cycled. The ply
/// bounds are ignored.
#[derive(Clone, Debug)]
pub struct FenList {
    positions: Vec<Position>,
    next: usize,
}

impl FenList {
    pub fn new<S: AsRef<str>>(fens: &[S]) -> Result<Self, RulesError> {
        let positions = fens.iter().map(|f| Position::from_fen(f.as_ref())).collect::<Result<Vec<_>, _>>()?;
        if positions.is_empty() {
            return Err(RulesError::InvalidFen("empty FEN list".to_string()));
        }
        Ok(Self { positions, next: 0 })
    }

    /// One FEN or EPD per line; blank lines and `#` comments are skipped.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let s = std::fs::read_to_string(path)
            .map_err(|source| SourceError::Io { path: path.display().to_string(), source })?;
        let fens: Vec<String> = s.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(pad_epd)
            .collect();
        Ok(Self::new(&fens)?)
    }

    pub fn len(&self) -> usize { self.positions.len() }

    pub fn is_empty(&self) -> bool { self.positions.is_empty() }
}

impl PositionSource for FenList {
    fn generate(&mut self, _min_ply: u32, _max_ply: u32) -> Position {
        let pos = self.positions[self.next % self.positions.len()].clone();
        self.next = self.next.wrapping_add(1);
        pos
    }
}

// Support EPD (4 fields) by padding halfmove/fullmove
fn pad_epd(raw: &str) -> String {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() >= 6 {
        parts[0..6].join(" ")
    } else if parts.len() >= 4 {
        let mut v = parts[0..4].to_vec();
        v.push("0"); v.push("1"); v.join(" ")
    } else { raw.to_string() }
}
