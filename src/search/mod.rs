pub mod engine;
pub mod mate;

use cozy_chess::Move;

use crate::board::Position;
use crate::error::SearchError;

pub use engine::EngineMateSearch;
pub use mate::{find_forced_mate, MateProver};

/// Proves (or fails to prove) a forced mate from `pos` within `max_plies`.
///
/// `Ok(None)` means no mate was found; implementations must leave `pos` as
/// they found it.
pub trait MateSearch {
    fn find_forced_mate(&mut self, pos: &mut Position, max_plies: u32) -> Result<Option<Vec<Move>>, SearchError>;
}

impl<T: MateSearch + ?Sized> MateSearch for Box<T> {
    fn find_forced_mate(&mut self, pos: &mut Position, max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
        (**self).find_forced_mate(pos, max_plies)
    }
}
