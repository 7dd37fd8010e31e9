use std::time::Duration;

use cozy_chess::Move;
use log::debug;

use crate::board::Position;
use crate::engine::{EngineSession, SearchOutcome};
use crate::error::SearchError;
use crate::search::MateSearch;
use crate::uci::SearchLimits;

/// Mate search delegated to an external UCI engine.
///
/// The engine's own mate score and principal variation are taken at face
/// value here; the returned line still has to pass replay validation.
pub struct EngineMateSearch {
    session: EngineSession,
    depth: u32,
    movetime: Option<Duration>,
}

impl EngineMateSearch {
    pub fn new(session: EngineSession, depth: u32) -> Self {
        Self { session, depth, movetime: None }
    }

    pub fn with_movetime(mut self, movetime: Duration) -> Self {
        self.movetime = Some(movetime);
        self
    }

    pub fn session(&self) -> &EngineSession { &self.session }

    pub fn session_mut(&mut self) -> &mut EngineSession { &mut self.session }

    pub fn into_session(self) -> EngineSession { self.session }

    fn limits(&self) -> SearchLimits {
        SearchLimits { depth: Some(self.depth), movetime: self.movetime, mate: None }
    }
}

impl MateSearch for EngineMateSearch {
    fn find_forced_mate(&mut self, pos: &mut Position, max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
        self.session.start()?;
        let limits = self.limits();
        let outcome = self.session.search(&pos.fen(), &limits)?;
        line_from_outcome(pos, &outcome, max_plies)
    }
}

/// Picks the mating line out of a finished search: the reported mate distance
/// must fit `max_plies`, and the PV (or, without a PV, bestmove + ponder) must
/// cover it.
pub fn line_from_outcome(pos: &Position, outcome: &SearchOutcome, max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
    let plies = match outcome.info.mate_plies() {
        Some(p) if p <= max_plies => p as usize,
        Some(p) => {
            debug!("engine mate in {} plies exceeds budget {}", p, max_plies);
            return Ok(None);
        }
        None => return Ok(None),
    };
    let fallback: Vec<String> = outcome.bestmove.iter().chain(outcome.ponder.iter()).cloned().collect();
    let uci_line = if !outcome.info.pv.is_empty() { &outcome.info.pv } else { &fallback };
    if uci_line.len() < plies {
        debug!("engine reported mate in {} plies but only {} moves of line", plies, uci_line.len());
        return Ok(None);
    }
    pos.uci_line_to_moves(&uci_line[..plies])
        .map(Some)
        .map_err(|(ply, mv)| SearchError::BadLine { ply, mv })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uci::InfoSnapshot;

    const BACK_RANK: &str = "2r3k1/5ppp/8/8/8/8/4RPPP/4R1K1 w - - 0 1";

    fn outcome(info_lines: &[&str], best: &str, ponder: Option<&str>) -> SearchOutcome {
        let mut info = InfoSnapshot::default();
        for l in info_lines { info.update_from_line(l); }
        SearchOutcome { bestmove: Some(best.to_string()), ponder: ponder.map(str::to_string), info, ..Default::default() }
    }

    #[test]
    fn takes_pv_prefix_of_mate_length() {
        let pos = Position::from_fen(BACK_RANK).unwrap();
        let out = outcome(&["info depth 4 score mate 2 pv e2e8 c8e8 e1e8 g8h8"], "e2e8", None);
        let line = line_from_outcome(&pos, &out, 3).unwrap().expect("mate line");
        let uci: Vec<String> = line.iter().map(|&m| pos.uci(m)).collect();
        assert_eq!(uci, vec!["e2e8", "c8e8", "e1e8"]);
    }

    #[test]
    fn mate_beyond_budget_or_centipawn_score_is_rejected() {
        let pos = Position::from_fen(BACK_RANK).unwrap();
        let far = outcome(&["info depth 9 score mate 3 pv e2e8 c8e8 e1e8"], "e2e8", None);
        assert!(line_from_outcome(&pos, &far, 3).unwrap().is_none());
        let cp = outcome(&["info depth 9 score cp 900 pv e2e8"], "e2e8", None);
        assert!(line_from_outcome(&pos, &cp, 3).unwrap().is_none());
    }

    #[test]
    fn falls_back_to_bestmove_without_pv() {
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/4R1K1 w - - 0 1").unwrap();
        let out = outcome(&["info depth 1 score mate 1"], "e1e8", None);
        let line = line_from_outcome(&pos, &out, 3).unwrap().expect("mate in one");
        assert_eq!(line.len(), 1);
    }

    #[test]
    fn illegal_pv_move_is_a_bad_line() {
        let pos = Position::from_fen(BACK_RANK).unwrap();
        let out = outcome(&["info depth 4 score mate 2 pv e2e8 a7a5 e1e8"], "e2e8", None);
        match line_from_outcome(&pos, &out, 3) {
            Err(SearchError::BadLine { ply, mv }) => { assert_eq!(ply, 1); assert_eq!(mv, "a7a5"); }
            other => panic!("expected BadLine, got {other:?}"),
        }
    }
}
