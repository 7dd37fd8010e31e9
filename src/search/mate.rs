use cozy_chess::Move;
use log::debug;

use crate::board::Position;
use crate::error::SearchError;
use crate::search::MateSearch;

/// Exhaustive forced-mate prover.
///
/// On the attacker's plies one working move is enough; on the defender's plies
/// every legal reply has to be refuted. Mates that land before the budget is
/// spent are accepted, so a line may be shorter than the budget but always ends
/// on the attacker's move.
#[derive(Default, Debug, Clone)]
pub struct MateProver {
    pub(crate) nodes: u64,
}

impl MateProver {
    pub fn nodes(&self) -> u64 { self.nodes }

    /// Returns the first forced mate in move-generation order, or `None` when
    /// no mate exists within `ply_budget` plies. An even budget is rounded down
    /// to the odd count that ends on the attacker's move.
    pub fn find_forced_mate(&mut self, pos: &mut Position, ply_budget: u32) -> Option<Vec<Move>> {
        let budget = if ply_budget % 2 == 0 { ply_budget.saturating_sub(1) } else { ply_budget };
        if budget == 0 { return None; }
        let entry_ply = pos.ply();
        let line = self.attack(pos, budget);
        debug_assert_eq!(pos.ply(), entry_ply, "search left moves on the board");
        debug!("mate proof budget={} nodes={} found={}", budget, self.nodes, line.is_some());
        line
    }

    fn attack(&mut self, pos: &mut Position, plies_left: u32) -> Option<Vec<Move>> {
        for mv in pos.legal_moves() {
            self.nodes += 1;
            let token = pos.apply_legal(mv);
            let rest = if pos.is_checkmate() {
                Some(Vec::new())
            } else if plies_left >= 3 {
                self.defend(pos, plies_left - 1)
            } else {
                None
            };
            pos.undo(token);
            if let Some(mut rest) = rest {
                rest.insert(0, mv);
                return Some(rest);
            }
        }
        None
    }

    // The reported line follows the first reply; every other reply must also
    // be mated for the attacker's move to count.
    fn defend(&mut self, pos: &mut Position, plies_left: u32) -> Option<Vec<Move>> {
        let replies = pos.legal_moves();
        // No replies and not mated (the caller checks mate first): stalemate
        if replies.is_empty() { return None; }
        let mut principal: Option<Vec<Move>> = None;
        for reply in replies {
            self.nodes += 1;
            let token = pos.apply_legal(reply);
            let cont = self.attack(pos, plies_left - 1);
            pos.undo(token);
            let mut cont = cont?;
            if principal.is_none() {
                cont.insert(0, reply);
                principal = Some(cont);
            }
        }
        principal
    }
}

impl MateSearch for MateProver {
    fn find_forced_mate(&mut self, pos: &mut Position, max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
        Ok(MateProver::find_forced_mate(self, pos, max_plies))
    }
}

/// Convenience wrapper around a fresh [`MateProver`].
pub fn find_forced_mate(pos: &mut Position, ply_budget: u32) -> Option<Vec<Move>> {
    MateProver::default().find_forced_mate(pos, ply_budget)
}
