use cozy_chess::{Board as CozyBoard, Color, File, Move, Piece, Square};

use crate::error::{LineError, RulesError};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Proof that a move was applied; must be handed back to [`Position::undo`]
/// in LIFO order.
#[must_use = "an applied move must be undone with its token"]
#[derive(Debug, PartialEq, Eq)]
pub struct UndoToken {
    ply: usize,
}

#[derive(Clone, Debug)]
struct Undo {
    prev: CozyBoard,
    mv: Move,
}

/// Mutable board with an explicit make/unmake stack. The root board is kept so
/// the moves played since construction can be replayed.
#[derive(Clone, Debug)]
pub struct Position {
    board: CozyBoard,
    root: CozyBoard,
    stack: Vec<Undo>,
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_board(CozyBoard::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        CozyBoard::from_fen(fen.trim(), false)
            .map(Self::from_board)
            .map_err(|e| RulesError::InvalidFen(format!("{fen}: {e:?}")))
    }

    fn from_board(board: CozyBoard) -> Self {
        Self { root: board.clone(), board, stack: Vec::with_capacity(64) }
    }

    pub fn board(&self) -> &CozyBoard { &self.board }

    pub fn fen(&self) -> String { format!("{}", self.board) }

    /// FEN of the position this value was created from.
    pub fn root_fen(&self) -> String { format!("{}", self.root) }

    pub fn side_to_move(&self) -> Color { self.board.side_to_move() }

    /// Moves applied since construction, oldest first.
    pub fn moves_played(&self) -> Vec<Move> { self.stack.iter().map(|u| u.mv).collect() }

    pub fn ply(&self) -> usize { self.stack.len() }

    /// Legal moves in the generator's order, which is stable for a given board.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut out = Vec::with_capacity(64);
        self.board.generate_moves(|ml| { out.extend(ml); false });
        out
    }

    pub fn legal_moves_count(&self) -> usize {
        let mut ct = 0usize;
        self.board.generate_moves(|ml| { ct += ml.len(); false });
        ct
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        let mut found = false;
        self.board.generate_moves(|ml| {
            found = ml.into_iter().any(|m| m == mv);
            found
        });
        found
    }

    pub fn in_check(&self) -> bool { !self.board.checkers().is_empty() }

    fn has_legal_move(&self) -> bool {
        let mut any = false;
        self.board.generate_moves(|_| { any = true; true });
        any
    }

    pub fn is_checkmate(&self) -> bool { self.in_check() && !self.has_legal_move() }

    pub fn is_stalemate(&self) -> bool { !self.in_check() && !self.has_legal_move() }

    /// Applies a legal move and returns the token that undoes it.
    pub fn apply(&mut self, mv: Move) -> Result<UndoToken, RulesError> {
        if !self.is_legal(mv) {
            return Err(RulesError::IllegalMove(self.uci(mv)));
        }
        Ok(self.apply_legal(mv))
    }

    /// Applies a move taken from [`Position::legal_moves`] of the current board.
    pub(crate) fn apply_legal(&mut self, mv: Move) -> UndoToken {
        self.stack.push(Undo { prev: self.board.clone(), mv });
        self.board.play(mv);
        UndoToken { ply: self.stack.len() }
    }

    /// Reverts the most recent move. Tokens must come back in reverse order.
    pub fn undo(&mut self, token: UndoToken) {
        assert_eq!(token.ply, self.stack.len(), "undo out of order");
        if let Some(u) = self.stack.pop() {
            self.board = u.prev;
        }
    }

    /// UCI text for `mv`. Castling is written as the king's two-square step.
    pub fn uci(&self, mv: Move) -> String { move_to_uci(&self.board, mv) }

    /// Finds the legal move whose UCI text is `uci`.
    pub fn parse_uci(&self, uci: &str) -> Option<Move> {
        let mut found = None;
        self.board.generate_moves(|ml| {
            for m in ml { if move_to_uci(&self.board, m) == uci { found = Some(m); break; } }
            found.is_some()
        });
        found
    }

    /// Plays UCI moves on top of the current board.
    pub fn play_uci_moves<S: AsRef<str>>(&mut self, moves: &[S]) -> Result<(), RulesError> {
        for m in moves {
            let mv = self.parse_uci(m.as_ref()).ok_or_else(|| RulesError::IllegalMove(m.as_ref().to_string()))?;
            let _ = self.apply_legal(mv);
        }
        Ok(())
    }

    pub fn set_from_start_and_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, RulesError> {
        let mut pos = Self::startpos();
        pos.play_uci_moves(moves)?;
        Ok(pos)
    }

    /// Converts UCI text to moves by replaying them on a copy of this position.
    /// Returns the index and text of the first move that is not legal.
    pub fn uci_line_to_moves<S: AsRef<str>>(&self, line: &[S]) -> Result<Vec<Move>, (usize, String)> {
        let mut scratch = self.clone();
        let mut out = Vec::with_capacity(line.len());
        for (i, s) in line.iter().enumerate() {
            match scratch.parse_uci(s.as_ref()) {
                Some(mv) => { let _ = scratch.apply_legal(mv); out.push(mv); }
                None => return Err((i, s.as_ref().to_string())),
            }
        }
        Ok(out)
    }
}

pub fn move_to_uci(board: &CozyBoard, mv: Move) -> String {
    // cozy-chess encodes castling as king-takes-own-rook
    let castles = board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == board.color_on(mv.from);
    if castles {
        let file = if (mv.to.file() as u8) > (mv.from.file() as u8) { File::G } else { File::C };
        let to = Square::new(file, mv.from.rank());
        return format!("{}", Move { from: mv.from, to, promotion: None });
    }
    format!("{}", mv)
}

/// Replays `moves` from `fen` and checks every move is legal and the final
/// position is checkmate.
pub fn validate_line(fen: &str, moves: &[Move]) -> Result<(), LineError> {
    if moves.is_empty() { return Err(LineError::Empty); }
    let mut pos = Position::from_fen(fen).map_err(|e| LineError::InvalidFen(e.to_string()))?;
    for (ply, &mv) in moves.iter().enumerate() {
        if !pos.is_legal(mv) {
            return Err(LineError::IllegalMove { ply, mv: pos.uci(mv) });
        }
        let _ = pos.apply_legal(mv);
    }
    if pos.is_checkmate() { Ok(()) } else { Err(LineError::NotCheckmate) }
}
