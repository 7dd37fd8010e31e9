pub mod cozy;

pub use cozy::{move_to_uci, validate_line, Position, UndoToken, STARTPOS_FEN};
