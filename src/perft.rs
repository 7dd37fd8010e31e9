use crate::board::Position;

// Perft over apply/undo on a single position (no cloning at the call site)
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 { return 1; }
    let moves = pos.legal_moves();
    if depth == 1 { return moves.len() as u64; }
    let mut nodes = 0u64;
    for mv in moves {
        let token = pos.apply_legal(mv);
        nodes += perft(pos, depth - 1);
        pos.undo(token);
    }
    nodes
}

/// Per-move node counts at the root, in move-generation order.
pub fn divide(pos: &mut Position, depth: u32) -> Vec<(String, u64)> {
    let mut out = Vec::new();
    if depth == 0 { return out; }
    for mv in pos.legal_moves() {
        let uci = pos.uci(mv);
        let token = pos.apply_legal(mv);
        out.push((uci, perft(pos, depth - 1)));
        pos.undo(token);
    }
    out
}
