use matepuzzle::board::{validate_line, Position};
use matepuzzle::search::{find_forced_mate, MateProver};
use pretty_assertions::assert_eq;

const BACK_RANK: &str = "2r3k1/5ppp/8/8/8/8/4RPPP/4R1K1 w - - 0 1";
const MATE_IN_ONE: &str = "6k1/5ppp/8/8/8/8/5PPP/4R1K1 w - - 0 1";

fn uci_line(fen: &str, line: &[cozy_chess::Move]) -> Vec<String> {
    let mut pos = Position::from_fen(fen).unwrap();
    line.iter().map(|&m| {
        let s = pos.uci(m);
        let _t = pos.apply(m).unwrap();
        s
    }).collect()
}

#[test]
fn open_game_has_no_mate_in_two() {
    let mut pos = Position::from_fen("rnb1kbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2").unwrap();
    assert_eq!(find_forced_mate(&mut pos, 3), None);
}

#[test]
fn back_rank_mate_in_two() {
    let mut pos = Position::from_fen(BACK_RANK).unwrap();
    let line = find_forced_mate(&mut pos, 3).expect("forced mate");
    assert_eq!(uci_line(BACK_RANK, &line), vec!["e2e8", "c8e8", "e1e8"]);
    assert_eq!(validate_line(BACK_RANK, &line), Ok(()));
}

#[test]
fn back_rank_needs_three_plies() {
    let mut pos = Position::from_fen(BACK_RANK).unwrap();
    assert_eq!(find_forced_mate(&mut pos, 1), None);
    // an even budget cannot end on the attacker's move and is rounded down
    assert_eq!(find_forced_mate(&mut pos, 2), None);
    assert!(find_forced_mate(&mut pos, 4).is_some());
}

#[test]
fn mate_in_one() {
    let mut pos = Position::from_fen(MATE_IN_ONE).unwrap();
    let line = find_forced_mate(&mut pos, 1).expect("mate in one");
    assert_eq!(uci_line(MATE_IN_ONE, &line), vec!["e1e8"]);
}

#[test]
fn shorter_mate_is_accepted_within_a_larger_budget() {
    let mut pos = Position::from_fen(MATE_IN_ONE).unwrap();
    let line = find_forced_mate(&mut pos, 3).expect("mate within three plies");
    assert!(line.len() % 2 == 1 && line.len() <= 3);
    assert_eq!(validate_line(MATE_IN_ONE, &line), Ok(()));
}

#[test]
fn stalemating_move_does_not_count_as_mate() {
    // Kb6 leaves black without moves but not in check
    let fen = "k7/8/2K5/4B3/8/8/8/8 w - - 0 1";
    let mut pos = Position::from_fen(fen).unwrap();
    let kb6 = pos.parse_uci("c6b6").expect("legal");
    let t = pos.apply(kb6).unwrap();
    assert!(pos.is_stalemate());
    pos.undo(t);
    assert_eq!(find_forced_mate(&mut pos, 3), None);
}

#[test]
fn search_leaves_position_untouched() {
    let mut pos = Position::set_from_start_and_moves(&["e2e4", "e7e5", "f1c4", "b8c6", "d1h5"]).unwrap();
    let fen = pos.fen();
    let history = pos.moves_played();
    let mut prover = MateProver::default();
    let _ = prover.find_forced_mate(&mut pos, 3);
    assert!(prover.nodes() > 0);
    assert_eq!(pos.fen(), fen);
    assert_eq!(pos.moves_played(), history);
}

#[test]
fn every_defence_is_refuted() {
    let mut pos = Position::from_fen(BACK_RANK).unwrap();
    let line = find_forced_mate(&mut pos, 3).expect("forced mate");
    let t = pos.apply(line[0]).unwrap();
    for reply in pos.legal_moves() {
        let r = pos.apply(reply).unwrap();
        assert!(find_forced_mate(&mut pos, 1).is_some(), "reply {} escapes", reply);
        pos.undo(r);
    }
    pos.undo(t);
}

#[test]
fn scholars_mate_found_from_move_list() {
    // 1.e4 e5 2.Bc4 Nc6 3.Qh5 Nf6?? leaves Qxf7 mate
    let mut pos = Position::set_from_start_and_moves(&["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6"]).unwrap();
    let fen = pos.fen();
    let line = find_forced_mate(&mut pos, 1).expect("Qxf7#");
    assert_eq!(uci_line(&fen, &line), vec!["h5f7"]);
}
