use cozy_chess::Move;
use matepuzzle::board::{validate_line, Position};
use matepuzzle::puzzle::{generate_batch, PuzzleGenerator};
use matepuzzle::search::{MateProver, MateSearch};
use matepuzzle::source::{FenList, RandomWalk};
use matepuzzle::{make_puzzle, EngineError, PuzzleError, PuzzleParams, PuzzleRecord, SearchError};
use pretty_assertions::assert_eq;

const BACK_RANK: &str = "2r3k1/5ppp/8/8/8/8/4RPPP/4R1K1 w - - 0 1";
const MATE_IN_ONE: &str = "6k1/5ppp/8/8/8/8/5PPP/4R1K1 w - - 0 1";
const NO_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";

fn params(attempts: usize) -> PuzzleParams {
    PuzzleParams { attempts, ..PuzzleParams::default() }
}

/// Claims the first legal move mates.
struct Liar;

impl MateSearch for Liar {
    fn find_forced_mate(&mut self, pos: &mut Position, _max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
        Ok(pos.legal_moves().first().map(|&m| vec![m, m, m]))
    }
}

/// Fails every request with a fixed error.
struct Failing(fn() -> SearchError);

impl MateSearch for Failing {
    fn find_forced_mate(&mut self, _pos: &mut Position, _max_plies: u32) -> Result<Option<Vec<Move>>, SearchError> {
        Err((self.0)())
    }
}

#[test]
fn default_params() {
    let p = PuzzleParams::default();
    assert_eq!((p.attempts, p.min_ply, p.max_ply, p.ply_budget, p.require_full_line), (50, 3, 6, 3, true));
}

#[test]
fn back_rank_puzzle() {
    let source = FenList::new(&[BACK_RANK]).unwrap();
    let puzzle = make_puzzle(source, MateProver::default(), &params(1)).expect("puzzle");
    assert_eq!(puzzle.fen(), BACK_RANK);
    assert_eq!(puzzle.solution_uci(), vec!["e2e8", "c8e8", "e1e8"]);
    assert_eq!(validate_line(puzzle.fen(), puzzle.moves()), Ok(()));
}

#[test]
fn record_survives_json() {
    let source = FenList::new(&[BACK_RANK]).unwrap();
    let puzzle = make_puzzle(source, MateProver::default(), &params(1)).unwrap();
    let json = serde_json::to_string(&puzzle.to_record()).unwrap();
    assert_eq!(json, format!(r#"{{"fen":"{BACK_RANK}","solution":["e2e8","c8e8","e1e8"]}}"#));
    let back: PuzzleRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back.into_result().unwrap(), puzzle);
}

#[test]
fn tampered_record_is_rejected() {
    let rec = PuzzleRecord { fen: BACK_RANK.to_string(), solution: vec!["e2e8".into(), "c8e8".into()] };
    assert!(rec.into_result().is_err());
    let rec = PuzzleRecord { fen: BACK_RANK.to_string(), solution: vec!["e2e8".into(), "e1e8".into()] };
    assert!(rec.into_result().is_err());
}

#[test]
fn no_mate_exhausts_attempts() {
    let source = FenList::new(&[NO_MATE]).unwrap();
    let mut gen = PuzzleGenerator::new(source, MateProver::default());
    match gen.make_puzzle(&params(1)) {
        Err(PuzzleError::NoPuzzleFound { attempts }) => assert_eq!(attempts, 1),
        other => panic!("expected NoPuzzleFound, got {other:?}"),
    }
    assert_eq!(gen.stats().no_mate, 1);
}

#[test]
fn short_mate_is_rejected_when_full_line_required() {
    let source = FenList::new(&[MATE_IN_ONE]).unwrap();
    let mut gen = PuzzleGenerator::new(source, MateProver::default());
    assert!(matches!(gen.make_puzzle(&params(2)), Err(PuzzleError::NoPuzzleFound { attempts: 2 })));
    assert_eq!(gen.stats().too_short, 2);

    let relaxed = PuzzleParams { require_full_line: false, ..params(1) };
    let puzzle = gen.make_puzzle(&relaxed).expect("short mate accepted");
    assert_eq!(validate_line(puzzle.fen(), puzzle.moves()), Ok(()));
}

#[test]
fn lying_search_never_yields_a_puzzle() {
    let mut gen = PuzzleGenerator::new(RandomWalk::seeded(11), Liar);
    assert!(matches!(gen.make_puzzle(&params(5)), Err(PuzzleError::NoPuzzleFound { attempts: 5 })));
    assert_eq!(gen.stats().validation_failed, 5);
}

#[test]
fn timeouts_and_bad_lines_are_retried() {
    let source = FenList::new(&[BACK_RANK]).unwrap();
    let mut gen = PuzzleGenerator::new(source, Failing(|| EngineError::SearchTimeout { elapsed_ms: 5 }.into()));
    assert!(matches!(gen.make_puzzle(&params(3)), Err(PuzzleError::NoPuzzleFound { .. })));
    assert_eq!(gen.stats().timeouts, 3);

    let source = FenList::new(&[BACK_RANK]).unwrap();
    let mut gen = PuzzleGenerator::new(source, Failing(|| SearchError::BadLine { ply: 0, mv: "a1a1".into() }));
    assert!(matches!(gen.make_puzzle(&params(2)), Err(PuzzleError::NoPuzzleFound { .. })));
    assert_eq!(gen.stats().validation_failed, 2);
}

#[test]
fn fatal_engine_error_aborts() {
    let source = FenList::new(&[BACK_RANK]).unwrap();
    let mut gen = PuzzleGenerator::new(source, Failing(|| EngineError::Protocol("gone".into()).into()));
    assert!(matches!(gen.make_puzzle(&params(10)), Err(PuzzleError::Engine(EngineError::Protocol(_)))));
    assert_eq!(gen.stats().attempts, 1);
}

// Deep random walks hang mates often enough that a few hundred tries per
// puzzle always find some.
fn deep_walks() -> PuzzleParams {
    PuzzleParams { attempts: 500, min_ply: 20, max_ply: 40, ply_budget: 3, require_full_line: false }
}

#[test]
fn random_walk_puzzles_validate() {
    let results = generate_batch(4, &deep_walks(), 2024);
    let found: Vec<_> = results.into_iter().filter_map(Result::ok).collect();
    assert!(!found.is_empty(), "no puzzle found in any of 4 batches");
    for puzzle in &found {
        assert_eq!(validate_line(puzzle.fen(), puzzle.moves()), Ok(()));
        assert!(puzzle.moves().len() % 2 == 1 && puzzle.moves().len() <= 3);
        let back = puzzle.to_record().into_result().expect("record replays");
        assert_eq!(&back, puzzle);
    }
}

#[test]
fn batch_is_reproducible() {
    let records = |seed| -> Vec<Option<PuzzleRecord>> {
        generate_batch(3, &deep_walks(), seed).into_iter().map(|r| r.ok().map(|p| p.to_record())).collect()
    };
    let first = records(99);
    assert!(first.iter().any(Option::is_some), "no puzzle found in any of 3 batches");
    assert_eq!(first, records(99));
}
