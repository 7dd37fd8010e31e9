use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use matepuzzle::board::{validate_line, Position};
use matepuzzle::engine::{EngineConfig, EngineSession};
use matepuzzle::search::{EngineMateSearch, MateProver, MateSearch};

#[derive(Parser, Debug)]
#[command(name = "solve", about = "Prove a forced mate from a FEN")]
struct Args {
    /// FEN string or "startpos"
    #[arg(value_name = "FEN")]
    fen: String,
    /// Plies in the mating line
    #[arg(long, default_value_t = 3)]
    ply_budget: u32,
    /// UCI engine to delegate the search to
    #[arg(long)]
    engine: Option<PathBuf>,
    /// Engine search depth
    #[arg(long, default_value_t = 12)]
    depth: u32,
    /// Engine movetime
    #[arg(long)]
    movetime_ms: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let a = Args::parse();
    let mut pos = if a.fen == "startpos" { Position::startpos() } else { Position::from_fen(&a.fen)? };
    let fen = pos.fen();
    let t0 = Instant::now();
    let line = match &a.engine {
        Some(path) => {
            let mut s = EngineMateSearch::new(EngineSession::new(EngineConfig::new(path)), a.depth);
            if let Some(ms) = a.movetime_ms { s = s.with_movetime(Duration::from_millis(ms)); }
            let line = s.find_forced_mate(&mut pos, a.ply_budget)?;
            s.session_mut().shutdown();
            line
        }
        None => {
            let mut prover = MateProver::default();
            let line = prover.find_forced_mate(&mut pos, a.ply_budget);
            eprintln!("nodes: {}", prover.nodes());
            line
        }
    };
    let dt = t0.elapsed().as_secs_f64();
    match line {
        Some(moves) => {
            let valid = validate_line(&fen, &moves);
            let mut replay = pos.clone();
            let uci: Vec<String> = moves.iter().map(|&m| {
                let s = replay.uci(m);
                let _ = replay.apply(m);
                s
            }).collect();
            println!("mate: {}", uci.join(" "));
            println!("validated: {}", match valid { Ok(()) => "yes".to_string(), Err(e) => e.to_string() });
        }
        None => println!("no forced mate within {} plies", a.ply_budget),
    }
    eprintln!("elapsed: {:.3}s", dt);
    Ok(())
}
