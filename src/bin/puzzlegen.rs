use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use matepuzzle::engine::{EngineConfig, EngineSession};
use matepuzzle::puzzle::{generate_batch, PuzzleGenerator, PuzzleParams, PuzzleResult};
use matepuzzle::search::{EngineMateSearch, MateProver, MateSearch};
use matepuzzle::source::{FenList, PositionSource, RandomWalk};
use matepuzzle::PuzzleError;

#[derive(Parser, Debug)]
#[command(name = "puzzlegen", about = "Generate forced-mate chess puzzles as JSON lines")]
struct Args {
    /// Number of puzzles to generate
    #[arg(long, default_value_t = 1)]
    count: usize,
    /// Candidate positions tried per puzzle
    #[arg(long, default_value_t = 50)]
    attempts: usize,
    /// Shortest random walk from the initial position
    #[arg(long, default_value_t = 3)]
    min_ply: u32,
    /// Longest random walk from the initial position
    #[arg(long, default_value_t = 6)]
    max_ply: u32,
    /// Plies in the mating line (odd; ends on the attacker's move)
    #[arg(long, default_value_t = 3)]
    ply_budget: u32,
    /// Accept mates shorter than the ply budget
    #[arg(long, default_value_t = false)]
    allow_short: bool,
    /// Seed for the random walks (entropy when absent)
    #[arg(long)]
    seed: Option<u64>,
    /// Take candidate positions from a FEN/EPD file instead of random walks
    #[arg(long)]
    fens: Option<PathBuf>,
    /// UCI engine to delegate the mate search to
    #[arg(long)]
    engine: Option<PathBuf>,
    /// Engine search depth
    #[arg(long, default_value_t = 12)]
    depth: u32,
    /// Engine movetime per position
    #[arg(long)]
    movetime_ms: Option<u64>,
    /// Engine option as NAME=VALUE (repeatable), e.g. "Skill Level=20"
    #[arg(long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,
    /// Extra engine time before a search is stopped
    #[arg(long, default_value_t = 10_000)]
    search_timeout_ms: u64,
    /// Worker threads for exhaustive random-walk batches
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Output file (stdout when absent)
    #[arg(long)]
    out: Option<PathBuf>,
}

fn engine_config(a: &Args, path: &PathBuf) -> Result<EngineConfig> {
    let mut cfg = EngineConfig::new(path);
    cfg.search_timeout = Duration::from_millis(a.search_timeout_ms);
    for opt in &a.options {
        let (name, value) = opt.split_once('=').with_context(|| format!("--option {opt:?}: expected NAME=VALUE"))?;
        cfg = cfg.with_option(name.trim(), value.trim());
    }
    Ok(cfg)
}

fn emit(out: &mut dyn Write, puzzle: &PuzzleResult) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string(&puzzle.to_record())?)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let a = Args::parse();
    let params = PuzzleParams {
        attempts: a.attempts,
        min_ply: a.min_ply,
        max_ply: a.max_ply,
        ply_budget: a.ply_budget,
        require_full_line: !a.allow_short,
    };
    let mut out: Box<dyn Write> = match &a.out {
        Some(p) => Box::new(BufWriter::new(File::create(p).with_context(|| format!("create {}", p.display()))?)),
        None => Box::new(io::stdout().lock()),
    };
    let pb = ProgressBar::new(a.count as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} puzzles [{elapsed_precise}]")?);
    let seed = a.seed.unwrap_or_else(rand::random::<u64>);
    let mut found = 0usize;

    if a.engine.is_none() && a.fens.is_none() && a.threads > 1 {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(a.threads).build()?;
        let results = pool.install(|| generate_batch(a.count, &params, seed));
        for r in results {
            pb.inc(1);
            match r {
                Ok(p) => { emit(&mut out, &p)?; found += 1; }
                Err(e) => warn!("{e}"),
            }
        }
    } else {
        let source: Box<dyn PositionSource> = match &a.fens {
            Some(path) => Box::new(FenList::load(path).with_context(|| format!("load {}", path.display()))?),
            None => Box::new(RandomWalk::seeded(seed)),
        };
        let search: Box<dyn MateSearch> = match &a.engine {
            Some(path) => {
                let mut session = EngineSession::new(engine_config(&a, path)?);
                session.start()?;
                let mut s = EngineMateSearch::new(session, a.depth);
                if let Some(ms) = a.movetime_ms { s = s.with_movetime(Duration::from_millis(ms)); }
                Box::new(s)
            }
            None => Box::new(MateProver::default()),
        };
        let mut generator = PuzzleGenerator::new(source, search);
        for _ in 0..a.count {
            pb.inc(1);
            match generator.make_puzzle(&params) {
                Ok(p) => { emit(&mut out, &p)?; found += 1; }
                Err(e @ PuzzleError::NoPuzzleFound { .. }) => warn!("{e}"),
                Err(e) => return Err(e.into()),
            }
        }
        log::info!("attempt stats: {:?}", generator.stats());
    }
    pb.finish_and_clear();
    out.flush()?;
    if found == 0 { bail!("no puzzle found"); }
    eprintln!("Generated {} of {} puzzles (seed {})", found, a.count, seed);
    Ok(())
}
