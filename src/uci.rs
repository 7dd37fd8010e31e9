//! UCI wire dialect as seen from the GUI side: command text going to the
//! engine and classification of the lines coming back.

use std::time::Duration;

/// Limits for one `go` command. At least one must be set.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: Option<u32>,
    pub movetime: Option<Duration>,
    pub mate: Option<u32>,
}

impl SearchLimits {
    pub fn depth(depth: u32) -> Self { Self { depth: Some(depth), ..Self::default() } }

    pub fn movetime(movetime: Duration) -> Self { Self { movetime: Some(movetime), ..Self::default() } }

    pub fn is_bounded(&self) -> bool {
        self.depth.is_some() || self.movetime.is_some() || self.mate.is_some()
    }

    /// `None` when unbounded; the adapter never sends `go infinite`.
    pub fn go_command(&self) -> Option<String> {
        if !self.is_bounded() { return None; }
        let mut cmd = String::from("go");
        if let Some(d) = self.depth { cmd.push_str(&format!(" depth {d}")); }
        if let Some(m) = self.mate { cmd.push_str(&format!(" mate {m}")); }
        if let Some(t) = self.movetime { cmd.push_str(&format!(" movetime {}", t.as_millis())); }
        Some(cmd)
    }
}

pub fn position_command(fen: &str) -> String { format!("position fen {}", fen.trim()) }

pub fn setoption_command(name: &str, value: &str) -> String {
    if value.is_empty() { format!("setoption name {name}") } else { format!("setoption name {name} value {value}") }
}

/// One engine output line, classified on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine<'a> {
    Id { key: &'a str, value: &'a str },
    UciOk,
    ReadyOk,
    /// Advertised option name.
    Option(String),
    Info(&'a str),
    /// `None` move: the engine had nothing to play (`(none)` or `0000`).
    BestMove { mv: Option<&'a str>, ponder: Option<&'a str> },
    /// `bestmove` without a move token.
    MalformedBestMove,
    Unknown,
}

pub fn classify(line: &str) -> EngineLine<'_> {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("uciok") => EngineLine::UciOk,
        Some("readyok") => EngineLine::ReadyOk,
        Some("info") => EngineLine::Info(line),
        Some("id") => match tokens.next() {
            Some(key) => {
                // rest of the line after the key, inner spacing kept
                let rest = line["id".len()..].trim_start();
                let value = rest[key.len()..].trim();
                EngineLine::Id { key, value }
            }
            None => EngineLine::Unknown,
        },
        Some("option") => match parse_option_name(&line["option".len()..]) {
            Some(name) => EngineLine::Option(name),
            None => EngineLine::Unknown,
        },
        Some("bestmove") => match tokens.next() {
            None => EngineLine::MalformedBestMove,
            Some(mv) => {
                let mv = if mv == "(none)" || mv == "0000" { None } else { Some(mv) };
                let ponder = match tokens.next() {
                    Some("ponder") => tokens.next(),
                    _ => None,
                };
                EngineLine::BestMove { mv, ponder }
            }
        },
        _ => EngineLine::Unknown,
    }
}

pub fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        if tok == "name" {
            let mut parts = Vec::new();
            while let Some(next) = tokens.next_if(|t| *t != "type") {
                parts.push(next);
            }
            if !parts.is_empty() {
                return Some(parts.join(" "));
            }
        }
    }
    None
}

/// Latest multipv=1 progress seen during one search.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct InfoSnapshot {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub score_cp: Option<i32>,
    /// Moves to mate; positive when the side to move mates.
    pub score_mate: Option<i32>,
    pub pv: Vec<String>,
}

impl InfoSnapshot {
    pub fn update_from_line(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().copied() != Some("info") {
            return;
        }
        if let Some(i) = tokens.iter().position(|t| *t == "multipv") {
            let multipv = tokens.get(i + 1).and_then(|s| s.parse::<u32>().ok()).unwrap_or(1);
            if multipv != 1 { return; }
        }
        let mut i = 1;
        while i < tokens.len() {
            match tokens[i] {
                // free text to end of line
                "string" => break,
                "depth" => { self.depth = tokens.get(i + 1).and_then(|s| s.parse().ok()); i += 1; }
                "seldepth" => { self.seldepth = tokens.get(i + 1).and_then(|s| s.parse().ok()); i += 1; }
                "nodes" => { self.nodes = tokens.get(i + 1).and_then(|s| s.parse().ok()); i += 1; }
                "score" => {
                    match tokens.get(i + 1).copied() {
                        Some("cp") => {
                            self.score_cp = tokens.get(i + 2).and_then(|s| s.parse().ok());
                            self.score_mate = None;
                            i += 2;
                        }
                        Some("mate") => {
                            self.score_mate = tokens.get(i + 2).and_then(|s| s.parse().ok());
                            self.score_cp = None;
                            i += 2;
                        }
                        _ => {}
                    }
                }
                "pv" => {
                    self.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Plies to mate for the side to move, when the engine reports one.
    pub fn mate_plies(&self) -> Option<u32> {
        match self.score_mate {
            Some(n) if n > 0 => Some(2 * n as u32 - 1),
            _ => None,
        }
    }
}
