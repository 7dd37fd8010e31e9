//! One external UCI engine process and the state machine that talks to it.
//!
//! The wire protocol has no request ids: a `bestmove` belongs to whatever `go`
//! was sent last. The session therefore keeps at most one search outstanding,
//! and after a stop it drains the stream to `bestmove` before it accepts
//! another request. An engine that never answers the stop is killed, since
//! `readyok` does not prove the old search has ended.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::error::EngineError;
use crate::uci::{self, EngineLine, InfoSnapshot, SearchLimits};

pub const ENGINE_READY_TIMEOUT: Duration = Duration::from_secs(10);
pub const ENGINE_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const ENGINE_STOP_GRACE: Duration = Duration::from_secs(1);
pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// `setoption` name/value pairs sent after the handshake.
    pub options: Vec<(String, String)>,
    /// Deadline for each handshake token (`uciok`, `readyok`).
    pub ready_timeout: Duration,
    /// Allowed search time beyond any requested movetime before `stop` is sent.
    pub search_timeout: Duration,
    /// Time allowed for `bestmove` after `stop`.
    pub stop_grace: Duration,
    pub quit_grace: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            options: Vec::new(),
            ready_timeout: ENGINE_READY_TIMEOUT,
            search_timeout: ENGINE_SEARCH_TIMEOUT,
            stop_grace: ENGINE_STOP_GRACE,
            quit_grace: ENGINE_QUIT_TIMEOUT,
        }
    }

    pub fn with_option(mut self, name: &str, value: &str) -> Self {
        self.options.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    Handshaking,
    Ready,
    Thinking,
    Terminated,
}

/// Result of one completed `go`.
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    /// `None` when the engine reported no move.
    pub bestmove: Option<String>,
    pub ponder: Option<String>,
    /// Last multipv=1 progress line state before `bestmove`.
    pub info: InfoSnapshot,
    pub elapsed_ms: u64,
    /// `stop` was sent (deadline or caller cancel) before `bestmove` arrived.
    pub stopped: bool,
}

/// Cancels the in-flight search of the session it came from.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) { self.0.store(true, Ordering::SeqCst); }
}

struct Pipes {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
}

pub struct EngineSession {
    cfg: EngineConfig,
    state: EngineState,
    pipes: Option<Pipes>,
    engine_name: Option<String>,
    opt_names: HashSet<String>,
    stop: Arc<AtomicBool>,
}

impl EngineSession {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            state: EngineState::NotStarted,
            pipes: None,
            engine_name: None,
            opt_names: HashSet::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> EngineState { self.state }

    pub fn is_ready(&self) -> bool { self.state == EngineState::Ready }

    /// Name from the engine's `id name` line.
    pub fn engine_name(&self) -> Option<&str> { self.engine_name.as_deref() }

    pub fn pid(&self) -> Option<u32> { self.pipes.as_ref().map(|p| p.child.id()) }

    pub fn stop_handle(&self) -> StopHandle { StopHandle(self.stop.clone()) }

    /// Spawns the engine and runs the `uci`/`isready` handshake. Calling this
    /// on a `Ready` session does nothing; a `Terminated` session gets a fresh
    /// process.
    pub fn start(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Ready => return Ok(()),
            EngineState::NotStarted => {}
            EngineState::Terminated => {
                debug!("restarting terminated engine {}", self.cfg.path.display());
                self.engine_name = None;
                self.opt_names.clear();
            }
            other => return Err(EngineError::NotReady(other)),
        }
        let mut cmd = Command::new(&self.cfg.path);
        cmd.args(&self.cfg.args);
        let mut child = match cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null()).spawn() {
            Ok(c) => c,
            Err(e) => {
                self.state = EngineState::Terminated;
                return Err(EngineError::StartupFailed(format!("failed to spawn engine at {}: {e}", self.cfg.path.display())));
            }
        };
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                self.state = EngineState::Terminated;
                return Err(EngineError::StartupFailed("engine pipes unavailable".to_string()));
            }
        };
        let (tx, rx) = mpsc::channel::<String>();
        let reader = std::thread::Builder::new()
            .name("uci-reader".to_string())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    match line {
                        Ok(l) => { if tx.send(l).is_err() { break; } }
                        Err(_) => break,
                    }
                }
            });
        if let Err(e) = reader {
            let _ = child.kill();
            let _ = child.wait();
            self.state = EngineState::Terminated;
            return Err(EngineError::StartupFailed(format!("reader thread: {e}")));
        }
        self.pipes = Some(Pipes { child, stdin: BufWriter::new(stdin), rx });
        self.state = EngineState::Handshaking;
        debug!("engine {} spawned, handshaking", self.cfg.path.display());

        if let Err(e) = self.handshake() {
            self.terminate();
            return Err(EngineError::StartupFailed(e.to_string()));
        }
        self.state = EngineState::Ready;
        info!("engine ready: {}", self.engine_name.as_deref().unwrap_or("(unnamed)"));
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        self.write_line("uci")?;
        let deadline = Instant::now() + self.cfg.ready_timeout;
        loop {
            let line = self.recv_until(deadline, "uciok")?;
            match uci::classify(&line) {
                EngineLine::UciOk => break,
                EngineLine::Id { key: "name", value } => self.engine_name = Some(value.to_string()),
                EngineLine::Option(name) => { self.opt_names.insert(name); }
                _ => {}
            }
        }
        let options = self.cfg.options.clone();
        for (name, value) in &options {
            if self.opt_names.is_empty() || self.opt_names.contains(name) {
                self.write_line(&uci::setoption_command(name, value))?;
            } else {
                warn!("engine does not advertise option {name:?}; skipped");
            }
        }
        self.await_readyok()
    }

    fn await_readyok(&mut self) -> Result<(), EngineError> {
        self.write_line("isready")?;
        let deadline = Instant::now() + self.cfg.ready_timeout;
        loop {
            let line = self.recv_until(deadline, "readyok")?;
            if uci::classify(&line) == EngineLine::ReadyOk { return Ok(()); }
        }
    }

    /// Readiness ping; only valid between searches.
    pub fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.require_ready()?;
        self.await_readyok().map_err(|e| self.fail(e))
    }

    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.require_ready()?;
        self.write_line("ucinewgame").map_err(|e| self.fail(e))?;
        self.await_readyok().map_err(|e| self.fail(e))
    }

    fn require_ready(&self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Ready => Ok(()),
            EngineState::Thinking => Err(EngineError::Busy),
            other => Err(EngineError::NotReady(other)),
        }
    }

    /// Sends `position` + `go` and blocks until the matching `bestmove`.
    ///
    /// Past the deadline (or on [`StopHandle::stop`]) a `stop` is sent; a
    /// `bestmove` inside the grace period still completes the request. If none
    /// arrives the request fails with [`EngineError::SearchTimeout`] and the
    /// process is killed; a later [`EngineSession::start`] spawns a fresh one.
    pub fn search(&mut self, fen: &str, limits: &SearchLimits) -> Result<SearchOutcome, EngineError> {
        self.require_ready()?;
        let go = limits.go_command().ok_or(EngineError::Unbounded)?;
        self.stop.store(false, Ordering::SeqCst);
        self.write_line(&uci::position_command(fen)).map_err(|e| self.fail(e))?;
        self.write_line(&go).map_err(|e| self.fail(e))?;
        self.state = EngineState::Thinking;

        let start = Instant::now();
        let soft_limit = limits.movetime.unwrap_or(Duration::ZERO) + self.cfg.search_timeout;
        let mut stop_deadline: Option<Instant> = None;
        let mut snapshot = InfoSnapshot::default();

        loop {
            let now = Instant::now();
            if stop_deadline.is_none() && (self.stop.load(Ordering::SeqCst) || now.duration_since(start) >= soft_limit) {
                debug!("sending stop after {} ms", now.duration_since(start).as_millis());
                self.write_line("stop").map_err(|e| self.fail(e))?;
                stop_deadline = Some(now + self.cfg.stop_grace);
            }
            if let Some(d) = stop_deadline {
                if now >= d {
                    return Err(self.abandon_after_timeout(start.elapsed()));
                }
            }

            match self.recv(ENGINE_POLL_INTERVAL) {
                Ok(line) => match uci::classify(&line) {
                    EngineLine::Info(text) => snapshot.update_from_line(text),
                    EngineLine::BestMove { mv, ponder } => {
                        self.state = EngineState::Ready;
                        return Ok(SearchOutcome {
                            bestmove: mv.map(str::to_string),
                            ponder: ponder.map(str::to_string),
                            info: snapshot,
                            elapsed_ms: start.elapsed().as_millis() as u64,
                            stopped: stop_deadline.is_some(),
                        });
                    }
                    EngineLine::MalformedBestMove => {
                        return Err(self.fail(EngineError::Protocol(format!("unparseable terminal line {line:?}"))));
                    }
                    _ => trace!("ignored: {line}"),
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.fail(EngineError::Protocol("engine output closed mid-search".to_string())));
                }
            }
        }
    }

    // No bestmove within the grace period. The abandoned search may still
    // answer later, so the process cannot be trusted with another request.
    fn abandon_after_timeout(&mut self, elapsed: Duration) -> EngineError {
        warn!("no bestmove within grace after stop ({} ms); terminating engine", elapsed.as_millis());
        self.terminate();
        EngineError::timeout(elapsed)
    }

    /// Sends `quit`, waits the grace period, then kills the process.
    pub fn shutdown(&mut self) {
        if self.pipes.is_some() {
            let _ = self.write_line("quit");
            if let Some(p) = self.pipes.as_mut() {
                let deadline = Instant::now() + self.cfg.quit_grace;
                while Instant::now() < deadline {
                    if let Ok(Some(_)) = p.child.try_wait() { break; }
                    std::thread::sleep(ENGINE_POLL_INTERVAL);
                }
            }
        }
        self.terminate();
    }

    fn terminate(&mut self) {
        if let Some(mut p) = self.pipes.take() {
            if let Ok(None) = p.child.try_wait() {
                debug!("killing engine pid {}", p.child.id());
                let _ = p.child.kill();
            }
            let _ = p.child.wait();
        }
        self.state = EngineState::Terminated;
    }

    fn fail(&mut self, e: EngineError) -> EngineError {
        error!("engine session failed: {e}");
        self.terminate();
        e
    }

    fn write_line(&mut self, msg: &str) -> Result<(), EngineError> {
        let p = self.pipes.as_mut().ok_or(EngineError::NotReady(self.state))?;
        trace!(">> {msg}");
        let res = p.stdin.write_all(msg.as_bytes())
            .and_then(|_| p.stdin.write_all(b"\n"))
            .and_then(|_| p.stdin.flush());
        res.map_err(|e| EngineError::Protocol(format!("write {msg:?}: {e}")))
    }

    fn recv(&self, timeout: Duration) -> Result<String, RecvTimeoutError> {
        let p = self.pipes.as_ref().ok_or(RecvTimeoutError::Disconnected)?;
        let line = p.rx.recv_timeout(timeout)?;
        trace!("<< {line}");
        Ok(line)
    }

    fn recv_until(&self, deadline: Instant, waiting_for: &str) -> Result<String, EngineError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.recv(remaining) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::NoResponse(waiting_for.to_string())),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Protocol(format!("engine exited while waiting for {waiting_for}"))),
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if self.pipes.is_some() {
            self.shutdown();
        }
    }
}
