//! The UCI engine: stdin loop on the front-end, one worker per search.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cozy_chess::Board;
use tracing::{debug, info, warn};

use garnet_search::position::move_to_uci;
use garnet_search::{
    is_mate, limits_from_go, mate_distance, Position, SearchControl, SearchInfo, Searcher,
};

use crate::command::{parse_command, Command, GoParams};

const ENGINE_NAME: &str = "garnet";
const ENGINE_AUTHOR: &str = "the garnet developers";

const HASH_DEFAULT_MB: usize = 16;
const HASH_MIN_MB: usize = 1;
const HASH_MAX_MB: usize = 2048;

/// Engine state owned by the front-end thread.
///
/// At most one search runs at a time. The worker owns the searcher
/// while it runs and prints all search output itself; every command
/// that mutates engine state first stops and joins the worker.
pub struct UciEngine {
    position: Position,
    searcher: Option<Searcher>,
    worker: Option<JoinHandle<Searcher>>,
    stop_flag: Arc<AtomicBool>,
}

impl UciEngine {
    /// Engine at the starting position with a default-sized table.
    pub fn new() -> Self {
        Self {
            position: Position::startpos(),
            searcher: Some(Searcher::with_hash(HASH_DEFAULT_MB)),
            worker: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read commands from stdin until `quit` or end of input.
    ///
    /// Malformed input is logged and skipped; it never terminates the
    /// engine.
    pub fn run(mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!(cmd = %line, "received command");

            match parse_command(line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.dispatch(command),
                Err(error) => warn!(%error, "ignoring malformed command"),
            }
        }
        self.join_worker();
        info!("shutting down");
    }

    fn dispatch(&mut self, command: Command) {
        match command {
            Command::Uci => {
                println!("id name {ENGINE_NAME}");
                println!("id author {ENGINE_AUTHOR}");
                println!(
                    "option name Hash type spin default {HASH_DEFAULT_MB} \
                     min {HASH_MIN_MB} max {HASH_MAX_MB}"
                );
                println!("uciok");
            }
            Command::IsReady => println!("readyok"),
            Command::UciNewGame => {
                self.join_worker();
                if let Some(searcher) = self.searcher.as_mut() {
                    searcher.clear_tt();
                }
                self.position = Position::startpos();
            }
            Command::SetOption { name, value } => self.set_option(&name, &value),
            Command::Position(position) => self.position = *position,
            Command::Go(params) => self.go(params),
            Command::Stop => self.stop_flag.store(true, Ordering::SeqCst),
            Command::Quit => {}
            Command::Unknown(command) => {
                if !command.is_empty() {
                    warn!(%command, "unknown command");
                }
            }
        }
    }

    /// Apply a `setoption`. Only `Hash` is recognised; option writes
    /// happen strictly between searches.
    fn set_option(&mut self, name: &str, value: &str) {
        if !name.eq_ignore_ascii_case("hash") {
            warn!(%name, "unsupported option");
            return;
        }
        match value.parse::<usize>() {
            Ok(mb) if (HASH_MIN_MB..=HASH_MAX_MB).contains(&mb) => {
                self.join_worker();
                if let Some(searcher) = self.searcher.as_mut() {
                    searcher.resize_tt(mb);
                }
                debug!(mb, "transposition table resized");
            }
            _ => warn!(
                %value,
                "Hash must be an integer number of megabytes in [{HASH_MIN_MB}, {HASH_MAX_MB}]"
            ),
        }
    }

    /// Launch a search worker for the current position.
    fn go(&mut self, params: GoParams) {
        self.join_worker();
        let Some(mut searcher) = self.searcher.take() else {
            return;
        };

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let limits = limits_from_go(
            params.wtime,
            params.btime,
            params.winc,
            params.binc,
            params.depth,
            params.nodes,
            params.movetime,
            params.infinite,
            self.position.side_to_move(),
        );
        let control = SearchControl::new(Arc::clone(&self.stop_flag), limits);
        let mut position = self.position.clone();

        self.worker = Some(std::thread::spawn(move || {
            let root = position.board().clone();
            let result = searcher.search(&mut position, &control, |info| {
                print_info(&root, info);
            });
            match result.best_move {
                Some(mv) => println!("bestmove {}", move_to_uci(&root, mv)),
                None => {
                    println!("info string no legal moves");
                    println!("bestmove 0000");
                }
            }
            searcher
        }));
    }

    /// Stop and retire the active worker, recovering the searcher.
    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.stop_flag.store(true, Ordering::SeqCst);
            match handle.join() {
                Ok(searcher) => self.searcher = Some(searcher),
                Err(_) => {
                    warn!("search worker panicked, rebuilding state");
                    self.searcher = Some(Searcher::with_hash(HASH_DEFAULT_MB));
                }
            }
        }
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit one `info` line for a completed iteration.
fn print_info(root: &Board, info: &SearchInfo) {
    let elapsed_ms = info.elapsed.as_millis().max(1);
    let nps = info.nodes as u128 * 1000 / elapsed_ms;
    let score = if is_mate(info.score) {
        format!("mate {}", mate_distance(info.score))
    } else {
        format!("cp {}", info.score)
    };

    // PV moves are formatted against the boards they are played on so
    // castling comes out in standard notation
    let mut board = root.clone();
    let mut pv = String::new();
    for &mv in info.pv {
        if !pv.is_empty() {
            pv.push(' ');
        }
        pv.push_str(&move_to_uci(&board, mv));
        board.play(mv);
    }

    println!(
        "info depth {} score {} seldepth {} nodes {} nps {} time {} pv {}",
        info.depth, score, info.seldepth, info.nodes, nps, elapsed_ms, pv
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_and_join_recovers_the_searcher() {
        let mut engine = UciEngine::new();
        engine.go(GoParams {
            depth: Some(2),
            ..GoParams::default()
        });
        assert!(engine.worker.is_some());
        assert!(engine.searcher.is_none(), "worker owns the searcher");

        engine.join_worker();
        assert!(engine.worker.is_none());
        assert!(engine.searcher.is_some(), "searcher returned on join");
    }

    #[test]
    fn second_go_replaces_the_first() {
        let mut engine = UciEngine::new();
        engine.go(GoParams {
            infinite: true,
            ..GoParams::default()
        });
        // The second go must stop and join the first worker
        engine.go(GoParams {
            depth: Some(1),
            ..GoParams::default()
        });
        engine.join_worker();
        assert!(engine.searcher.is_some());
    }

    #[test]
    fn out_of_range_hash_is_rejected() {
        let mut engine = UciEngine::new();
        engine.set_option("Hash", "0");
        engine.set_option("Hash", "999999");
        engine.set_option("Hash", "sixteen");
        engine.set_option("MultiPV", "2");
        // Engine state is untouched and usable
        assert!(engine.searcher.is_some());
        engine.set_option("Hash", "32");
        assert!(engine.searcher.is_some());
    }
}
