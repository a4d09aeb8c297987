//! Iterative-deepening driver with aspiration windows.

pub mod control;
pub mod heuristics;
mod negamax;
pub mod ordering;
pub mod see;
pub mod tt;

use std::time::Duration;

use cozy_chess::{Board, Move};
use tracing::debug;

use crate::eval::evaluate;
use crate::position::Position;
use crate::value::{is_mate, mate_in, mated_in, Value, DRAW};
use control::SearchControl;
use negamax::SearchContext;
use tt::{EntryKind, TranspositionTable};

/// Search stack size; no line grows past this many plies.
pub const MAX_PLY: usize = 128;

/// Starting half-width of the aspiration window.
const ASPIRATION_DELTA: i32 = 20;

/// Root scores within this margin of the previous iteration count as
/// stable for time management.
const STABILITY_MARGIN: i32 = 30;

/// Per-iteration report passed to the caller for `info` output.
pub struct SearchInfo<'a> {
    pub depth: u8,
    pub seldepth: u8,
    pub score: Value,
    pub nodes: u64,
    pub elapsed: Duration,
    pub pv: &'a [Move],
}

/// Outcome of a completed search request.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best move of the deepest completed iteration; `None` only when
    /// the root had no legal moves.
    pub best_move: Option<Move>,
    pub score: Value,
    pub depth: u8,
    pub seldepth: u8,
    pub nodes: u64,
}

/// Counts consecutive iterations with a steady root score.
struct StabilityTracker {
    previous: Option<Value>,
    streak: u32,
}

impl StabilityTracker {
    fn new() -> Self {
        Self {
            previous: None,
            streak: 0,
        }
    }

    fn update(&mut self, score: Value) -> u32 {
        match self.previous {
            Some(prev) if (score as i32 - prev as i32).abs() <= STABILITY_MARGIN => {
                self.streak += 1;
            }
            _ => self.streak = 0,
        }
        self.previous = Some(score);
        self.streak
    }
}

/// Owns the transposition table and runs search requests against it.
///
/// The table survives between requests (only its generation advances),
/// so consecutive searches of nearby positions reuse earlier work.
pub struct Searcher {
    tt: TranspositionTable,
}

impl Searcher {
    /// Searcher with the default 16 MB table.
    pub fn new() -> Self {
        Self::with_hash(16)
    }

    pub fn with_hash(mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(mb),
        }
    }

    /// Replace the table, discarding its contents.
    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    pub fn hashfull(&self) -> usize {
        self.tt.hashfull()
    }

    /// Run iterative deepening until a limit fires.
    ///
    /// `on_iter` is called after every completed iteration so the
    /// front-end can emit protocol output. The result always carries
    /// the deepest *completed* iteration; an interrupted iteration is
    /// discarded.
    pub fn search<F>(
        &mut self,
        pos: &mut Position,
        control: &SearchControl,
        mut on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(&SearchInfo),
    {
        self.tt.inc_generation();

        let legal = pos.legal_moves();
        if legal.is_empty() {
            debug!("no legal move at the root");
            return SearchResult {
                best_move: None,
                score: DRAW,
                depth: 0,
                seldepth: 0,
                nodes: 0,
            };
        }

        // A forced reply needs no search on the clock
        if control.competition() && legal.len() == 1 {
            return SearchResult {
                best_move: Some(legal[0]),
                score: evaluate(pos),
                depth: 1,
                seldepth: 0,
                nodes: 0,
            };
        }

        // Already drawn where we stand; keep the claim
        let root_drawn = pos.is_game_draw();

        let mut ctx = SearchContext::new(&mut self.tt, control);
        let mut stability = StabilityTracker::new();

        let mut completed_move: Option<Move> = None;
        let mut completed_value = DRAW;
        let mut completed_depth: u8 = 0;
        let mut previous_value = DRAW;
        let mut pv: Vec<Move> = Vec::new();

        let mut depth: u8 = 1;
        loop {
            ctx.prepare_iteration(depth);
            let value = aspiration(&mut ctx, pos, depth, previous_value);
            if ctx.interrupted {
                break;
            }
            previous_value = value;

            if let Some(mv) = ctx.root_move {
                completed_move = Some(mv);
            }
            completed_value = if root_drawn { DRAW } else { value };
            completed_depth = depth;

            pv = trace_pv(ctx.tt, pos.board(), depth as usize);
            if pv.is_empty()
                && let Some(mv) = completed_move
            {
                pv.push(mv);
            }

            on_iter(&SearchInfo {
                depth,
                seldepth: ctx.seldepth as u8,
                score: completed_value,
                nodes: ctx.nodes,
                elapsed: control.elapsed(),
                pv: &pv,
            });

            let streak = stability.update(value);

            if control.hit_hard_limit(depth, ctx.nodes) {
                break;
            }
            if control.competition() && is_mate(value) {
                break;
            }
            if control.hit_soft_limit(depth, ctx.nodes, streak) {
                break;
            }
            if depth as usize >= MAX_PLY - 1 {
                break;
            }
            depth += 1;
        }

        // Nothing completed at all: fall back to the first legal move
        let best_move = completed_move.or_else(|| legal.first().copied());

        SearchResult {
            best_move,
            score: completed_value,
            depth: completed_depth,
            seldepth: ctx.seldepth as u8,
            nodes: ctx.nodes,
        }
    }
}

impl Default for Searcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher").field("tt", &self.tt).finish()
    }
}

/// One iteration, windowed around the previous score from depth 3 on.
///
/// Fail-low pulls beta toward alpha and widens below; fail-high widens
/// above; the window resets at the next depth.
fn aspiration(ctx: &mut SearchContext, pos: &mut Position, depth: u8, previous: Value) -> Value {
    if depth < 3 {
        return ctx.negamax::<true>(pos, mated_in(0), mate_in(0), depth as i32, 0, false);
    }

    let mut delta = ASPIRATION_DELTA;
    let mut alpha = (previous as i32 - delta).max(mated_in(0) as i32) as Value;
    let mut beta = (previous as i32 + delta).min(mate_in(0) as i32) as Value;

    loop {
        let value = ctx.negamax::<true>(pos, alpha, beta, depth as i32, 0, false);
        if ctx.interrupted {
            return value;
        }
        if value <= alpha {
            beta = ((alpha as i32 + beta as i32) / 2) as Value;
            alpha = (alpha as i32 - delta).max(mated_in(0) as i32) as Value;
        } else if value >= beta {
            beta = (beta as i32 + delta).min(mate_in(0) as i32) as Value;
        } else {
            return value;
        }
        delta += delta / 2;
    }
}

/// Rebuild the principal variation by walking exact table entries from
/// the root, stopping at the first miss, bound, or illegal move.
fn trace_pv(tt: &TranspositionTable, root: &Board, max_len: usize) -> Vec<Move> {
    let mut board = root.clone();
    let mut pv = Vec::new();
    while pv.len() < max_len {
        let Some(entry) = tt.probe(board.hash(), 0) else {
            break;
        };
        if entry.kind != EntryKind::Exact {
            break;
        }
        let Some(mv) = entry.best_move else {
            break;
        };
        if !board.is_legal(mv) {
            break;
        }
        pv.push(mv);
        board.play(mv);
    }
    pv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::move_from_uci;
    use crate::time::Limits;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn infinite_control() -> SearchControl {
        SearchControl::infinite(Arc::new(AtomicBool::new(false)))
    }

    fn search_depth(searcher: &mut Searcher, pos: &mut Position, depth: u8) -> SearchResult {
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::depth(depth),
        );
        searcher.search(pos, &control, |_| {})
    }

    fn uci(result: &SearchResult, pos: &Position) -> String {
        crate::position::move_to_uci(pos.board(), result.best_move.expect("a best move"))
    }

    #[test]
    fn depth_1_returns_legal_move() {
        let mut pos = Position::startpos();
        let result = search_depth(&mut Searcher::new(), &mut pos, 1);
        let mv = result.best_move.expect("move at depth 1");
        assert!(pos.is_legal(mv));
        assert_eq!(result.depth, 1);
    }

    #[test]
    fn finds_back_rank_mate_in_one() {
        let mut pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut searcher = Searcher::new();
        let result = search_depth(&mut searcher, &mut pos, 4);
        assert_eq!(uci(&result, &pos), "a1a8");
        assert_eq!(result.score, mate_in(1));
    }

    #[test]
    fn finds_scholars_mate() {
        let mut pos = Position::from_fen(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
        )
        .unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 4);
        assert_eq!(uci(&result, &pos), "h5f7");
        assert!(is_mate(result.score));
    }

    #[test]
    fn cornered_king_is_mated() {
        let mut pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 w - - 0 1").unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 6);
        assert!(
            is_mate(result.score) && result.score > 0,
            "expected a mating line, got {}",
            result.score
        );
    }

    #[test]
    fn avoids_stalemate_trap() {
        // Qc7 boxes the king in completely without check
        let mut pos = Position::from_fen("k7/8/2Q5/8/8/8/8/2K5 w - - 0 1").unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 4);
        assert_ne!(uci(&result, &pos), "c6c7", "must not throw the win away");
        assert!(result.score > 500, "queen endgame is winning: {}", result.score);
    }

    #[test]
    fn quiescence_keeps_eval_near_stand_pat() {
        let mut pos = Position::from_fen(
            "r3k2r/pppq1ppp/2n2n2/3pp3/3PP3/2N2N2/PPPQ1PPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let stand_pat = evaluate(&pos) as i32;
        let result = search_depth(&mut Searcher::new(), &mut pos, 1);
        let diff = (result.score as i32 - stand_pat).abs();
        assert!(diff <= 60, "depth-1 score drifted {diff}cp from stand pat");
    }

    #[test]
    fn threefold_repetition_scores_zero() {
        let mut pos = Position::startpos();
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = move_from_uci(pos.board(), mv).unwrap();
            pos.make_move(mv);
        }
        // Start position on the board for the third time
        let result = search_depth(&mut Searcher::new(), &mut pos, 3);
        assert_eq!(result.score, DRAW);
    }

    #[test]
    fn node_budget_is_respected() {
        let mut pos = Position::startpos();
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::nodes(2000),
        );
        let result = Searcher::new().search(&mut pos, &control, |_| {});
        assert!(result.best_move.is_some());
        assert!(
            result.nodes <= 2200,
            "nodes {} exceeded the budget with slack",
            result.nodes
        );
    }

    #[test]
    fn movetime_search_terminates() {
        let mut pos = Position::startpos();
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::movetime(std::time::Duration::from_millis(100)),
        );
        let start = std::time::Instant::now();
        let result = Searcher::new().search(&mut pos, &control, |_| {});
        assert!(result.best_move.is_some());
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn single_reply_answered_instantly_on_the_clock() {
        // Only Kb1 is legal
        let mut pos = Position::from_fen("7k/8/8/8/8/8/6q1/K7 w - - 0 1").unwrap();
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::clock(
                std::time::Duration::from_secs(60),
                std::time::Duration::ZERO,
            ),
        );
        let result = Searcher::new().search(&mut pos, &control, |_| {});
        assert_eq!(uci(&result, &pos), "a1b1");
        assert_eq!(result.nodes, 0, "forced replies are not searched");
    }

    #[test]
    fn mated_root_reports_null_move() {
        let mut pos = Position::from_fen("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1").unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 2);
        assert!(result.best_move.is_none());
    }

    #[test]
    fn stalemate_root_reports_null_move_and_draw() {
        let mut pos = Position::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 2);
        assert!(result.best_move.is_none());
        assert_eq!(result.score, DRAW);
    }

    #[test]
    fn iteration_callback_reports_increasing_depths() {
        let mut pos = Position::startpos();
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::depth(5),
        );
        let mut depths = Vec::new();
        Searcher::new().search(&mut pos, &control, |info| {
            depths.push(info.depth);
            assert!(!info.pv.is_empty(), "every info line carries a PV");
        });
        assert_eq!(depths, vec![1, 2, 3, 4, 5], "aspiration must not skip depths");
    }

    #[test]
    fn pv_starts_with_best_move() {
        let mut pos = Position::startpos();
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::depth(5),
        );
        let mut last_pv = Vec::new();
        let result = Searcher::new().search(&mut pos, &control, |info| {
            last_pv = info.pv.to_vec();
        });
        assert_eq!(last_pv.first().copied(), result.best_move);
        assert!(last_pv.len() >= 2, "PV at depth 5 should have length >= 2");
    }

    #[test]
    fn search_is_deterministic_from_cold_tables() {
        let fen = "r2qkbnr/ppp2ppp/2np4/4p3/2B1P1b1/2N2N2/PPPP1PPP/R1BQK2R w KQkq - 0 1";
        let mut first = Position::from_fen(fen).unwrap();
        let mut second = Position::from_fen(fen).unwrap();
        let a = search_depth(&mut Searcher::new(), &mut first, 5);
        let b = search_depth(&mut Searcher::new(), &mut second, 5);
        assert_eq!(a.best_move, b.best_move);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn warm_table_still_finds_the_mate() {
        let mut pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut searcher = Searcher::new();
        let first = search_depth(&mut searcher, &mut pos, 4);
        let second = search_depth(&mut searcher, &mut pos, 4);
        assert_eq!(first.best_move, second.best_move);
        assert_eq!(second.score, mate_in(1));
    }

    #[test]
    fn stop_flag_aborts_deep_search() {
        let mut pos = Position::startpos();
        let stopped = Arc::new(AtomicBool::new(false));
        let control = SearchControl::infinite(Arc::clone(&stopped));

        let stop = Arc::clone(&stopped);
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            stop.store(true, Ordering::SeqCst);
        });

        let result = Searcher::new().search(&mut pos, &control, |_| {});
        assert!(result.depth < MAX_PLY as u8);
        assert!(result.best_move.is_some(), "a completed iteration survives");
    }

    #[test]
    fn immediate_stop_still_produces_a_move() {
        let mut pos = Position::startpos();
        let stopped = Arc::new(AtomicBool::new(true));
        let control = SearchControl::infinite(stopped);
        let result = Searcher::new().search(&mut pos, &control, |_| {});
        // No iteration completed, but the engine must still move
        assert!(result.best_move.is_some());
        assert_eq!(result.depth, 0);
    }

    #[test]
    fn deeper_search_does_not_hang_material() {
        // White to move with a queen en prise; depth 6 must save it
        let mut pos =
            Position::from_fen("r2q1rk1/ppp2ppp/2n2n2/3p4/3P2Q1/2N1P3/PP3PPP/R1B1KB1R w KQ - 0 1")
                .unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 6);
        assert!(
            result.score > -200,
            "score {} suggests the queen was lost",
            result.score
        );
    }

    #[test]
    fn promotion_race_is_won() {
        let mut pos = Position::from_fen("8/6P1/8/8/8/7k/1K6/8 w - - 0 1").unwrap();
        let result = search_depth(&mut Searcher::new(), &mut pos, 6);
        assert!(result.score > 500, "promotion should dominate: {}", result.score);
    }
}
