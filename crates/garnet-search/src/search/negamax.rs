//! Negamax with principal-variation search, pruning, and quiescence.

use cozy_chess::{Move, Piece};

use crate::eval::evaluate;
use crate::position::Position;
use crate::search::control::SearchControl;
use crate::search::heuristics::{SearchHistory, StackEntry};
use crate::search::ordering::{lmr_reduction, MovePicker};
use crate::search::see::{exchange_value, see_ge};
use crate::search::tt::{EntryKind, TranspositionTable, TtProbe};
use crate::search::MAX_PLY;
use crate::value::{is_mate, mate_in, mated_in, Value, DRAW, MATED, VALUE_NONE};

/// Quiescence depth budget below the nominal horizon.
const MAX_QSEARCH_DEPTH: i32 = 8;

/// Whether a stored bound settles the current window.
fn entry_proves(entry: &TtProbe, alpha: Value, beta: Value) -> bool {
    match entry.kind {
        EntryKind::Exact => true,
        EntryKind::UpperBound => entry.value <= alpha,
        EntryKind::LowerBound => entry.value >= beta,
        EntryKind::None => false,
    }
}

/// Mutable search state threaded through the recursion.
///
/// Owns everything a node may touch: transposition table, history
/// tables, the per-ply stack, and the statistics counters. One context
/// lives for one search request.
pub(crate) struct SearchContext<'a> {
    pub tt: &'a mut TranspositionTable,
    pub control: &'a SearchControl,
    pub history: SearchHistory,
    pub stack: [StackEntry; MAX_PLY],
    pub nodes: u64,
    pub seldepth: usize,
    /// Depth of the iteration currently running, for limit queries.
    pub iter_depth: u8,
    /// Set once an abort is observed; the driver discards the iteration.
    pub interrupted: bool,
    /// Best root move of the current iteration.
    pub root_move: Option<Move>,
}

impl<'a> SearchContext<'a> {
    pub fn new(tt: &'a mut TranspositionTable, control: &'a SearchControl) -> Self {
        Self {
            tt,
            control,
            history: SearchHistory::new(),
            stack: [StackEntry::EMPTY; MAX_PLY],
            nodes: 0,
            seldepth: 0,
            iter_depth: 1,
            interrupted: false,
            root_move: None,
        }
    }

    /// Reset per-iteration state. Histories persist between iterations;
    /// killers do not.
    pub fn prepare_iteration(&mut self, depth: u8) {
        self.iter_depth = depth;
        self.root_move = None;
        self.history.killers.clear();
    }

    /// Abort predicate; latches `interrupted` so every active frame
    /// unwinds promptly.
    fn should_abort(&mut self) -> bool {
        if self.interrupted {
            return true;
        }
        if self.control.hit_hard_limit(self.iter_depth, self.nodes) {
            self.interrupted = true;
            return true;
        }
        false
    }

    /// Negamax over the window `(alpha, beta)`.
    ///
    /// `PV` selects the principal-variation specialisation at compile
    /// time; non-PV callers always pass a null window. Returns a bound
    /// on the minimax value: upper when `<= alpha`, lower when
    /// `>= beta`, exact in between. Aborted frames return `alpha`,
    /// which must not be trusted or stored.
    pub fn negamax<const PV: bool>(
        &mut self,
        pos: &mut Position,
        mut alpha: Value,
        mut beta: Value,
        mut depth: i32,
        ply: usize,
        cutnode: bool,
    ) -> Value {
        debug_assert!(alpha < beta);
        debug_assert!(!(PV && cutnode));

        if self.should_abort() {
            return alpha;
        }
        self.nodes += 1;

        let in_check = pos.in_check();

        if depth <= 0 && !in_check {
            return self.qsearch::<PV>(pos, alpha, beta, MAX_QSEARCH_DEPTH, ply);
        }
        if ply >= MAX_PLY - 1 {
            return if in_check { DRAW } else { evaluate(pos) };
        }

        let is_root = ply == 0;
        if !is_root && pos.is_draw() {
            return DRAW;
        }

        // Mate distance pruning: even a forced mate from here cannot
        // beat one already found closer to the root.
        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply));
        if alpha >= beta {
            return alpha;
        }

        let entry = self.tt.probe(pos.hash(), ply);

        // A sufficiently deep entry whose bound settles the window ends
        // the node outright at non-PV nodes; PV nodes only shrink.
        let mut skip_store = false;
        if let Some(e) = entry
            && !is_root
            && e.depth as i32 >= depth + if PV { 2 } else { 0 }
            && entry_proves(&e, alpha, beta)
        {
            if PV {
                depth -= 1;
                skip_store = true;
            } else {
                return e.value;
            }
        }

        let static_eval = if in_check { VALUE_NONE } else { evaluate(pos) };
        self.stack[ply].static_eval = static_eval;
        self.stack[ply].in_check = in_check;

        if !PV && !in_check {
            let eval = static_eval as i32;

            // Reverse futility: an eval far above beta rarely comes back
            if depth <= 8 && !is_mate(alpha) && eval - (200 + 100 * depth) >= beta as i32 {
                return (beta as i32 + (eval - beta as i32) / 4) as Value;
            }

            // Razoring: hopeless nodes drop straight into quiescence
            if depth <= 5 && eval + 500 + 100 * depth < alpha as i32 {
                return self.qsearch::<false>(pos, alpha, beta, MAX_QSEARCH_DEPTH, ply);
            }

            // Null move: if passing the turn still beats beta, an actual
            // move will too. Skipped without non-pawn material, where
            // zugzwang breaks the assumption.
            let tt_allows = match entry {
                Some(e) => cutnode || e.value >= beta,
                None => true,
            };
            if self.stack[ply].null_move_allowed
                && depth >= 3
                && static_eval >= beta
                && tt_allows
                && pos.has_non_pawn_material()
                && pos.make_null()
            {
                let r = 2 + depth / 3;
                self.stack[ply].current_move = None;
                self.stack[ply + 1].null_move_allowed = false;
                let value =
                    -self.negamax::<false>(pos, -beta, -beta + 1, depth - r, ply + 1, !cutnode);
                pos.unmake_null();
                self.stack[ply + 1].null_move_allowed = true;

                if self.interrupted {
                    return alpha;
                }
                if value >= beta {
                    let verified = if depth >= 14 {
                        // Re-search without the null move before trusting
                        // a deep shortcut
                        self.stack[ply].null_move_allowed = false;
                        let v = self
                            .negamax::<false>(pos, beta - 1, beta, depth - r, ply, cutnode);
                        self.stack[ply].null_move_allowed = true;
                        v >= beta
                    } else {
                        true
                    };
                    if verified {
                        // Mates from a null search are not proven
                        return if is_mate(value) { beta } else { value };
                    }
                }
            }
        }

        // The hash move is only worth trying first when the entry
        // searched at least this deep, or the node expects to fail high.
        let hash_move = entry.and_then(|e| {
            if e.depth as i32 >= depth || cutnode {
                e.best_move
            } else {
                None
            }
        });

        let mut picker = MovePicker::new(hash_move, self.history.killers.at(ply));
        let mut best_value = VALUE_NONE;
        let mut best_move: Option<Move> = None;
        let mut kind = EntryKind::UpperBound;
        let mut moves_searched = 0usize;
        let mut tried_quiets: Vec<Move> = Vec::new();
        let mut tried_captures: Vec<Move> = Vec::new();

        while let Some(mv) = picker.next(pos, &self.history) {
            let is_capture = pos.is_capture(mv);
            let tactical = is_capture || mv.promotion.is_some();
            let gives_check = pos.is_check_move(mv);

            // Late quiets at shallow depth stop paying their way; tell
            // the picker to stop producing them
            if !PV
                && !is_root
                && !in_check
                && depth <= 4
                && moves_searched >= (4 + 2 * depth) as usize
            {
                picker.skip_quiets();
            }

            // Skip moves that lose too much material at shallow depth
            if !PV && !is_root && depth <= 8 && moves_searched > 0 {
                let threshold = if tactical {
                    -(20 + 24 * depth * depth)
                } else {
                    -40 * depth
                };
                if !see_ge(pos, mv, threshold) {
                    continue;
                }
            }

            self.stack[ply].current_move = Some(mv);
            pos.make_move(mv);

            let mut value;
            if moves_searched == 0 {
                let child_cutnode = !PV && !cutnode;
                value =
                    -self.negamax::<PV>(pos, -beta, -alpha, depth - 1, ply + 1, child_cutnode);
            } else {
                // Later moves are expected to fail low; search them with
                // a null window at reduced depth first.
                let mut reduction = 0;
                if depth >= 3 && moves_searched >= 3 {
                    reduction = lmr_reduction(depth, moves_searched);
                    if tactical || gives_check || PV || !cutnode {
                        reduction /= 2;
                    }
                    reduction = reduction.clamp(0, depth - 1);
                }

                value = -self.negamax::<false>(
                    pos,
                    -alpha - 1,
                    -alpha,
                    depth - 1 - reduction,
                    ply + 1,
                    !cutnode,
                );
                if value > alpha && reduction > 0 {
                    value = -self.negamax::<false>(
                        pos,
                        -alpha - 1,
                        -alpha,
                        depth - 1,
                        ply + 1,
                        !cutnode,
                    );
                }
                if PV && value > alpha && value < beta {
                    value = -self.negamax::<true>(pos, -beta, -alpha, depth - 1, ply + 1, false);
                }
            }

            pos.unmake_move();
            if self.should_abort() {
                return alpha;
            }

            moves_searched += 1;
            if is_capture {
                tried_captures.push(mv);
            } else {
                tried_quiets.push(mv);
            }

            if value > best_value {
                best_value = value;
            }
            if value > alpha {
                alpha = value;
                best_move = Some(mv);
                self.stack[ply].best_move = Some(mv);
                kind = EntryKind::Exact;

                if is_root {
                    self.root_move = Some(mv);
                }

                if value >= beta {
                    kind = EntryKind::LowerBound;
                    self.update_histories(pos, mv, depth, ply, &tried_quiets, &tried_captures);
                    break;
                }
            }
        }

        if moves_searched == 0 {
            return if in_check { mated_in(ply) } else { DRAW };
        }

        if !skip_store && !self.interrupted {
            self.tt.store(
                pos.hash(),
                kind,
                depth.clamp(0, i8::MAX as i32) as i8,
                best_move,
                best_value,
                ply,
            );
        }
        best_value
    }

    /// Reward the cutoff move and punish its tried siblings of the same
    /// class. Quiet cutoffs additionally become killers for this ply.
    fn update_histories(
        &mut self,
        pos: &Position,
        cutoff: Move,
        depth: i32,
        ply: usize,
        tried_quiets: &[Move],
        tried_captures: &[Move],
    ) {
        let side = pos.side_to_move();
        let bonus = depth * depth;

        if pos.is_capture(cutoff) {
            // En-passant cutoffs land here with an empty victim square
            // and are deliberately not scored.
            if let Some(victim) = pos.piece_on(cutoff.to) {
                let aggressor = pos.piece_on(cutoff.from).unwrap_or(Piece::Pawn);
                self.history
                    .capture
                    .update(side, aggressor, cutoff.to, victim, bonus);
            }
            for &mv in tried_captures.iter().filter(|&&mv| mv != cutoff) {
                if let Some(victim) = pos.piece_on(mv.to) {
                    let aggressor = pos.piece_on(mv.from).unwrap_or(Piece::Pawn);
                    self.history
                        .capture
                        .update(side, aggressor, mv.to, victim, -bonus);
                }
            }
        } else {
            self.history.killers.add(ply, cutoff);
            self.history.quiet.update(side, cutoff, bonus);
            for &mv in tried_quiets.iter().filter(|&&mv| mv != cutoff) {
                self.history.quiet.update(side, mv, -bonus);
            }
        }
    }

    /// Quiescence: search captures, promotions, and check evasions past
    /// the horizon so the returned evaluation is tactically quiet.
    pub fn qsearch<const PV: bool>(
        &mut self,
        pos: &mut Position,
        mut alpha: Value,
        beta: Value,
        depth: i32,
        ply: usize,
    ) -> Value {
        if self.should_abort() {
            return alpha;
        }
        self.nodes += 1;

        if pos.is_draw() {
            return DRAW;
        }

        let in_check = pos.in_check();
        if depth <= 0 || ply >= MAX_PLY {
            return if in_check { DRAW } else { evaluate(pos) };
        }
        if PV && ply > self.seldepth {
            self.seldepth = ply;
        }

        if !PV
            && let Some(e) = self.tt.probe(pos.hash(), ply)
            && entry_proves(&e, alpha, beta)
        {
            return e.value;
        }

        let mut best = MATED;
        let mut static_eval = VALUE_NONE;
        if !in_check {
            // Stand pat: the side to move may decline all captures
            static_eval = evaluate(pos);
            if static_eval >= beta {
                return static_eval;
            }
            if static_eval > alpha {
                alpha = static_eval;
            }
            best = static_eval;
        }

        let previous_dest = if ply > 0 {
            self.stack[ply - 1].current_move.map(|mv| mv.to)
        } else {
            None
        };

        let mut picker = MovePicker::new_qsearch();
        let mut moves_searched = 0usize;

        while let Some(mv) = picker.next(pos, &self.history) {
            if !in_check {
                // Delta pruning: even winning this victim outright
                // cannot lift alpha
                if let Some(victim) = pos.victim_of(mv)
                    && (static_eval as i32) + exchange_value(victim) + 200 < alpha as i32
                {
                    continue;
                }
                // Materially losing captures are not worth resolving,
                // except immediate recaptures
                if previous_dest != Some(mv.to) && !see_ge(pos, mv, -6) {
                    continue;
                }
            }

            self.stack[ply].current_move = Some(mv);
            pos.make_move(mv);
            let value = -self.qsearch::<PV>(pos, -beta, -alpha, depth - 1, ply + 1);
            pos.unmake_move();
            if self.should_abort() {
                return alpha;
            }

            moves_searched += 1;
            if value > best {
                best = value;
            }
            if value > alpha {
                alpha = value;
                if value >= beta {
                    break;
                }
            }
        }

        if moves_searched == 0 && in_check {
            return mated_in(ply);
        }
        best
    }
}
