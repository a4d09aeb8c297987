//! Staged move picker.
//!
//! Yields legal moves lazily, most promising first, so that alpha rises
//! quickly and the rest of the tree is cut:
//!
//! ```text
//! HASH -> GEN_NOISY -> GOOD_NOISY -> KILLER_1 -> KILLER_2
//!      -> GEN_QUIET -> GOOD_QUIET -> BAD_NOISY -> BAD_QUIET -> END
//! ```
//!
//! Quiescence uses a shorter pipeline: all evasions when in check,
//! otherwise captures and promotions only. Every legal move is yielded
//! at most once; the hash move and killers are skipped when they
//! resurface in a later stage.

use std::sync::OnceLock;

use cozy_chess::{get_pawn_attacks, Move, Piece};

use crate::position::Position;
use crate::search::heuristics::SearchHistory;
use crate::search::see::see_ge;

/// MVV-LVA base scores, indexed by `[aggressor][victim]`. The final
/// column covers moves with no victim (promotions to empty squares).
const MVV_LVA: [[i32; 7]; 7] = [
    //     P     N     B     R     Q   K  none
    [      0,  200,  250,  450,  900,  0,  0], // P
    [   -200,   10,   50,  250,  700,  0,  0], // N
    [   -250,  -50,    5,  200,  650,  0,  0], // B
    [   -450, -250, -200,   15,  450,  0,  0], // R
    [   -900, -700, -650, -450,   20,  0,  0], // Q
    [      0,    0,    0,    0,    0,  0,  0], // K
    [      0,    0,    0,    0,    0,  0,  0],
];

const CHECK_BONUS: i32 = 200;
const PROMOTION_BONUS: i32 = 200;
const PAWN_SQUARE_PENALTY: i32 = 200;
const LOSING_CAPTURE_PENALTY: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    HashMove,
    GenNoisy,
    GoodNoisy,
    Killer1,
    Killer2,
    GenQuiet,
    GoodQuiet,
    BadNoisy,
    BadQuiet,
    GenQsearch,
    GoodQsearch,
    End,
}

#[derive(Clone, Copy)]
struct ScoredMove {
    mv: Move,
    score: i32,
}

/// Lazy staged iterator over the legal moves of one node.
pub struct MovePicker {
    stage: Stage,
    hash_move: Option<Move>,
    killers: [Option<Move>; 2],
    /// Sorted ascending; the picker pops from the back.
    noisy: Vec<ScoredMove>,
    quiet: Vec<ScoredMove>,
    skip_quiets: bool,
    in_check: bool,
}

impl MovePicker {
    /// Picker for the main search.
    pub fn new(hash_move: Option<Move>, killers: [Option<Move>; 2]) -> Self {
        Self {
            stage: Stage::HashMove,
            hash_move,
            killers,
            noisy: Vec::new(),
            quiet: Vec::new(),
            skip_quiets: false,
            in_check: false,
        }
    }

    /// Picker for quiescence: evasions in check, else captures and
    /// promotions.
    pub fn new_qsearch() -> Self {
        Self {
            stage: Stage::GenQsearch,
            hash_move: None,
            killers: [None; 2],
            noisy: Vec::new(),
            quiet: Vec::new(),
            skip_quiets: false,
            in_check: false,
        }
    }

    /// Stop yielding quiet moves. Quiets not yet generated are never
    /// generated; quiets already buffered are dropped. Tactical moves
    /// keep flowing.
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    fn is_killer(&self, mv: Move) -> bool {
        self.killers.contains(&Some(mv))
    }

    /// The next move to search, or `None` when exhausted.
    pub fn next(&mut self, pos: &Position, history: &SearchHistory) -> Option<Move> {
        loop {
            match self.stage {
                Stage::HashMove => {
                    self.stage = Stage::GenNoisy;
                    if let Some(mv) = self.hash_move
                        && pos.is_legal(mv)
                    {
                        return Some(mv);
                    }
                }

                Stage::GenNoisy => {
                    self.generate_noisy(pos, history);
                    self.stage = Stage::GoodNoisy;
                }

                Stage::GoodNoisy => {
                    while let Some(&top) = self.noisy.last() {
                        if top.score < 0 {
                            break; // only losing captures remain
                        }
                        self.noisy.pop();
                        if Some(top.mv) == self.hash_move {
                            continue;
                        }
                        return Some(top.mv);
                    }
                    self.stage = Stage::Killer1;
                }

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    if let Some(mv) = self.killers[0]
                        && Some(mv) != self.hash_move
                        && pos.is_quiet_legal(mv)
                    {
                        return Some(mv);
                    }
                }

                Stage::Killer2 => {
                    self.stage = Stage::GenQuiet;
                    if let Some(mv) = self.killers[1]
                        && Some(mv) != self.hash_move
                        && pos.is_quiet_legal(mv)
                    {
                        return Some(mv);
                    }
                }

                Stage::GenQuiet => {
                    if !self.skip_quiets {
                        self.generate_quiet(pos, history);
                    }
                    self.stage = Stage::GoodQuiet;
                }

                Stage::GoodQuiet => {
                    if self.skip_quiets {
                        self.quiet.clear();
                    }
                    while let Some(&top) = self.quiet.last() {
                        if top.score < 0 {
                            break;
                        }
                        self.quiet.pop();
                        if Some(top.mv) == self.hash_move || self.is_killer(top.mv) {
                            continue;
                        }
                        return Some(top.mv);
                    }
                    self.stage = Stage::BadNoisy;
                }

                Stage::BadNoisy => {
                    while let Some(top) = self.noisy.pop() {
                        if Some(top.mv) == self.hash_move {
                            continue;
                        }
                        return Some(top.mv);
                    }
                    self.stage = Stage::BadQuiet;
                }

                Stage::BadQuiet => {
                    if self.skip_quiets {
                        self.quiet.clear();
                    }
                    while let Some(top) = self.quiet.pop() {
                        if Some(top.mv) == self.hash_move || self.is_killer(top.mv) {
                            continue;
                        }
                        return Some(top.mv);
                    }
                    self.stage = Stage::End;
                }

                Stage::GenQsearch => {
                    self.in_check = pos.in_check();
                    if self.in_check {
                        // Evade with anything; ordering matters little here
                        self.noisy = pos
                            .legal_moves()
                            .into_iter()
                            .map(|mv| ScoredMove { mv, score: 0 })
                            .collect();
                    } else {
                        self.generate_noisy(pos, history);
                    }
                    self.stage = Stage::GoodQsearch;
                }

                Stage::GoodQsearch => {
                    while let Some(&top) = self.noisy.last() {
                        if !self.in_check && top.score < 0 {
                            break;
                        }
                        self.noisy.pop();
                        return Some(top.mv);
                    }
                    self.stage = Stage::End;
                }

                Stage::End => return None,
            }
        }
    }

    /// Generate captures (including en passant) and promotions, scored
    /// by MVV-LVA and vetted by static exchange evaluation.
    fn generate_noisy(&mut self, pos: &Position, history: &SearchHistory) {
        let side = pos.side_to_move();
        for mv in pos.legal_moves() {
            if !pos.is_capture(mv) && mv.promotion.is_none() {
                continue;
            }

            let aggressor = pos.piece_on(mv.from).unwrap_or(Piece::Pawn);
            let victim = pos.victim_of(mv);
            let mut score = MVV_LVA[aggressor as usize][victim.map_or(6, |v| v as usize)];

            if see_ge(pos, mv, 0) {
                if mv.promotion == Some(Piece::Queen) {
                    score += PROMOTION_BONUS;
                }
                if let Some(victim) = pos.piece_on(mv.to) {
                    score += history.capture.get(side, aggressor, mv.to, victim) as i32 / 16;
                }
                if pos.is_check_move(mv) {
                    score += CHECK_BONUS;
                }
            } else {
                score -= LOSING_CAPTURE_PENALTY;
            }

            self.noisy.push(ScoredMove { mv, score });
        }
        self.noisy.sort_by_key(|entry| entry.score);
    }

    /// Generate the remaining quiet moves, scored by tactical hints and
    /// the quiet-history table.
    fn generate_quiet(&mut self, pos: &Position, history: &SearchHistory) {
        let side = pos.side_to_move();
        let enemy_pawns = pos.pieces(Piece::Pawn) & pos.colors(!side);

        for mv in pos.legal_moves() {
            if pos.is_capture(mv) || mv.promotion.is_some() {
                continue;
            }

            let mut score = 0i32;
            if pos.is_check_move(mv) {
                score += CHECK_BONUS;
            }
            // Walking a piece into an enemy pawn's mouth rarely helps
            if pos.piece_on(mv.from) != Some(Piece::Pawn)
                && !(get_pawn_attacks(mv.to, side) & enemy_pawns).is_empty()
            {
                score -= PAWN_SQUARE_PENALTY;
            }
            score += history.quiet.get(side, mv) as i32;

            self.quiet.push(ScoredMove { mv, score });
        }
        self.quiet.sort_by_key(|entry| entry.score);
    }
}

// ---------------------------------------------------------------------------
// Late-move-reduction table
// ---------------------------------------------------------------------------

static LMR_TABLE: OnceLock<[[i32; 64]; 64]> = OnceLock::new();

fn lmr_table() -> &'static [[i32; 64]; 64] {
    LMR_TABLE.get_or_init(|| {
        let mut table = [[0i32; 64]; 64];
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (moves, slot) in row.iter_mut().enumerate().skip(1) {
                *slot = (0.9 + (depth as f64).sqrt() * (moves as f64).sqrt() / 3.0)
                    .round() as i32;
            }
        }
        table
    })
}

/// Base reduction for the `moves`-th move at the given remaining depth.
pub fn lmr_reduction(depth: i32, moves: usize) -> i32 {
    lmr_table()[depth.clamp(0, 63) as usize][moves.min(63)]
}
