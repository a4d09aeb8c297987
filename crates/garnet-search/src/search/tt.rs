//! Transposition table with generation-based replacement.

use cozy_chess::Move;

use crate::position::{decode_move, encode_move};
use crate::value::{Value, MATE_THRESHOLD};

/// Bound kind stored with a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// Empty slot.
    None = 0,
    /// Exact score (PV node).
    Exact = 1,
    /// Fail-low: the real score is at most the stored value.
    UpperBound = 2,
    /// Fail-high: the real score is at least the stored value.
    LowerBound = 3,
}

/// One table slot. The full hash is kept for collision verification.
#[derive(Clone, Copy)]
struct TtEntry {
    zobrist: u64,
    depth: i8,
    age: u8,
    kind: EntryKind,
    move_code: u16,
    value: Value,
}

impl TtEntry {
    const EMPTY: Self = Self {
        zobrist: 0,
        depth: 0,
        age: 0,
        kind: EntryKind::None,
        move_code: 0,
        value: 0,
    };
}

/// Copy of a matching entry handed to the search.
///
/// The value has already been converted from node-relative back to
/// root-relative mate encoding.
#[derive(Debug, Clone, Copy)]
pub struct TtProbe {
    pub depth: i8,
    pub kind: EntryKind,
    pub best_move: Option<Move>,
    pub value: Value,
}

/// Re-express a score relative to the stored node.
///
/// Mate scores are path-dependent (`MATE - plies_from_root`); stored as
/// distance from the node itself they stay valid wherever the position
/// is reached again.
fn value_to_tt(value: Value, ply: usize) -> Value {
    if value >= MATE_THRESHOLD {
        (value as i32 + ply as i32).min(i16::MAX as i32) as Value
    } else if value <= -MATE_THRESHOLD {
        (value as i32 - ply as i32).max(-(i16::MAX as i32)) as Value
    } else {
        value
    }
}

/// Reverse of [`value_to_tt`] for the probing node's ply.
fn value_from_tt(value: Value, ply: usize) -> Value {
    if value >= MATE_THRESHOLD {
        (value as i32 - ply as i32) as Value
    } else if value <= -MATE_THRESHOLD {
        (value as i32 + ply as i32) as Value
    } else {
        value
    }
}

/// Fixed-slot transposition table indexed by `hash % len`.
pub struct TranspositionTable {
    entries: Box<[TtEntry]>,
    occupied: usize,
    generation: u8,
}

impl TranspositionTable {
    /// Allocate a table of the given size in megabytes.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let len = (bytes / std::mem::size_of::<TtEntry>()).max(1);
        Self {
            entries: vec![TtEntry::EMPTY; len].into_boxed_slice(),
            occupied: 0,
            generation: 0,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Wipe all entries, keeping the allocation.
    pub fn clear(&mut self) {
        self.entries.fill(TtEntry::EMPTY);
        self.occupied = 0;
        self.generation = 0;
    }

    /// Advance the generation counter; called once per search request so
    /// that stale entries lose replacement priority.
    pub fn inc_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Permille of occupied slots, for `info hashfull` style reporting.
    pub fn hashfull(&self) -> usize {
        self.occupied * 1000 / self.entries.len()
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash % self.entries.len() as u64) as usize
    }

    /// Look up a position. Returns a copy of the slot when the full
    /// hash matches; the value is mate-adjusted for the probing ply.
    pub fn probe(&self, hash: u64, ply: usize) -> Option<TtProbe> {
        let entry = &self.entries[self.index(hash)];
        if entry.kind == EntryKind::None || entry.zobrist != hash {
            return None;
        }
        Some(TtProbe {
            depth: entry.depth,
            kind: entry.kind,
            best_move: decode_move(entry.move_code),
            value: value_from_tt(entry.value, ply),
        })
    }

    /// Store a search result.
    ///
    /// The slot is replaced when it is empty, holds the same position,
    /// comes from an older generation, or is strictly shallower. A
    /// same-position overwrite without a best move keeps the old one.
    pub fn store(
        &mut self,
        hash: u64,
        kind: EntryKind,
        depth: i8,
        best_move: Option<Move>,
        value: Value,
        ply: usize,
    ) {
        let generation = self.generation;
        let index = self.index(hash);
        let slot = &mut self.entries[index];
        let mut move_code = best_move.map(encode_move).unwrap_or(0);

        let replace = if slot.kind == EntryKind::None {
            self.occupied += 1;
            true
        } else if slot.zobrist == hash {
            if move_code == 0 {
                move_code = slot.move_code;
            }
            true
        } else {
            slot.age != generation || depth > slot.depth
        };

        if replace {
            *slot = TtEntry {
                zobrist: hash,
                depth,
                age: generation,
                kind,
                move_code,
                value: value_to_tt(value, ply),
            };
        }
    }
}

impl std::fmt::Debug for TranspositionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranspositionTable")
            .field("entries", &self.entries.len())
            .field("occupied", &self.occupied)
            .field("generation", &self.generation)
            .finish()
    }
}
