//! Training-data annotation.
//!
//! Reads one FEN per line, runs a fixed-node search on each position,
//! and appends one binary record per position to `<input>.analysis`:
//! six piece-type bitboards for the side to move, six for the opponent,
//! the two occupancy bitboards, and a clamped little-endian `i16`
//! evaluation. Bitboards are rank-mirrored when Black is to move so
//! every record reads from the side-to-move point of view.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use cozy_chess::{BitBoard, Color, Piece, Rank};
use tracing::{info, warn};

use garnet_search::{Limits, Position, SearchControl, Searcher, Value};

/// Node budget per position: shallow, but tactically settled.
const SEARCH_NODES: u64 = 2000;

/// Written evaluations are clamped to this magnitude.
const SCORE_LIMIT: i32 = 3200;

/// Flush and report progress this often.
const REPORT_INTERVAL: usize = 256;

/// Annotate every position in `input`, writing `<input>.analysis`.
pub fn run(input: &Path) -> Result<()> {
    let output = PathBuf::from(format!("{}.analysis", input.display()));
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("cannot open {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(&output).with_context(|| format!("cannot create {}", output.display()))?,
    );

    info!(input = %input.display(), "starting annotation");
    let mut searcher = Searcher::new();
    let mut written = 0usize;

    for line in reader.lines() {
        let line = line.context("failed reading input")?;
        let fen = line.trim();
        if fen.is_empty() {
            continue;
        }

        let Ok(mut position) = Position::from_fen(fen) else {
            warn!(%fen, "skipping unparsable FEN");
            continue;
        };
        let control = SearchControl::new(
            Arc::new(AtomicBool::new(false)),
            Limits::nodes(SEARCH_NODES),
        );
        let result = searcher.search(&mut position, &control, |_| {});
        if result.best_move.is_none() {
            warn!(%fen, "skipping position with no legal move");
            continue;
        }

        write_record(&mut writer, &position, result.score)?;
        written += 1;
        if written % REPORT_INTERVAL == 0 {
            writer.flush()?;
            info!(written, "annotation progress");
        }
    }

    writer.flush()?;
    info!(written, output = %output.display(), "annotation finished");
    Ok(())
}

/// One binary record: 14 bitboards then the adjusted score.
fn write_record<W: Write>(out: &mut W, pos: &Position, score: Value) -> Result<()> {
    let stm = pos.side_to_move();
    let mirror = stm == Color::Black;
    let raw = |bb: BitBoard| if mirror { bb.0.swap_bytes() } else { bb.0 };

    for color in [stm, !stm] {
        for piece in Piece::ALL {
            let bb = pos.pieces(piece) & pos.colors(color);
            out.write_all(&raw(bb).to_le_bytes())?;
        }
    }
    out.write_all(&raw(pos.colors(stm)).to_le_bytes())?;
    out.write_all(&raw(pos.colors(!stm)).to_le_bytes())?;

    let score = adjust_score(pos, score as i32) as i16;
    out.write_all(&score.to_le_bytes())?;
    Ok(())
}

/// Clamp the point-of-view score and grant structural bonuses: +25%
/// when the advantage outruns the raw material count, +50cp for a clear
/// lead in development.
fn adjust_score(pos: &Position, raw: i32) -> i32 {
    let mut score = raw.clamp(-SCORE_LIMIT, SCORE_LIMIT);
    if score > 100 {
        if score > material_difference(pos) {
            score += score / 4;
        }
        let white_home = (pos.colors(Color::White) & Rank::First.bitboard()).len() as i32;
        let black_home = (pos.colors(Color::Black) & Rank::Eighth.bitboard()).len() as i32;
        let lead = match pos.side_to_move() {
            Color::White => black_home - white_home,
            Color::Black => white_home - black_home,
        };
        if lead > 2 {
            score += 50;
        }
    }
    score.clamp(-SCORE_LIMIT, SCORE_LIMIT)
}

/// Plain material count from the side-to-move point of view.
fn material_difference(pos: &Position) -> i32 {
    const VALUES: [(Piece, i32); 5] = [
        (Piece::Pawn, 100),
        (Piece::Knight, 300),
        (Piece::Bishop, 330),
        (Piece::Rook, 500),
        (Piece::Queen, 900),
    ];
    let mut diff = 0;
    for (piece, value) in VALUES {
        let white = (pos.pieces(piece) & pos.colors(Color::White)).len() as i32;
        let black = (pos.pieces(piece) & pos.colors(Color::Black)).len() as i32;
        diff += value * (white - black);
    }
    match pos.side_to_move() {
        Color::White => diff,
        Color::Black => -diff,
    }
}
