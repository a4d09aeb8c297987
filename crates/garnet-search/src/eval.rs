//! Classical tapered evaluation: material and piece-square tables.
//!
//! Scores are accumulated as middle-game/end-game pairs and fused by
//! the game phase, then returned from the side-to-move's point of view,
//! bounded to ±3200 centipawns.

use cozy_chess::{Color, Piece, Square};

use crate::position::Position;
use crate::value::{Score, Value, GAME_PHASES};

const fn s(mg: i16, eg: i16) -> Score {
    Score::new(mg, eg)
}

/// Base piece values.
const PIECE_VALUE: [Score; 6] = [
    s(89, 103),
    s(286, 328),
    s(312, 356),
    s(538, 590),
    s(1043, 1100),
    s(0, 0),
];

const BISHOP_PAIR: Score = s(25, 45);
const TEMPO: Value = 10;

/// Evaluation is clamped to this magnitude in normal play.
const EVAL_LIMIT: i32 = 3200;

/// Piece-square tables from White's point of view, square A1 first.
/// Black uses the vertically mirrored square.
#[rustfmt::skip]
const PST: [[Score; 64]; 6] = [
    // Pawns: take the center, push in the endgame
    [
        s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0),
        s( -8,  2), s(  2,  2), s(  0,  4), s(-12,  2), s(-12,  2), s( 10,  2), s( 10,  2), s( -8,  2),
        s( -8,  4), s( -4,  4), s(  2,  6), s(  4,  8), s(  4,  8), s(  2,  6), s( -4,  4), s( -8,  4),
        s(-10,  8), s( -4,  8), s( 12, 10), s( 24, 12), s( 24, 12), s( 12, 10), s( -4,  8), s(-10,  8),
        s( -6, 18), s(  0, 18), s( 10, 20), s( 22, 24), s( 22, 24), s( 10, 20), s(  0, 18), s( -6, 18),
        s(  2, 40), s(  8, 40), s( 16, 44), s( 20, 48), s( 20, 48), s( 16, 44), s(  8, 40), s(  2, 40),
        s( 24, 90), s( 30, 90), s( 36, 96), s( 40, 98), s( 40, 98), s( 36, 96), s( 30, 90), s( 24, 90),
        s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0), s(  0,  0),
    ],
    // Knights: rim is grim
    [
        s(-72,-48), s(-54,-40), s(-42,-26), s(-36, -8), s(-36, -8), s(-42,-26), s(-54,-40), s(-72,-48),
        s(-44,-34), s(-22,-26), s(-10,-10), s( -4,  6), s( -4,  6), s(-10,-10), s(-22,-26), s(-44,-34),
        s(-34,-26), s(-12,-18), s(  0, -2), s(  6, 14), s(  6, 14), s(  0, -2), s(-12,-18), s(-34,-26),
        s(-14,-20), s(  8,-12), s( 20,  2), s( 26, 20), s( 26, 20), s( 20,  2), s(  8,-12), s(-14,-20),
        s(-14,-20), s(  8,-12), s( 20,  2), s( 26, 20), s( 26, 20), s( 20,  2), s(  8,-12), s(-14,-20),
        s( -4,-26), s( 18,-18), s( 30, -2), s( 36, 14), s( 36, 14), s( 30, -2), s( 18,-18), s( -4,-26),
        s(-32,-34), s(-10,-26), s(  2,-10), s(  8,  6), s(  8,  6), s(  2,-10), s(-10,-26), s(-32,-34),
        s(-98,-48), s(-32,-40), s(-20,-26), s(-14, -8), s(-14, -8), s(-20,-26), s(-32,-40), s(-98,-48),
    ],
    // Bishops: long diagonals
    [
        s(-27,-32), s(-14,-20), s(-17,-22), s(-21,-12), s(-21,-12), s(-17,-22), s(-14,-20), s(-27,-32),
        s(-14,-20), s(  4,-10), s(  0,-10), s( -4, -2), s( -4, -2), s(  0,-10), s(  4,-10), s(-14,-20),
        s(-10,-16), s(  8, -4), s(  5, -6), s(  0,  4), s(  0,  4), s(  5, -6), s(  8, -4), s(-10,-16),
        s( -9,-16), s(  9, -6), s(  6, -6), s(  1,  2), s(  1,  2), s(  6, -6), s(  9, -6), s( -9,-16),
        s(-11,-16), s(  7, -6), s(  4, -6), s( -1,  2), s( -1,  2), s(  4, -6), s(  7, -6), s(-11,-16),
        s(-14,-16), s(  4, -4), s(  1, -6), s( -4,  4), s( -4,  4), s(  1, -6), s(  4, -4), s(-14,-16),
        s(-16,-20), s(  2,-10), s( -1,-10), s( -6, -2), s( -6, -2), s( -1,-10), s(  2,-10), s(-16,-20),
        s(-24,-32), s(-11,-20), s(-14,-22), s(-19,-12), s(-19,-12), s(-14,-22), s(-11,-20), s(-24,-32),
    ],
    // Rooks: files matter, ranks barely; the seventh is gold
    [
        s(-11,  2), s( -8,  2), s( -6,  2), s( -4,  2), s( -4,  2), s( -6,  2), s( -8,  2), s(-11,  2),
        s(-11,  2), s( -4,  2), s( -1,  2), s(  1,  2), s(  1,  2), s( -1,  2), s( -4,  2), s(-11,  2),
        s(-11,  2), s( -4,  2), s( -1,  2), s(  1,  2), s(  1,  2), s( -1,  2), s( -4,  2), s(-11,  2),
        s(-11,  2), s( -4,  2), s( -1,  2), s(  1,  2), s(  1,  2), s( -1,  2), s( -4,  2), s(-11,  2),
        s(-11,  2), s( -4,  2), s( -1,  2), s(  1,  2), s(  1,  2), s( -1,  2), s( -4,  2), s(-11,  2),
        s(-11,  2), s( -4,  2), s( -1,  2), s(  1,  2), s(  1,  2), s( -1,  2), s( -4,  2), s(-11,  2),
        s( -3, 10), s(  4, 10), s(  7, 10), s(  9, 10), s(  9, 10), s(  7, 10), s(  4, 10), s( -3, 10),
        s(-11,  2), s( -8,  2), s( -6,  2), s( -4,  2), s( -4,  2), s( -6,  2), s( -8,  2), s(-11,  2),
    ],
    // Queens: stay flexible, centralise late
    [
        s( -1,-40), s( -1,-27), s( -1,-21), s( -1,-15), s( -1,-15), s( -1,-21), s( -1,-27), s( -1,-40),
        s( -1,-27), s(  4,-15), s(  4, -9), s(  4, -3), s(  4, -3), s(  4, -9), s(  4,-15), s( -1,-27),
        s( -1,-21), s(  4, -9), s(  4, -3), s(  4,  3), s(  4,  3), s(  4, -3), s(  4, -9), s( -1,-21),
        s( -1,-15), s(  4, -3), s(  4,  3), s(  4,  9), s(  4,  9), s(  4,  3), s(  4, -3), s( -1,-15),
        s( -1,-15), s(  4, -3), s(  4,  3), s(  4,  9), s(  4,  9), s(  4,  3), s(  4, -3), s( -1,-15),
        s( -1,-21), s(  4, -9), s(  4, -3), s(  4,  3), s(  4,  3), s(  4, -3), s(  4, -9), s( -1,-21),
        s( -1,-27), s(  4,-15), s(  4, -9), s(  4, -3), s(  4, -3), s(  4, -9), s(  4,-15), s( -1,-27),
        s( -1,-40), s( -1,-27), s( -1,-21), s( -1,-15), s( -1,-15), s( -1,-21), s( -1,-27), s( -1,-40),
    ],
    // King: hide early, fight late
    [
        s( 40,-50), s( 55,-28), s( 25,-15), s(  5,-10), s(  5,-10), s( 25,-15), s( 55,-28), s( 40,-50),
        s( 35,-25), s( 45, -5), s( 15, 10), s( -5, 18), s( -5, 18), s( 15, 10), s( 45, -5), s( 35,-25),
        s( 10,-12), s( 20,  8), s(-10, 25), s(-30, 33), s(-30, 33), s(-10, 25), s( 20,  8), s( 10,-12),
        s( -5,  0), s(  5, 20), s(-25, 37), s(-45, 45), s(-45, 45), s(-25, 37), s(  5, 20), s( -5,  0),
        s(-15,  0), s( -5, 20), s(-35, 37), s(-55, 45), s(-55, 45), s(-35, 37), s( -5, 20), s(-15,  0),
        s(-25,-12), s(-15,  8), s(-45, 25), s(-65, 33), s(-65, 33), s(-45, 25), s(-15,  8), s(-25,-12),
        s(-35,-25), s(-25, -5), s(-55, 10), s(-75, 18), s(-75, 18), s(-55, 10), s(-25, -5), s(-35,-25),
        s(-45,-50), s(-35,-28), s(-65,-15), s(-85,-10), s(-85,-10), s(-65,-15), s(-35,-28), s(-45,-50),
    ],
];

/// Game phase in `[0, GAME_PHASES]`: full material maps to the top,
/// bare kings to zero.
fn phase(pos: &Position) -> i32 {
    let minors =
        (pos.pieces(Piece::Knight) | pos.pieces(Piece::Bishop)).len() as i32;
    let rooks = pos.pieces(Piece::Rook).len() as i32;
    let queens = pos.pieces(Piece::Queen).len() as i32;
    let raw = minors + 2 * rooks + 4 * queens;
    (raw * GAME_PHASES / 24).min(GAME_PHASES)
}

#[inline]
fn pst_square(sq: Square, color: Color) -> usize {
    match color {
        Color::White => sq as usize,
        Color::Black => sq as usize ^ 56,
    }
}

/// Static evaluation from the side-to-move's point of view.
pub fn evaluate(pos: &Position) -> Value {
    let mut total = Score::ZERO;

    for &color in &Color::ALL {
        let ours = pos.colors(color);
        let mut side = Score::ZERO;

        for &piece in &Piece::ALL {
            let table = &PST[piece as usize];
            for sq in ours & pos.pieces(piece) {
                side += PIECE_VALUE[piece as usize];
                side += table[pst_square(sq, color)];
            }
        }
        if (ours & pos.pieces(Piece::Bishop)).len() >= 2 {
            side += BISHOP_PAIR;
        }

        match color {
            Color::White => total += side,
            Color::Black => total -= side,
        }
    }

    let fused = total.fuse(phase(pos), GAME_PHASES) as i32;
    let pov = match pos.side_to_move() {
        Color::White => fused,
        Color::Black => -fused,
    };
    (pov + TEMPO as i32).clamp(-EVAL_LIMIT, EVAL_LIMIT) as Value
}
