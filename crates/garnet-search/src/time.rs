//! Translate `go` parameters into search limits.

use std::time::Duration;

use cozy_chess::Color;

/// Wall-clock, depth, and node budgets for one search request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Don't start a new iteration past this point.
    pub soft: Option<Duration>,
    /// Abort the search outright past this point.
    pub hard: Option<Duration>,
    pub max_depth: Option<u8>,
    pub max_nodes: Option<u64>,
    /// Set when the engine manages its own clock (`go wtime ...`);
    /// enables shortcuts like answering forced moves instantly.
    pub competition: bool,
}

impl Limits {
    pub fn infinite() -> Self {
        Self::default()
    }

    pub fn movetime(duration: Duration) -> Self {
        Self {
            soft: Some(duration),
            hard: Some(duration),
            ..Self::default()
        }
    }

    pub fn depth(depth: u8) -> Self {
        Self {
            max_depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        Self {
            max_nodes: Some(nodes),
            ..Self::default()
        }
    }

    /// Budget from remaining time and increment.
    ///
    /// A small slice of the remaining clock plus most of the increment
    /// forms the base; the soft wall stops deepening well before it and
    /// the hard wall allows some overshoot without ever spending more
    /// than 90% of the clock.
    pub fn clock(remaining: Duration, increment: Duration) -> Self {
        let base = remaining.mul_f64(0.05) + increment.mul_f64(0.75);
        let hard = base.mul_f64(1.5).min(remaining.mul_f64(0.9));
        Self {
            soft: Some(base.mul_f64(0.6)),
            hard: Some(hard),
            competition: true,
            ..Self::default()
        }
    }
}

/// Build [`Limits`] from the parameters of a `go` command.
///
/// Priority: `movetime`, then `depth`, then `nodes`, then the
/// side-to-move clock; anything else (including `infinite`) searches
/// until told to stop.
#[allow(clippy::too_many_arguments)]
pub fn limits_from_go(
    wtime: Option<Duration>,
    btime: Option<Duration>,
    winc: Option<Duration>,
    binc: Option<Duration>,
    depth: Option<u8>,
    nodes: Option<u64>,
    movetime: Option<Duration>,
    infinite: bool,
    side: Color,
) -> Limits {
    if infinite {
        return Limits::infinite();
    }
    if let Some(duration) = movetime {
        return Limits::movetime(duration);
    }
    if let Some(depth) = depth {
        return Limits::depth(depth);
    }
    if let Some(nodes) = nodes {
        return Limits::nodes(nodes);
    }

    let (remaining, increment) = match side {
        Color::White => (wtime, winc),
        Color::Black => (btime, binc),
    };
    match remaining {
        Some(time) => Limits::clock(time, increment.unwrap_or(Duration::ZERO)),
        None => Limits::infinite(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movetime_sets_equal_walls() {
        let limits = Limits::movetime(Duration::from_millis(500));
        assert_eq!(limits.soft, Some(Duration::from_millis(500)));
        assert_eq!(limits.hard, Some(Duration::from_millis(500)));
        assert!(!limits.competition);
    }

    #[test]
    fn clock_formula() {
        // 60s + 1s increment: base = 3s + 0.75s = 3.75s
        let limits = Limits::clock(Duration::from_secs(60), Duration::from_secs(1));
        assert_eq!(limits.soft, Some(Duration::from_millis(2250)));
        // hard = min(1.5 * 3.75, 0.9 * 60) = 5.625s
        assert_eq!(limits.hard, Some(Duration::from_micros(5_625_000)));
        assert!(limits.competition);
    }

    #[test]
    fn clock_hard_capped_by_remaining_time() {
        // Nearly flagged: 1s left, huge increment
        let limits = Limits::clock(Duration::from_secs(1), Duration::from_secs(60));
        // hard = min(1.5 * 45.05, 0.9) = 0.9s
        assert_eq!(limits.hard, Some(Duration::from_millis(900)));
    }

    #[test]
    fn go_priority_movetime_beats_depth_and_clock() {
        let limits = limits_from_go(
            Some(Duration::from_secs(60)),
            None,
            None,
            None,
            Some(9),
            Some(1000),
            Some(Duration::from_millis(123)),
            false,
            Color::White,
        );
        assert_eq!(limits.soft, Some(Duration::from_millis(123)));
        assert!(limits.max_depth.is_none());
        assert!(limits.max_nodes.is_none());
    }

    #[test]
    fn go_depth_only() {
        let limits =
            limits_from_go(None, None, None, None, Some(6), None, None, false, Color::Black);
        assert_eq!(limits.max_depth, Some(6));
        assert!(limits.soft.is_none());
        assert!(!limits.competition);
    }

    #[test]
    fn go_nodes_only() {
        let limits =
            limits_from_go(None, None, None, None, None, Some(2000), None, false, Color::White);
        assert_eq!(limits.max_nodes, Some(2000));
        assert!(limits.hard.is_none());
    }

    #[test]
    fn go_uses_side_to_move_clock() {
        let limits = limits_from_go(
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(300)),
            None,
            None,
            None,
            None,
            None,
            false,
            Color::Black,
        );
        // Black's clock: base = 15s * ... = 300 * 0.05 = 15s
        assert_eq!(limits.soft, Some(Duration::from_secs(9)));
        assert!(limits.competition);
    }

    #[test]
    fn go_infinite_overrides_everything() {
        let limits = limits_from_go(
            Some(Duration::from_secs(1)),
            None,
            None,
            None,
            Some(3),
            None,
            None,
            true,
            Color::White,
        );
        assert!(limits.soft.is_none());
        assert!(limits.max_depth.is_none());
    }
}
