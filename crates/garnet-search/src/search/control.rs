//! Search control — the shared stop flag and limit queries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::time::Limits;

/// Decides when the search must abort (hard limit) and when iterative
/// deepening should not start another iteration (soft limit).
///
/// The stop flag is the only cross-thread channel between the front-end
/// and the search worker; both sides use sequentially consistent
/// accesses.
pub struct SearchControl {
    stopped: Arc<AtomicBool>,
    limits: Limits,
    start: Instant,
}

impl SearchControl {
    pub fn new(stopped: Arc<AtomicBool>, limits: Limits) -> Self {
        Self {
            stopped,
            limits,
            start: Instant::now(),
        }
    }

    /// Control without any limit: stops only on the external flag.
    pub fn infinite(stopped: Arc<AtomicBool>) -> Self {
        Self::new(stopped, Limits::infinite())
    }

    /// Time since the search started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether this search manages a competition clock.
    pub fn competition(&self) -> bool {
        self.limits.competition
    }

    pub fn stop_flag(&self) -> &Arc<AtomicBool> {
        &self.stopped
    }

    /// Abort predicate, polled at every node and after every unmake.
    ///
    /// `depth` is the depth of the current iteration. The wall clock is
    /// only consulted every 1024 nodes; when it fires, the stop flag is
    /// latched so later polls return without reading the clock.
    pub fn hit_hard_limit(&self, depth: u8, nodes: u64) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(cap) = self.limits.max_nodes
            && nodes >= cap
        {
            return true;
        }
        if let Some(max_depth) = self.limits.max_depth {
            // Strict: the final iteration is allowed to finish
            return depth > max_depth;
        }
        if let Some(hard) = self.limits.hard {
            if nodes & 1023 != 0 {
                return false;
            }
            if self.elapsed() >= hard {
                self.stopped.store(true, Ordering::SeqCst);
                return true;
            }
        }
        false
    }

    /// Whether another iteration should be started after completing
    /// `depth`.
    ///
    /// The soft wall stretches or shrinks with evaluation stability:
    /// an unstable root score buys up to 50% more time, a stable one
    /// gives time back.
    pub fn hit_soft_limit(&self, depth: u8, nodes: u64, stability: u32) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(cap) = self.limits.max_nodes
            && nodes >= cap
        {
            return true;
        }
        if let Some(max_depth) = self.limits.max_depth {
            return depth >= max_depth;
        }
        if let Some(soft) = self.limits.soft {
            let mut scale = 1.0_f64;
            if depth >= 5 {
                scale += 0.5 - f64::from(stability.min(5)) / 10.0;
            }
            return self.elapsed() >= soft.mul_f64(scale);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn infinite_never_stops_on_its_own() {
        let control = SearchControl::infinite(flag());
        assert!(!control.hit_hard_limit(40, 1 << 24));
        assert!(!control.hit_soft_limit(40, 1 << 24, 0));
    }

    #[test]
    fn stop_flag_trips_both_limits() {
        let stopped = flag();
        let control = SearchControl::infinite(Arc::clone(&stopped));
        stopped.store(true, Ordering::SeqCst);
        assert!(control.hit_hard_limit(1, 0));
        assert!(control.hit_soft_limit(1, 0, 0));
    }

    #[test]
    fn depth_limit_lets_final_iteration_finish() {
        let control = SearchControl::new(flag(), Limits::depth(4));
        // While searching iteration 4 the hard limit stays quiet...
        assert!(!control.hit_hard_limit(4, 123_456));
        assert!(control.hit_hard_limit(5, 0));
        // ...and the soft limit refuses to start iteration 5
        assert!(!control.hit_soft_limit(3, 0, 0));
        assert!(control.hit_soft_limit(4, 0, 0));
    }

    #[test]
    fn node_limit_is_checked_every_node() {
        let control = SearchControl::new(flag(), Limits::nodes(2000));
        assert!(!control.hit_hard_limit(1, 1999));
        assert!(control.hit_hard_limit(1, 2000));
        assert!(control.hit_soft_limit(1, 2000, 0));
    }

    #[test]
    fn movetime_zero_stops_immediately() {
        let control = SearchControl::new(flag(), Limits::movetime(Duration::ZERO));
        // node count divisible by 1024 so the clock is actually read
        assert!(control.hit_hard_limit(1, 1024));
        // the hard trigger latches the stop flag
        assert!(control.stop_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn wall_reads_are_gated_by_node_count() {
        let control = SearchControl::new(flag(), Limits::movetime(Duration::ZERO));
        assert!(!control.hit_hard_limit(1, 1025));
        assert!(!control.stop_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn soft_limit_scales_with_stability() {
        let control = SearchControl::new(
            flag(),
            Limits::movetime(Duration::from_secs(3600)),
        );
        // Plenty of budget: neither stable nor unstable scores stop us
        assert!(!control.hit_soft_limit(10, 0, 0));
        assert!(!control.hit_soft_limit(10, 0, 5));
    }
}
