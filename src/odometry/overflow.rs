//! Encoder counter overflow handling.
//!
//! The hardware counters wrap at `pos_max`. Before a counter gets within
//! `wrap_margin` of the wrap point in its direction of travel, both counters
//! are re-centred modulo `pos_max - wrap_margin` and written back to the
//! robot, so consecutive readings never straddle the wrap.

use crate::config::EncoderConfig;
use crate::core::types::EncoderState;

#[derive(Debug, Clone, Copy)]
pub struct OverflowGuard {
    pos_max: i32,
    margin: i32,
}

impl OverflowGuard {
    pub fn new(pos_max: i32, margin: i32) -> Self {
        Self { pos_max, margin }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.pos_max, config.wrap_margin)
    }

    /// Modulus used when re-centring
    #[inline]
    pub fn recentre_modulus(&self) -> i32 {
        self.pos_max - self.margin
    }

    /// Signed difference between two raw readings, assuming less than half
    /// a counter span of travel between them
    #[inline]
    pub fn wrapped_delta(&self, previous: i32, current: i32) -> i32 {
        let span = self.pos_max + 1;
        let raw = (current - previous).rem_euclid(span);
        if raw >= span / 2 { raw - span } else { raw }
    }

    #[inline]
    fn near_wrap(&self, value: i32, delta: i32) -> bool {
        (value > self.pos_max - self.margin && delta > 0) || (value < self.margin && delta < 0)
    }

    /// New counter values if either wheel is about to wrap, `None` otherwise
    pub fn check(&self, counters: EncoderState, delta_left: i32, delta_right: i32) -> Option<EncoderState> {
        let left_near = self.near_wrap(counters.left, delta_left);
        let right_near = self.near_wrap(counters.right, delta_right);
        if !left_near && !right_near {
            return None;
        }
        Some(EncoderState::new(
            self.recentre(counters.left, left_near && delta_left < 0),
            self.recentre(counters.right, right_near && delta_right < 0),
        ))
    }

    /// Forward (and untouched) counters keep their value modulo the
    /// recentring constant; a counter about to underflow is pulled back
    /// below the upper margin.
    fn recentre(&self, value: i32, backward: bool) -> i32 {
        let m = self.recentre_modulus();
        if backward {
            (value - self.margin).rem_euclid(m)
        } else {
            value.rem_euclid(m)
        }
    }
}

/// Target count for the forward-moving wheel of an in-place turn.
///
/// The target lives in re-centred coordinates; every re-centring the wheel
/// passes on the way is counted so the target is never reached early.
#[derive(Debug, Clone, Copy)]
pub struct TurnTarget {
    target: i32,
    pending_wraps: i32,
    modulus: i32,
    last_position: i32,
}

impl TurnTarget {
    /// `ticks` is the non-negative distance the wheel must travel from `start`
    pub fn new(guard: &OverflowGuard, start: i32, ticks: i32, margin: i32) -> Self {
        let modulus = guard.recentre_modulus();
        let raw = start + ticks.max(0);
        let mut target = raw.rem_euclid(modulus);
        let pending_wraps = raw.div_euclid(modulus);

        // Keep the target away from the re-centring boundary
        if target <= margin {
            target += margin;
        }
        if target >= modulus - margin {
            target -= margin;
        }

        Self {
            target,
            pending_wraps,
            modulus,
            last_position: start,
        }
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    /// Ticks still to travel from `position`
    pub fn remaining(&self, position: i32) -> i32 {
        self.pending_wraps * self.modulus + self.target - position
    }

    /// Feed the latest wheel count; true once the target has been passed
    pub fn reached(&mut self, position: i32) -> bool {
        if position < self.last_position && self.pending_wraps > 0 {
            self.pending_wraps -= 1;
        }
        self.last_position = position;
        self.pending_wraps == 0 && position > self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> OverflowGuard {
        OverflowGuard::new(32767, 1000)
    }

    #[test]
    fn test_wrapped_delta() {
        let g = guard();
        assert_eq!(g.wrapped_delta(100, 150), 50);
        assert_eq!(g.wrapped_delta(150, 100), -50);
        assert_eq!(g.wrapped_delta(32760, 5), 13);
        assert_eq!(g.wrapped_delta(5, 32760), -13);
    }

    #[test]
    fn test_no_op_away_from_margin() {
        let g = guard();
        for (value, delta) in [(16383, 16000), (16383, -15000), (1000, -1), (31767, 40)] {
            assert!(g.check(EncoderState::new(value, value), delta, delta).is_none());
        }
    }

    #[test]
    fn test_forward_recentre() {
        let g = guard();
        let next = g.check(EncoderState::new(31800, 16000), 30, 30).unwrap();
        assert_eq!(next, EncoderState::new(33, 16000));
    }

    #[test]
    fn test_backward_recentre() {
        let g = guard();
        let next = g.check(EncoderState::new(500, 16000), -30, -30).unwrap();
        assert_eq!(next.left, 31267);
        assert_eq!(next.right, 16000);
        // Re-centred value is clear of both margins
        assert!(g.check(next, -30, -30).is_none());
    }

    #[test]
    fn test_turn_target_simple() {
        let g = guard();
        let mut t = TurnTarget::new(&g, 16383, 319, 75);
        assert_eq!(t.target(), 16702);
        assert_eq!(t.remaining(16383), 319);
        assert!(!t.reached(16702));
        assert!(t.reached(16703));
    }

    #[test]
    fn test_turn_target_across_wrap() {
        let g = guard();
        // 31700 + 400 wraps past the re-centring modulus 31767
        let mut t = TurnTarget::new(&g, 31700, 400, 75);
        assert_eq!(t.target(), 333);
        assert_eq!(t.remaining(31700), 400);
        // Still before the wrap: target not reached even though 31760 > 333
        assert!(!t.reached(31760));
        // Counter re-centred from 31790 down to 23
        assert!(!t.reached(23));
        assert!(t.reached(334));
    }

    #[test]
    fn test_turn_target_margin() {
        let g = guard();
        let t = TurnTarget::new(&g, 31737, 60, 75);
        // 31797 % 31767 = 30, pushed past the margin
        assert_eq!(t.target(), 105);
        let t = TurnTarget::new(&g, 31600, 120, 75);
        assert_eq!(t.target(), 31645);
    }
}
