// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Touch cadence and post-scroll vsync boost
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Touch cadence classification.
//!
//! Isolated taps each get a boost pulse. A burst of touch hints arriving
//! faster than `SHORT_TOUCH_TIME` is a scroll, and pulsing every frame of a
//! scroll only burns power, so pulses stop once the burst is recognised. When
//! the finger lifts (a vsync arrives well after the last touch hint) a few
//! more pulses are spent on the following frames to carry the fling
//! animation, then boosting stops until the next touch.

use std::time::Duration;

/// Touch hints closer than this are part of a continuous scroll.
pub const SHORT_TOUCH_TIME: Duration = Duration::from_millis(20);
/// Touch hints further apart than this start a fresh touch session.
pub const LONG_TOUCH_TIME: Duration = Duration::from_millis(100);
/// Gap between last touch and a vsync after which the finger is considered lifted.
pub const VSYNC_TOUCH_TIME: Duration = Duration::from_millis(30);
/// Pulses spent on the frames following a finger release.
pub const VSYNC_BOOST_COUNT: u32 = 4;

/// More fast touches than this turn the session into a scroll.
const SCROLL_TOUCH_COUNT: u32 = 4;
/// More fast touches than this (while scrolling) ask for a tighter governor timer.
const TIMER_ADJUST_TOUCH_COUNT: u32 = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchCadence {
    last_interaction: Option<Duration>,
    fast_touch_count: u32,
    scroll_active: bool,
    timer_adjusted: bool,
    vsync_boost_active: bool,
    vsync_pulses_left: u32,
}

impl TouchCadence {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset_session(&mut self) {
        self.fast_touch_count = 0;
        self.scroll_active = false;
        self.timer_adjusted = false;
        self.vsync_boost_active = false;
        self.vsync_pulses_left = 0;
    }

    /// Account a touch hint at `now`. Returns true when the touch pulse
    /// should be asserted.
    pub fn on_interaction(&mut self, now: Duration) -> bool {
        let gap = self.last_interaction.map(|prev| now.saturating_sub(prev));
        self.last_interaction = Some(now);

        let fast = matches!(gap, Some(g) if g < SHORT_TOUCH_TIME);
        match gap {
            Some(_) if fast => self.fast_touch_count = self.fast_touch_count.saturating_add(1),
            Some(g) if g > LONG_TOUCH_TIME => self.reset_session(),
            _ => {}
        }

        if fast && !self.scroll_active && self.fast_touch_count > SCROLL_TOUCH_COUNT {
            self.scroll_active = true;
            self.vsync_boost_active = false;
            self.vsync_pulses_left = 0;
        }

        if self.scroll_active
            && self.fast_touch_count > TIMER_ADJUST_TOUCH_COUNT
            && !self.timer_adjusted
        {
            self.timer_adjusted = true;
        }

        !self.scroll_active
    }

    /// Account a vsync hint at `now`. `frame_pending` is the hint payload.
    /// Returns true when a vsync pulse should be asserted; the caller reports
    /// a delivered pulse through `vsync_pulse_delivered`.
    pub fn on_vsync(&mut self, now: Duration, frame_pending: bool) -> bool {
        if self.scroll_active {
            let lifted = self
                .last_interaction
                .map_or(false, |last| now.saturating_sub(last) > VSYNC_TOUCH_TIME);
            if lifted {
                self.scroll_active = false;
                self.timer_adjusted = false;
                self.vsync_boost_active = true;
                self.vsync_pulses_left = VSYNC_BOOST_COUNT;
            }
        }

        self.vsync_boost_active && frame_pending && self.vsync_pulses_left > 0
    }

    pub fn vsync_pulse_delivered(&mut self) {
        if self.vsync_pulses_left > 0 {
            self.vsync_pulses_left -= 1;
            if self.vsync_pulses_left == 0 {
                self.vsync_boost_active = false;
            }
        }
    }

    pub fn fast_touch_count(&self) -> u32 {
        self.fast_touch_count
    }

    pub fn scroll_active(&self) -> bool {
        self.scroll_active
    }

    /// Scrolling long enough that the governor timer should be tightened.
    /// Acting on it is left to whoever owns the governor timer.
    pub fn timer_adjusted(&self) -> bool {
        self.timer_adjusted
    }

    pub fn vsync_boost_active(&self) -> bool {
        self.vsync_boost_active
    }

    pub fn vsync_pulses_left(&self) -> u32 {
        self.vsync_pulses_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// One fresh touch at `start` followed by `fast` touches 10ms apart.
    /// Returns the pulse decisions and the time of the last touch.
    fn burst(cadence: &mut TouchCadence, start: u64, fast: usize) -> (Vec<bool>, u64) {
        let mut pulses = vec![cadence.on_interaction(ms(start))];
        let mut t = start;
        for _ in 0..fast {
            t += 10;
            pulses.push(cadence.on_interaction(ms(t)));
        }
        (pulses, t)
    }

    fn check_invariants(c: &TouchCadence) {
        if c.vsync_pulses_left > 0 {
            assert!(c.vsync_boost_active);
        }
        if c.scroll_active {
            assert!(!c.vsync_boost_active);
        }
    }

    #[test]
    fn spaced_taps_always_pulse() {
        let mut c = TouchCadence::new();
        let mut t = 0;
        for _ in 0..50 {
            assert!(c.on_interaction(ms(t)));
            assert_eq!(c.fast_touch_count(), 0);
            assert!(!c.scroll_active());
            t += 21;
        }
    }

    #[test]
    fn fifth_fast_touch_enters_scroll() {
        let mut c = TouchCadence::new();
        let (pulses, _) = burst(&mut c, 0, 4);
        assert_eq!(pulses, vec![true; 5]);
        assert!(!c.scroll_active());

        assert!(!c.on_interaction(ms(50)));
        assert!(c.scroll_active());
        assert_eq!(c.fast_touch_count(), 5);

        // Still scrolling: no pulses.
        assert!(!c.on_interaction(ms(60)));
        assert!(!c.on_interaction(ms(70)));
        check_invariants(&c);
    }

    #[test]
    fn medium_gaps_neither_count_nor_reset() {
        let mut c = TouchCadence::new();
        burst(&mut c, 0, 3);
        assert_eq!(c.fast_touch_count(), 3);
        assert!(c.on_interaction(ms(30 + 50)));
        assert_eq!(c.fast_touch_count(), 3);
        assert!(c.on_interaction(ms(80 + 20)));
        assert_eq!(c.fast_touch_count(), 3);
    }

    #[test]
    fn long_scroll_adjusts_timer_once() {
        let mut c = TouchCadence::new();
        burst(&mut c, 0, 15);
        assert!(c.scroll_active());
        assert!(!c.timer_adjusted());

        burst_continue(&mut c, 150, 1);
        assert_eq!(c.fast_touch_count(), 16);
        assert!(c.timer_adjusted());

        burst_continue(&mut c, 160, 5);
        assert!(c.timer_adjusted());
    }

    fn burst_continue(c: &mut TouchCadence, last: u64, n: usize) {
        let mut t = last;
        for _ in 0..n {
            t += 10;
            assert!(!c.on_interaction(ms(t)));
        }
    }

    #[test]
    fn long_gap_resets_session() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 20);
        assert!(c.scroll_active());
        assert!(c.timer_adjusted());

        assert!(c.on_interaction(ms(last + 101)));
        assert!(!c.scroll_active());
        assert!(!c.timer_adjusted());
        assert_eq!(c.fast_touch_count(), 0);

        // Reset is idempotent.
        let snapshot = c.clone();
        assert!(c.on_interaction(ms(last + 300)));
        assert_eq!(c.fast_touch_count(), snapshot.fast_touch_count());
        assert_eq!(c.scroll_active(), snapshot.scroll_active());
        assert_eq!(c.timer_adjusted(), snapshot.timer_adjusted());
    }

    #[test]
    fn vsync_soon_after_touch_keeps_scrolling() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 5);
        assert!(c.scroll_active());

        assert!(!c.on_vsync(ms(last + 16), true));
        assert!(!c.on_vsync(ms(last + 30), true));
        assert!(c.scroll_active());
        assert!(!c.vsync_boost_active());
    }

    #[test]
    fn finger_lift_spends_four_vsync_pulses() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 8);
        assert!(c.scroll_active());

        let mut t = last + 31;
        assert!(c.on_vsync(ms(t), true));
        assert!(!c.scroll_active());
        assert!(c.vsync_boost_active());
        assert_eq!(c.vsync_pulses_left(), VSYNC_BOOST_COUNT);
        c.vsync_pulse_delivered();
        check_invariants(&c);

        for left in (0..3).rev() {
            t += 16;
            assert!(c.on_vsync(ms(t), true));
            c.vsync_pulse_delivered();
            assert_eq!(c.vsync_pulses_left(), left);
            check_invariants(&c);
        }
        assert!(!c.vsync_boost_active());

        t += 16;
        assert!(!c.on_vsync(ms(t), true));
    }

    #[test]
    fn idle_vsync_does_not_consume_pulses() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 5);

        assert!(!c.on_vsync(ms(last + 40), false));
        assert!(c.vsync_boost_active());
        assert_eq!(c.vsync_pulses_left(), VSYNC_BOOST_COUNT);

        assert!(c.on_vsync(ms(last + 56), true));
    }

    #[test]
    fn undelivered_pulse_is_retried() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 5);

        assert!(c.on_vsync(ms(last + 40), true));
        // write failed: no vsync_pulse_delivered()
        assert!(c.on_vsync(ms(last + 56), true));
        assert_eq!(c.vsync_pulses_left(), VSYNC_BOOST_COUNT);
    }

    #[test]
    fn vsync_without_scroll_is_inert() {
        let mut c = TouchCadence::new();
        assert!(!c.on_vsync(ms(0), true));
        c.on_interaction(ms(10));
        assert!(!c.on_vsync(ms(200), true));
        assert_eq!(c, {
            let mut expected = TouchCadence::new();
            expected.on_interaction(ms(10));
            expected
        });
    }

    #[test]
    fn new_scroll_cancels_vsync_boost() {
        let mut c = TouchCadence::new();
        let (_, last) = burst(&mut c, 0, 5);
        assert!(c.on_vsync(ms(last + 40), true));
        c.vsync_pulse_delivered();
        assert!(c.vsync_boost_active());

        // Finger back down quickly: counter is still above the scroll
        // threshold so the first fast touch re-enters scroll mode.
        c.on_interaction(ms(last + 50));
        assert!(!c.on_interaction(ms(last + 60)));
        assert!(c.scroll_active());
        assert!(!c.vsync_boost_active());
        assert_eq!(c.vsync_pulses_left(), 0);
        check_invariants(&c);
    }
}
