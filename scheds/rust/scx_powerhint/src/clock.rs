// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Monotonic time source
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::time::Duration;

use nix::time::{clock_gettime, ClockId};

/// Monotonic time source shared by the hint path and the deboost worker.
///
/// Timestamps are offsets from an arbitrary fixed origin (boot for
/// `CLOCK_MONOTONIC`); only differences between them are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;

    /// Block the calling thread until `now() >= deadline`. Callers must not
    /// assume the wakeup is precise and re-check their condition afterwards.
    fn sleep_until(&self, deadline: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Duration {
        // CLOCK_MONOTONIC cannot fail on Linux; a zero reading would only make
        // the next deadline fire early.
        clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map(|ts| Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32))
            .unwrap_or_default()
    }

    fn sleep_until(&self, deadline: Duration) {
        let remaining = deadline.saturating_sub(self.now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }
}

/// Test clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<Duration>,
    moved: std::sync::Condvar,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Duration::ZERO),
            moved: std::sync::Condvar::new(),
        }
    }

    pub fn set_ms(&self, ms: u64) {
        let mut now = self.now.lock().unwrap();
        *now = Duration::from_millis(ms);
        self.moved.notify_all();
    }

    pub fn advance_ms(&self, ms: u64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::from_millis(ms);
        self.moved.notify_all();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep_until(&self, deadline: Duration) {
        let mut now = self.now.lock().unwrap();
        while *now < deadline {
            now = self.moved.wait(now).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = MonotonicClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(!a.is_zero());
    }

    #[test]
    fn monotonic_sleep_until_past_deadline_returns() {
        let clock = MonotonicClock;
        let start = clock.now();
        clock.sleep_until(start.saturating_sub(Duration::from_secs(1)));
        clock.sleep_until(start + Duration::from_millis(5));
        assert!(clock.now() >= start + Duration::from_millis(5));
    }

    #[test]
    fn manual_clock_wakes_sleeper_on_advance() {
        let clock = Arc::new(ManualClock::new());
        let sleeper = {
            let clock = clock.clone();
            std::thread::spawn(move || {
                clock.sleep_until(Duration::from_millis(30));
                clock.now()
            })
        };
        clock.advance_ms(10);
        clock.advance_ms(10);
        clock.set_ms(30);
        assert_eq!(sleeper.join().unwrap(), Duration::from_millis(30));
    }
}
