// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: schedtune boost with deferred deboost
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Debounced schedtune boost.
//!
//! A boost request raises the foreground group to the interactive level and
//! arms a deadline one window into the future. Further requests only push the
//! deadline out. A single worker thread sleeps until the deadline, re-checks
//! it (it may have moved while sleeping) and drops the group back to the
//! normal level once a full window has passed without a request.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};

use crate::clock::Clock;
use crate::sysfs::{AttrHandle, LevelSink};

pub const SCHEDTUNE_BOOST_NORM: &str = "10";
pub const SCHEDTUNE_BOOST_INTERACTIVE: &str = "40";
pub const SCHEDTUNE_BOOST_WINDOW: Duration = Duration::from_secs(1);

/// What the deboost worker does next for a given deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeboostStep {
    /// Nothing armed, go back to waiting for a wake signal.
    Idle,
    /// Deadline still ahead.
    SleepUntil(Duration),
    /// Window elapsed, restore the normal level.
    Demote,
}

impl DeboostStep {
    pub fn next(deboost_at: Option<Duration>, now: Duration) -> Self {
        match deboost_at {
            None => DeboostStep::Idle,
            Some(at) if at > now => DeboostStep::SleepUntil(at),
            Some(_) => DeboostStep::Demote,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedBoostStats {
    pub requests: u64,
    pub escalations: u64,
    pub demotions: u64,
    pub write_errors: u64,
    pub pending: bool,
}

struct BoostState {
    deboost_at: Option<Duration>,
    sink: Box<dyn LevelSink>,
    stats: SchedBoostStats,
}

impl BoostState {
    fn set_level(&mut self, level: &str) {
        if let Err(e) = self.sink.write_level(level) {
            warn!("schedtune boost {} failed: {:#}", level, e);
            self.stats.write_errors += 1;
        }
    }
}

fn lock_state(state: &Mutex<BoostState>) -> MutexGuard<'_, BoostState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SchedBoost {
    state: Arc<Mutex<BoostState>>,
    wake: Sender<()>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl SchedBoost {
    /// Open the schedtune attribute and start the deboost worker.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let handle = AttrHandle::open_write(path)?;
        Self::start(Box::new(handle), clock, SCHEDTUNE_BOOST_WINDOW)
    }

    /// Start the engine on an already opened sink. The sink is reset to the
    /// normal level first so the interactive level is only ever seen while a
    /// deadline is armed.
    pub fn start(mut sink: Box<dyn LevelSink>, clock: Arc<dyn Clock>, window: Duration) -> Result<Self> {
        let mut stats = SchedBoostStats::default();
        if let Err(e) = sink.write_level(SCHEDTUNE_BOOST_NORM) {
            warn!("schedtune boost {} failed: {:#}", SCHEDTUNE_BOOST_NORM, e);
            stats.write_errors += 1;
        }

        let state = Arc::new(Mutex::new(BoostState {
            deboost_at: None,
            sink,
            stats,
        }));
        let (wake, wake_rx) = unbounded();

        let thread_state = Arc::clone(&state);
        let thread_clock = Arc::clone(&clock);
        thread::Builder::new()
            .name("schedtune-deboost".to_string())
            .spawn(move || deboost_loop(thread_state, wake_rx, thread_clock))
            .context("failed to spawn schedtune deboost thread")?;

        info!("schedtune boost engine started (window {:?})", window);
        Ok(Self {
            state,
            wake,
            clock,
            window,
        })
    }

    /// Boost now, deboost one window after the last request.
    pub fn request_boost(&self) {
        let mut state = lock_state(&self.state);
        let now = self.clock.now();
        state.stats.requests += 1;

        if state.deboost_at.is_none() {
            state.set_level(SCHEDTUNE_BOOST_INTERACTIVE);
            state.stats.escalations += 1;
            if self.wake.send(()).is_err() {
                warn!("schedtune deboost worker is gone, boost will not be released");
            }
        }
        state.deboost_at = Some(now + self.window);
    }

    pub fn stats(&self) -> SchedBoostStats {
        let state = lock_state(&self.state);
        SchedBoostStats {
            pending: state.deboost_at.is_some(),
            ..state.stats
        }
    }
}

fn deboost_loop(state: Arc<Mutex<BoostState>>, wake: Receiver<()>, clock: Arc<dyn Clock>) {
    while wake.recv().is_ok() {
        loop {
            let mut guard = lock_state(&state);
            match DeboostStep::next(guard.deboost_at, clock.now()) {
                DeboostStep::SleepUntil(at) => {
                    drop(guard);
                    clock.sleep_until(at);
                }
                DeboostStep::Demote => {
                    guard.set_level(SCHEDTUNE_BOOST_NORM);
                    guard.deboost_at = None;
                    guard.stats.demotions += 1;
                    break;
                }
                DeboostStep::Idle => break,
            }
        }
    }
    debug!("schedtune deboost worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sysfs::RecordingSink;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        for _ in 0..2000 {
            if cond() {
                return true;
            }
            thread::sleep(ms(1));
        }
        false
    }

    fn engine() -> (Arc<ManualClock>, RecordingSink, SchedBoost) {
        let clock = Arc::new(ManualClock::new());
        let sink = RecordingSink::new(clock.clone());
        let boost =
            SchedBoost::start(Box::new(sink.clone()), clock.clone(), SCHEDTUNE_BOOST_WINDOW).unwrap();
        (clock, sink, boost)
    }

    #[test]
    fn step_follows_deadline() {
        assert_eq!(DeboostStep::next(None, ms(5)), DeboostStep::Idle);
        assert_eq!(DeboostStep::next(Some(ms(10)), ms(5)), DeboostStep::SleepUntil(ms(10)));
        assert_eq!(DeboostStep::next(Some(ms(10)), ms(10)), DeboostStep::Demote);
        assert_eq!(DeboostStep::next(Some(ms(10)), ms(11)), DeboostStep::Demote);
    }

    #[test]
    fn start_resets_to_normal() {
        let (_clock, sink, boost) = engine();
        assert_eq!(sink.levels(), vec![(ms(0), SCHEDTUNE_BOOST_NORM.to_string())]);
        assert!(!boost.stats().pending);
    }

    #[test]
    fn extended_window_demotes_once_at_new_deadline() {
        let (clock, sink, boost) = engine();
        sink.writes.lock().unwrap().clear();

        boost.request_boost();
        clock.set_ms(500);
        boost.request_boost();

        // Original deadline passes, the extended one has not.
        clock.set_ms(1000);
        thread::sleep(ms(50));
        assert_eq!(
            sink.levels(),
            vec![(ms(0), SCHEDTUNE_BOOST_INTERACTIVE.to_string())]
        );
        assert!(boost.stats().pending);

        clock.set_ms(1500);
        assert!(wait_for(|| sink.levels().len() == 2));
        assert_eq!(
            sink.levels(),
            vec![
                (ms(0), SCHEDTUNE_BOOST_INTERACTIVE.to_string()),
                (ms(1500), SCHEDTUNE_BOOST_NORM.to_string()),
            ]
        );

        let stats = boost.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.escalations, 1);
        assert_eq!(stats.demotions, 1);
        assert!(!stats.pending);
    }

    #[test]
    fn request_after_demotion_starts_new_episode() {
        let (clock, sink, boost) = engine();
        sink.writes.lock().unwrap().clear();

        boost.request_boost();
        clock.set_ms(1000);
        assert!(wait_for(|| !boost.stats().pending));

        clock.set_ms(3000);
        boost.request_boost();
        clock.set_ms(4000);
        assert!(wait_for(|| boost.stats().demotions == 2));

        let levels: Vec<String> = sink.levels().into_iter().map(|(_, l)| l).collect();
        assert_eq!(levels, vec!["40", "10", "40", "10"]);
        assert_eq!(sink.levels()[3].0, ms(4000));
    }

    #[test]
    fn write_failures_are_absorbed() {
        let (clock, sink, boost) = engine();
        sink.fail_writes(true);

        boost.request_boost();
        clock.set_ms(1000);
        assert!(wait_for(|| boost.stats().demotions == 1));

        let stats = boost.stats();
        assert_eq!(stats.write_errors, 2);
        assert!(!stats.pending);

        // Device recovers: next episode goes through.
        sink.fail_writes(false);
        boost.request_boost();
        assert_eq!(sink.levels().last().unwrap().1, SCHEDTUNE_BOOST_INTERACTIVE);
    }

    #[test]
    fn missing_attribute_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedtune.boost");
        assert!(SchedBoost::open(&path, Arc::new(ManualClock::new())).is_err());

        std::fs::write(&path, "0").unwrap();
        let _boost = SchedBoost::open(&path, Arc::new(ManualClock::new())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SCHEDTUNE_BOOST_NORM);
    }
}
