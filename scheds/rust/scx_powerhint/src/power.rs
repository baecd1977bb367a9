// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Hint dispatch
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::app_launch::AppLaunchBoost;
use crate::clock::Clock;
use crate::config::BoostConfig;
use crate::hint::PowerHint;
use crate::interactive::InteractiveToggle;
use crate::probe::{probe_attrs, BoostCapabilities};
use crate::schedtune::SchedBoost;
use crate::stats::Metrics;
use crate::sysfs::AttrIo;
use crate::touch::TouchCadence;

const PULSE_ON: &str = "1";

struct Backends {
    caps: BoostCapabilities,
    sched: Option<SchedBoost>,
}

#[derive(Debug, Default, Clone, Copy)]
struct HintCounters {
    interaction_hints: u64,
    vsync_hints: u64,
    touch_pulses: u64,
    touch_suppressed: u64,
    vsync_pulses: u64,
    attr_errors: u64,
    app_launch_on: u64,
    app_launch_off: u64,
}

#[derive(Default)]
struct HintState {
    touch: TouchCadence,
    app_launch: AppLaunchBoost,
    counters: HintCounters,
}

/// Boost engine for one device. `init()` probes the machine once; after that
/// `power_hint()` may be called from any number of threads.
pub struct PowerHal {
    config: BoostConfig,
    io: Arc<dyn AttrIo>,
    clock: Arc<dyn Clock>,
    toggle: Box<dyn InteractiveToggle>,
    backends: OnceCell<Backends>,
    state: Mutex<HintState>,
}

impl PowerHal {
    pub fn new(
        config: BoostConfig,
        io: Arc<dyn AttrIo>,
        clock: Arc<dyn Clock>,
        toggle: Box<dyn InteractiveToggle>,
    ) -> Self {
        Self {
            config,
            io,
            clock,
            toggle,
            backends: OnceCell::new(),
            state: Mutex::new(HintState::default()),
        }
    }

    /// Enable the device and detect the boost mechanisms. Later calls return
    /// the capabilities found by the first one.
    pub fn init(&self) -> BoostCapabilities {
        self.backends
            .get_or_init(|| {
                self.toggle.set_state(true);

                let mut caps = probe_attrs(self.io.as_ref(), &self.config.paths);
                let sched = match SchedBoost::open(&self.config.paths.sched_boost, Arc::clone(&self.clock)) {
                    Ok(sched) => Some(sched),
                    Err(e) => {
                        info!("schedtune boost unavailable: {:#}", e);
                        None
                    }
                };
                caps.sched_boost = sched.is_some();
                caps.app_launch = self.config.app_launch_boost && (caps.pulse_boost || caps.floor_boost);

                info!("boost capabilities: {}", caps);
                Backends { caps, sched }
            })
            .caps
    }

    #[cfg(test)]
    fn init_with(&self, caps: BoostCapabilities, sched: Option<SchedBoost>) {
        let caps = BoostCapabilities {
            sched_boost: sched.is_some(),
            ..caps
        };
        let _ = self.backends.set(Backends { caps, sched });
    }

    pub fn capabilities(&self) -> Option<BoostCapabilities> {
        self.backends.get().map(|b| b.caps)
    }

    pub fn set_interactive(&self, on: bool) {
        self.toggle.set_state(on);
    }

    fn lock_state(&self) -> MutexGuard<'_, HintState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pulse(&self, counters: &mut HintCounters) -> bool {
        match self.io.write(&self.config.paths.pulse_boost, PULSE_ON) {
            Ok(()) => true,
            Err(e) => {
                warn!("touch boost pulse failed: {:#}", e);
                counters.attr_errors += 1;
                false
            }
        }
    }

    /// Route one hint. `data` is the opaque hint payload; only its presence
    /// matters. Never fails: a hint that cannot be serviced is dropped.
    pub fn power_hint(&self, hint: PowerHint, data: Option<u32>) {
        let Some(backends) = self.backends.get() else {
            debug!("{} hint before init, dropped", hint);
            return;
        };
        let caps = backends.caps;

        // schedtune has its own lock; don't hold the hint lock across it.
        if hint == PowerHint::Interaction && !caps.pulse_boost {
            if let Some(sched) = &backends.sched {
                sched.request_boost();
            }
            return;
        }

        match hint {
            PowerHint::Interaction => {
                let mut state = self.lock_state();
                let HintState { touch, counters, .. } = &mut *state;
                counters.interaction_hints += 1;
                if touch.on_interaction(self.clock.now()) {
                    if self.pulse(counters) {
                        counters.touch_pulses += 1;
                    }
                } else {
                    counters.touch_suppressed += 1;
                }
            }
            PowerHint::Vsync => {
                if !caps.pulse_boost {
                    return;
                }
                let mut state = self.lock_state();
                let HintState { touch, counters, .. } = &mut *state;
                counters.vsync_hints += 1;
                if touch.on_vsync(self.clock.now(), data.is_some()) && self.pulse(counters) {
                    touch.vsync_pulse_delivered();
                    counters.vsync_pulses += 1;
                }
            }
            PowerHint::LowPower => {}
            PowerHint::AppLaunch => {
                if !caps.app_launch {
                    return;
                }
                let on = data.is_some();
                let mut state = self.lock_state();
                let HintState { app_launch, counters, .. } = &mut *state;
                match app_launch.apply(self.io.as_ref(), &self.config.paths, &caps, on) {
                    Ok(()) if on => counters.app_launch_on += 1,
                    Ok(()) => counters.app_launch_off += 1,
                    Err(e) => {
                        warn!("app launch boost failed: {:#}", e);
                        counters.attr_errors += 1;
                    }
                }
            }
            PowerHint::Other(raw) => debug!("unhandled power hint {:#x}", raw),
        }
    }

    pub fn metrics(&self) -> Metrics {
        let flag = |on: bool| on as u64;
        let caps = self.capabilities().unwrap_or_default();
        let sched = self
            .backends
            .get()
            .and_then(|b| b.sched.as_ref())
            .map(|s| s.stats())
            .unwrap_or_default();

        let state = self.lock_state();
        let c = state.counters;
        Metrics {
            interaction_hints: c.interaction_hints,
            vsync_hints: c.vsync_hints,
            touch_pulses: c.touch_pulses,
            touch_suppressed: c.touch_suppressed,
            vsync_pulses: c.vsync_pulses,
            attr_errors: c.attr_errors,
            app_launch_on: c.app_launch_on,
            app_launch_off: c.app_launch_off,
            sched_requests: sched.requests,
            sched_escalations: sched.escalations,
            sched_demotions: sched.demotions,
            sched_errors: sched.write_errors,
            scroll_active: flag(state.touch.scroll_active()),
            timer_adjusted: flag(state.touch.timer_adjusted()),
            vsync_boost: flag(state.touch.vsync_boost_active()),
            vsync_pulses_left: state.touch.vsync_pulses_left() as u64,
            deboost_pending: flag(sched.pending),
            cap_pulse: flag(caps.pulse_boost),
            cap_floor: flag(caps.floor_boost),
            cap_sched: flag(caps.sched_boost),
            cap_app_launch: flag(caps.app_launch),
        }
    }

    #[cfg(test)]
    fn touch(&self) -> TouchCadence {
        self.lock_state().touch.clone()
    }
}
