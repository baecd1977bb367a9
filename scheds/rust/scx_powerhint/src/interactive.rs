// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Global interactive-state collaborator
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use log::info;

/// Whole-device enable/disable used when the screen turns on or off
/// (device power monitors, cpuset restrictions). Implementations live outside
/// the boost engine; it only forwards the state.
pub trait InteractiveToggle: Send + Sync {
    fn set_state(&self, on: bool);
}

/// Toggle that only records the transition in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogToggle;

impl InteractiveToggle for LogToggle {
    fn set_state(&self, on: bool) {
        info!("interactive state -> {}", if on { "on" } else { "off" });
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MockToggle {
    pub states: std::sync::Mutex<Vec<bool>>,
}

#[cfg(test)]
impl InteractiveToggle for MockToggle {
    fn set_state(&self, on: bool) {
        self.states.lock().unwrap().push(on);
    }
}
