// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Boost mechanism detection
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fmt;
use std::path::Path;

use log::info;

use crate::config::BoostPaths;
use crate::sysfs::AttrIo;

/// Boost mechanisms found on this machine. Decided once at init.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoostCapabilities {
    /// interactive governor touch pulse; preferred path for touch/vsync
    pub pulse_boost: bool,
    /// intel_pstate performance floor; only used for app launch
    pub floor_boost: bool,
    /// schedtune group boost; fallback for touch when there is no pulse
    pub sched_boost: bool,
    /// app-launch hints are honoured (enabled and a mechanism exists)
    pub app_launch: bool,
}

impl fmt::Display for BoostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "pulse={} floor={} schedtune={} app_launch={}",
            flag(self.pulse_boost),
            flag(self.floor_boost),
            flag(self.sched_boost),
            flag(self.app_launch)
        )
    }
}

fn attr_readable(io: &dyn AttrIo, path: &Path) -> bool {
    match io.read(path, 1) {
        Ok(_) => true,
        Err(e) => {
            info!("boost attribute unavailable: {:#}", e);
            false
        }
    }
}

/// Probe the two read-probed mechanisms. The schedtune mechanism is probed by
/// starting its engine, see `SchedBoost::start`.
pub fn probe_attrs(io: &dyn AttrIo, paths: &BoostPaths) -> BoostCapabilities {
    BoostCapabilities {
        pulse_boost: attr_readable(io, &paths.pulse_boost),
        floor_boost: attr_readable(io, &paths.perf_floor),
        ..Default::default()
    }
}
