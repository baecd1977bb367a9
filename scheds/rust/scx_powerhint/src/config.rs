// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Boost attribute locations and runtime options
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const TOUCHBOOST_PULSE_PATH: &str = "/sys/devices/system/cpu/cpufreq/interactive/touchboostpulse";
pub const INTERACTIVE_BOOST_PATH: &str = "/sys/devices/system/cpu/cpufreq/interactive/boost";
pub const INTEL_PSTATE_FLOOR_PATH: &str = "/sys/devices/system/cpu/intel_pstate/min_perf_pct";
pub const SCHEDTUNE_BOOST_PATH: &str = "/dev/stune/foreground/schedtune.boost";

/// Control attributes of the three boost mechanisms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostPaths {
    /// cpufreq interactive governor pulse ("1" = boost for one pulse period)
    pub pulse_boost: PathBuf,
    /// cpufreq interactive governor sustained boost, used for app launch
    pub interactive_boost: PathBuf,
    /// intel_pstate minimum performance percentage
    pub perf_floor: PathBuf,
    /// schedtune boost of the foreground group
    pub sched_boost: PathBuf,
}

impl Default for BoostPaths {
    fn default() -> Self {
        Self {
            pulse_boost: PathBuf::from(TOUCHBOOST_PULSE_PATH),
            interactive_boost: PathBuf::from(INTERACTIVE_BOOST_PATH),
            perf_floor: PathBuf::from(INTEL_PSTATE_FLOOR_PATH),
            sched_boost: PathBuf::from(SCHEDTUNE_BOOST_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    pub paths: BoostPaths,
    /// Honour app-launch hints (sustained boost while an app starts).
    pub app_launch_boost: bool,
}

impl BoostConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: BoostConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Config with every attribute relocated under `root`, keeping file names.
    /// Handy for running against a fake sysfs tree.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let relocate = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            paths: BoostPaths {
                pulse_boost: relocate(TOUCHBOOST_PULSE_PATH),
                interactive_boost: relocate(INTERACTIVE_BOOST_PATH),
                perf_floor: relocate(INTEL_PSTATE_FLOOR_PATH),
                sched_boost: relocate(SCHEDTUNE_BOOST_PATH),
            },
            app_launch_boost: false,
        }
    }
}
