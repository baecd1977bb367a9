// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Touch and vsync driven CPU boost daemon
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Interactive CPU boosting driven by touch and vsync hints.
//!
//! [`PowerHal`] takes Android-style power hints and turns them into writes
//! to whichever boost mechanism the machine has: the interactive governor's
//! touch pulse, the intel_pstate performance floor or a schedtune group
//! boost. Taps are pulsed, scrolls are not, and a finger lift is followed by
//! a few vsync pulses to carry the fling.

pub mod app_launch;
pub mod clock;
pub mod config;
pub mod hint;
pub mod input;
pub mod interactive;
pub mod power;
pub mod probe;
pub mod schedtune;
pub mod stats;
pub mod sysfs;
pub mod touch;
pub mod vsync;

pub use clock::{Clock, MonotonicClock};
pub use config::{BoostConfig, BoostPaths};
pub use hint::PowerHint;
pub use interactive::{InteractiveToggle, LogToggle};
pub use power::PowerHal;
pub use probe::BoostCapabilities;
pub use sysfs::{AttrIo, SysfsIo};

pub const SCHEDULER_NAME: &str = "scx_powerhint";
