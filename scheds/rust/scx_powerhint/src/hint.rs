// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Power hint kinds
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::fmt;

/// Hint kinds of the Android power HAL (`power_hint_t`). `Other` carries the
/// raw number of a hint this engine does not handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerHint {
    Vsync,
    Interaction,
    LowPower,
    AppLaunch,
    Other(u32),
}

impl fmt::Display for PowerHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerHint::Vsync => write!(f, "vsync"),
            PowerHint::Interaction => write!(f, "interaction"),
            PowerHint::LowPower => write!(f, "low_power"),
            PowerHint::AppLaunch => write!(f, "app_launch"),
            PowerHint::Other(raw) => write!(f, "hint({:#x})", raw),
        }
    }
}
