// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Sustained boost while an application launches
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use anyhow::Result;
use log::{info, warn};

use crate::config::BoostPaths;
use crate::probe::BoostCapabilities;
use crate::sysfs::{attr_text, AttrIo};

/// min_perf_pct applied while launching.
pub const FLOOR_BOOST_PCT: &str = "100";
/// Enough for "100" plus a newline.
const FLOOR_READ_LEN: usize = 4;

/// Launch boost state. With the interactive governor it toggles the
/// governor's boost attribute; otherwise it raises the intel_pstate floor and
/// restores the previous floor afterwards.
#[derive(Debug, Default)]
pub struct AppLaunchBoost {
    saved_floor: Option<String>,
}

impl AppLaunchBoost {
    pub fn apply(&mut self, io: &dyn AttrIo, paths: &BoostPaths, caps: &BoostCapabilities, on: bool) -> Result<()> {
        if caps.pulse_boost {
            info!("app launch boost {}", if on { "ON" } else { "OFF" });
            return io.write(&paths.interactive_boost, if on { "1" } else { "0" });
        }
        if !caps.floor_boost {
            return Ok(());
        }

        if on {
            if self.saved_floor.is_none() {
                let prev = attr_text(&io.read(&paths.perf_floor, FLOOR_READ_LEN)?);
                io.write(&paths.perf_floor, FLOOR_BOOST_PCT)?;
                info!("app launch boost ON (min_perf_pct {} -> {})", prev, FLOOR_BOOST_PCT);
                self.saved_floor = Some(prev);
            }
        } else if let Some(prev) = self.saved_floor.take() {
            if let Err(e) = io.write(&paths.perf_floor, &prev) {
                // Keep the saved value so the next OFF retries the restore.
                warn!("failed to restore min_perf_pct {}", prev);
                self.saved_floor = Some(prev);
                return Err(e);
            }
            info!("app launch boost OFF (min_perf_pct -> {})", prev);
        }
        Ok(())
    }
}
