// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Touch and vsync driven CPU boost daemon
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use scx_stats::prelude::*;
use scx_stats_derive::stat_doc;
use scx_stats_derive::Stats;
use serde::Deserialize;
use serde::Serialize;

#[stat_doc]
#[derive(Clone, Debug, Default, Serialize, Deserialize, Stats)]
#[serde(default)]
#[stat(top)]
pub struct Metrics {
    #[stat(desc = "Interaction hints in interval")]
    pub interaction_hints: u64,
    #[stat(desc = "Vsync hints in interval")]
    pub vsync_hints: u64,
    #[stat(desc = "Touch pulses asserted in interval")]
    pub touch_pulses: u64,
    #[stat(desc = "Touch hints not pulsed because of scrolling")]
    pub touch_suppressed: u64,
    #[stat(desc = "Post-scroll vsync pulses asserted in interval")]
    pub vsync_pulses: u64,
    #[stat(desc = "Failed boost attribute writes in interval")]
    pub attr_errors: u64,
    #[stat(desc = "App launch boosts started in interval")]
    pub app_launch_on: u64,
    #[stat(desc = "App launch boosts ended in interval")]
    pub app_launch_off: u64,
    #[stat(desc = "schedtune boost requests in interval")]
    pub sched_requests: u64,
    #[stat(desc = "schedtune escalations to the interactive level")]
    pub sched_escalations: u64,
    #[stat(desc = "schedtune demotions to the normal level")]
    pub sched_demotions: u64,
    #[stat(desc = "schedtune write failures in interval")]
    pub sched_errors: u64,

    #[stat(desc = "Scroll mode active (1=yes, 0=no)")]
    pub scroll_active: u64,
    #[stat(desc = "Governor timer tightening requested (1=yes, 0=no)")]
    pub timer_adjusted: u64,
    #[stat(desc = "Post-scroll vsync boost active (1=yes, 0=no)")]
    pub vsync_boost: u64,
    #[stat(desc = "Vsync pulses left in the current boost")]
    pub vsync_pulses_left: u64,
    #[stat(desc = "schedtune deboost pending (1=yes, 0=no)")]
    pub deboost_pending: u64,

    #[stat(desc = "Interactive pulse boost available")]
    pub cap_pulse: u64,
    #[stat(desc = "intel_pstate floor boost available")]
    pub cap_floor: u64,
    #[stat(desc = "schedtune boost available")]
    pub cap_sched: u64,
    #[stat(desc = "App launch boost enabled")]
    pub cap_app_launch: u64,
}

impl Metrics {
    pub fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        let caps = [
            (self.cap_pulse, "pulse"),
            (self.cap_floor, "floor"),
            (self.cap_sched, "schedtune"),
            (self.cap_app_launch, "launch"),
        ]
        .iter()
        .filter(|(on, _)| *on != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(",");
        let mode = if self.scroll_active != 0 {
            if self.timer_adjusted != 0 { "SCROLL+T" } else { "SCROLL" }
        } else if self.vsync_boost != 0 {
            "FLING"
        } else {
            "TAP"
        };

        let now = Local::now();
        writeln!(w, "┌─ {} {} ─", crate::SCHEDULER_NAME, now.format("%H:%M:%S"))?;
        writeln!(w, "│ caps [{}]  mode {:<8} vsync left {}",
                 if caps.is_empty() { "none" } else { &caps }, mode, self.vsync_pulses_left)?;
        writeln!(w, "│ hints: touch {:>6}  vsync {:>6}   pulses: touch {:>6}  vsync {:>4}  supp {:>6}",
                 self.interaction_hints, self.vsync_hints,
                 self.touch_pulses, self.vsync_pulses, self.touch_suppressed)?;
        writeln!(w, "│ stune: req {:>6}  up {:>4}  down {:>4}  err {:>3}  {}",
                 self.sched_requests, self.sched_escalations, self.sched_demotions, self.sched_errors,
                 if self.deboost_pending != 0 { "BOOSTED" } else { "normal" })?;
        if self.app_launch_on > 0 || self.app_launch_off > 0 || self.attr_errors > 0 {
            writeln!(w, "│ launch: on {:>3}  off {:>3}   attr errors {:>4}",
                     self.app_launch_on, self.app_launch_off, self.attr_errors)?;
        }
        writeln!(w, "└─")?;
        Ok(())
    }

    fn delta(&self, prev: &Self) -> Self {
        Self {
            interaction_hints: self.interaction_hints.saturating_sub(prev.interaction_hints),
            vsync_hints: self.vsync_hints.saturating_sub(prev.vsync_hints),
            touch_pulses: self.touch_pulses.saturating_sub(prev.touch_pulses),
            touch_suppressed: self.touch_suppressed.saturating_sub(prev.touch_suppressed),
            vsync_pulses: self.vsync_pulses.saturating_sub(prev.vsync_pulses),
            attr_errors: self.attr_errors.saturating_sub(prev.attr_errors),
            app_launch_on: self.app_launch_on.saturating_sub(prev.app_launch_on),
            app_launch_off: self.app_launch_off.saturating_sub(prev.app_launch_off),
            sched_requests: self.sched_requests.saturating_sub(prev.sched_requests),
            sched_escalations: self.sched_escalations.saturating_sub(prev.sched_escalations),
            sched_demotions: self.sched_demotions.saturating_sub(prev.sched_demotions),
            sched_errors: self.sched_errors.saturating_sub(prev.sched_errors),
            ..self.clone()
        }
    }
}

pub fn server_data() -> StatsServerData<(), Metrics> {
    let open: Box<dyn StatsOpener<(), Metrics>> = Box::new(move |(req_ch, res_ch)| {
        req_ch.send(())?;
        let mut prev = res_ch.recv()?;

        let read: Box<dyn StatsReader<(), Metrics>> = Box::new(move |_args, (req_ch, res_ch)| {
            req_ch.send(())?;
            let cur = res_ch.recv()?;
            let delta = cur.delta(&prev);
            prev = cur;
            delta.to_json()
        });

        Ok(read)
    });

    StatsServerData::new()
        .add_meta(Metrics::meta())
        .add_ops("top", StatsOps { open, close: None })
}

/// Print interval stats from a running daemon until `shutdown` is set.
pub fn monitor(intv: Duration, shutdown: Arc<AtomicBool>) -> Result<()> {
    scx_utils::monitor_stats::<Metrics>(
        &[],
        intv,
        || shutdown.load(Ordering::Relaxed),
        |metrics| metrics.format(&mut std::io::stdout()),
    )
}
