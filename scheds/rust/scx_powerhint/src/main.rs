// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Touch and vsync driven CPU boost daemon
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};
use scx_stats::prelude::*;

use scx_powerhint::input::{open_touch_devices, TouchTracker};
use scx_powerhint::stats::{self, Metrics};
use scx_powerhint::vsync::VsyncTicker;
use scx_powerhint::{
    BoostConfig, Clock, LogToggle, MonotonicClock, PowerHal, PowerHint, SysfsIo, SCHEDULER_NAME,
};

const VSYNC_TAG: u64 = u64::MAX;

#[derive(Debug, Clone, clap::Parser)]
#[command(
    name = "scx_powerhint",
    version,
    about = "Boost CPU frequency and foreground scheduling on touch, back off while scrolling."
)]
struct Opts {
    /// JSON configuration file with boost attribute paths.
    #[clap(short = 'c', long, env = "SCX_POWERHINT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the interactive governor touch pulse attribute.
    #[clap(long, env = "SCX_POWERHINT_PULSE_PATH")]
    pulse_path: Option<PathBuf>,

    /// Override the interactive governor boost attribute (app launch).
    #[clap(long, env = "SCX_POWERHINT_INTERACTIVE_BOOST_PATH")]
    interactive_boost_path: Option<PathBuf>,

    /// Override the intel_pstate performance floor attribute.
    #[clap(long, env = "SCX_POWERHINT_FLOOR_PATH")]
    floor_path: Option<PathBuf>,

    /// Override the schedtune boost attribute.
    #[clap(long, env = "SCX_POWERHINT_SCHED_BOOST_PATH")]
    sched_boost_path: Option<PathBuf>,

    /// Boost while applications launch.
    #[clap(long, action = clap::ArgAction::SetTrue)]
    app_launch_boost: bool,

    /// Directory scanned for touchscreen event devices.
    #[clap(long, default_value = "/dev/input")]
    input_dir: PathBuf,

    /// Vsync hint rate in Hz. 0 disables vsync hints.
    #[clap(long, default_value = "60")]
    vsync_hz: u32,

    /// Keep reporting pending frames this long after the last touch activity.
    #[clap(long, default_value = "250")]
    settle_ms: u64,

    /// Enable stats monitoring with the specified interval.
    #[clap(long)]
    stats: Option<f64>,

    /// Run in stats monitoring mode with the specified interval. The boost
    /// daemon is not launched.
    #[clap(long)]
    monitor: Option<f64>,

    /// Show descriptions for statistics.
    #[clap(long)]
    help_stats: bool,

    /// Enable verbose output.
    #[clap(short = 'v', long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

fn boost_config(opts: &Opts) -> Result<BoostConfig> {
    let mut config = match &opts.config {
        Some(path) => BoostConfig::load(path)?,
        None => BoostConfig::default(),
    };
    if let Some(p) = &opts.pulse_path {
        config.paths.pulse_boost = p.clone();
    }
    if let Some(p) = &opts.interactive_boost_path {
        config.paths.interactive_boost = p.clone();
    }
    if let Some(p) = &opts.floor_path {
        config.paths.perf_floor = p.clone();
    }
    if let Some(p) = &opts.sched_boost_path {
        config.paths.sched_boost = p.clone();
    }
    config.app_launch_boost |= opts.app_launch_boost;
    Ok(config)
}

/// Timer read errors only cost one vsync hint.
fn vsync_fired(ack: Result<bool>) -> bool {
    match ack {
        Ok(fired) => fired,
        Err(e) => {
            warn!("vsync ticker read failed: {:#}", e);
            false
        }
    }
}

struct Daemon<'a> {
    opts: &'a Opts,
    hal: PowerHal,
    clock: Arc<dyn Clock>,
    touch_devs: Vec<evdev::Device>,
    trackers: Vec<TouchTracker>,
    ticker: Option<VsyncTicker>,
    stats_server: StatsServer<(), Metrics>,
}

impl<'a> Daemon<'a> {
    fn init(opts: &'a Opts) -> Result<Self> {
        let config = boost_config(opts)?;
        debug!("boost config: {:?}", config);

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);
        let hal = PowerHal::new(
            config,
            Arc::new(SysfsIo),
            Arc::clone(&clock),
            Box::new(LogToggle),
        );
        hal.init();

        let touch_devs = match open_touch_devices(&opts.input_dir) {
            Ok(devs) => devs,
            Err(e) => {
                warn!("no touch input: {:#}", e);
                Vec::new()
            }
        };
        info!("Found {} touch devices", touch_devs.len());
        let trackers = vec![TouchTracker::new(); touch_devs.len()];

        let ticker = if opts.vsync_hz > 0 {
            let ticker = VsyncTicker::new(opts.vsync_hz)?;
            info!("vsync hints every {:?}", ticker.period());
            Some(ticker)
        } else {
            None
        };

        let stats_server = StatsServer::new(stats::server_data()).launch()?;

        Ok(Self {
            opts,
            hal,
            clock,
            touch_devs,
            trackers,
            ticker,
            stats_server,
        })
    }

    fn on_touch_ready(&mut self, idx: usize) {
        let now = self.clock.now();
        let (Some(dev), Some(tracker)) = (self.touch_devs.get_mut(idx), self.trackers.get_mut(idx))
        else {
            return;
        };
        let active = match dev.fetch_events() {
            Ok(events) => tracker.feed(events, now),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
            Err(e) => {
                warn!("touch device read failed: {}", e);
                false
            }
        };
        if active {
            self.hal.power_hint(PowerHint::Interaction, None);
        }
    }

    fn on_vsync_ready(&mut self, settle: Duration) {
        let Some(ticker) = &self.ticker else {
            return;
        };
        if !vsync_fired(ticker.ack()) {
            return;
        }
        let now = self.clock.now();
        let frame_pending = self
            .trackers
            .iter()
            .any(|t| t.frame_expected(now, settle));
        self.hal
            .power_hint(PowerHint::Vsync, frame_pending.then_some(1));
    }

    fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let (stats_response_tx, stats_request_rx) = self.stats_server.channels();

        let epfd = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC).map_err(|e| anyhow!(e))?;
        for (idx, dev) in self.touch_devs.iter().enumerate() {
            // SAFETY: the device owns the fd and outlives the epoll instance.
            let bfd = unsafe { BorrowedFd::borrow_raw(dev.as_raw_fd()) };
            epfd.add(bfd, EpollEvent::new(EpollFlags::EPOLLIN, idx as u64))
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(ticker) = &self.ticker {
            epfd.add(ticker.as_fd(), EpollEvent::new(EpollFlags::EPOLLIN, VSYNC_TAG))
                .map_err(|e| anyhow!("Failed to register vsync ticker with epoll: {}", e))?;
        }

        let settle = Duration::from_millis(self.opts.settle_ms);
        let mut events = [EpollEvent::empty(); 16];
        info!("{} running", SCHEDULER_NAME);

        while !shutdown.load(Ordering::Relaxed) {
            while stats_request_rx.try_recv().is_ok() {
                stats_response_tx.send(self.hal.metrics())?;
            }

            const EPOLL_TIMEOUT_MS: u16 = 100;
            let n = match epfd.wait(&mut events, Some(EPOLL_TIMEOUT_MS)) {
                Ok(n) => n,
                Err(e) if e == nix::errno::Errno::EINTR => continue,
                Err(e) => {
                    warn!("epoll_wait failed: {}", e);
                    break;
                }
            };

            for ev in &events[..n] {
                let tag = ev.data();
                if tag == VSYNC_TAG {
                    self.on_vsync_ready(settle);
                    continue;
                }

                let idx = tag as usize;
                let flags = ev.events();
                if flags.contains(EpollFlags::EPOLLHUP) || flags.contains(EpollFlags::EPOLLERR) {
                    if let Some(dev) = self.touch_devs.get(idx) {
                        info!("touch device {} gone", dev.name().unwrap_or("unknown"));
                        // SAFETY: still owned by `dev`, only removed from the interest list.
                        let bfd = unsafe { BorrowedFd::borrow_raw(dev.as_raw_fd()) };
                        let _ = epfd.delete(bfd);
                    }
                    continue;
                }
                self.on_touch_ready(idx);
            }
        }

        info!("{} exiting", SCHEDULER_NAME);
        Ok(())
    }
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if opts.help_stats {
        stats::server_data().describe_meta(&mut std::io::stdout(), None)?;
        return Ok(());
    }

    let loglevel = if opts.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let mut lcfg = simplelog::ConfigBuilder::new();
    if lcfg.set_time_offset_to_local().is_err() {
        eprintln!("{}: local time offset unavailable, logging in UTC", SCHEDULER_NAME);
    }
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        loglevel,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::Relaxed);
    })
    .context("Error setting Ctrl-C handler")?;

    let stats_thread = if let Some(intv) = opts.monitor.or(opts.stats) {
        let shutdown_copy = shutdown.clone();
        Some(std::thread::spawn(move || {
            let stats_interval = Duration::from_secs_f64(intv);
            if let Err(e) = stats::monitor(stats_interval, shutdown_copy) {
                warn!("stats monitor thread finished because of an error {}", e)
            }
        }))
    } else {
        None
    };

    if opts.monitor.is_some() {
        if let Some(jh) = stats_thread {
            let _ = jh.join();
        }
        return Ok(());
    }

    let mut daemon = Daemon::init(&opts)?;
    daemon.run(shutdown.clone())?;

    if let Some(jh) = stats_thread {
        info!("Waiting for stats thread to finish...");
        let mut joined = false;
        for _ in 0..10 {
            if jh.is_finished() {
                let _ = jh.join();
                joined = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        if !joined {
            warn!("Stats thread didn't finish in time, detaching");
        }
    }

    Ok(())
}
