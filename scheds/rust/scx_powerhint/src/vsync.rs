// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Frame-rate ticker
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use anyhow::{anyhow, Result};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};

/// Periodic timerfd standing in for display vsync. Register `as_fd()` with
/// epoll and call `ack()` on every wakeup.
pub struct VsyncTicker {
    timer: TimerFd,
    period: Duration,
}

pub fn vsync_period(hz: u32) -> Option<Duration> {
    if hz == 0 {
        return None;
    }
    Some(Duration::from_nanos(1_000_000_000 / hz as u64))
}

impl VsyncTicker {
    pub fn new(hz: u32) -> Result<Self> {
        let period = vsync_period(hz).ok_or_else(|| anyhow!("vsync rate must be non-zero"))?;
        let timer = TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )
        .map_err(|e| anyhow!("timerfd_create failed: {}", e))?;
        timer
            .set(
                Expiration::Interval(TimeSpec::from_duration(period)),
                TimerSetTimeFlags::empty(),
            )
            .map_err(|e| anyhow!("timerfd_settime failed: {}", e))?;
        Ok(Self { timer, period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Consume pending expirations. Returns false if the timer had not fired.
    pub fn ack(&self) -> Result<bool> {
        match self.timer.wait() {
            Ok(()) => Ok(true),
            Err(Errno::EAGAIN) => Ok(false),
            Err(e) => Err(anyhow!("timerfd read failed: {}", e)),
        }
    }
}

impl AsFd for VsyncTicker {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.timer.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_rate() {
        assert_eq!(vsync_period(0), None);
        assert_eq!(vsync_period(60), Some(Duration::from_nanos(16_666_666)));
        assert_eq!(vsync_period(120), Some(Duration::from_nanos(8_333_333)));
    }

    #[test]
    fn ticker_fires_and_drains() {
        let ticker = VsyncTicker::new(10).unwrap();
        assert_eq!(ticker.period(), Duration::from_millis(100));
        std::thread::sleep(Duration::from_millis(120));
        assert!(ticker.ack().unwrap());
        // drained: nothing pending right after the read
        assert!(!ticker.ack().unwrap());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(VsyncTicker::new(0).is_err());
    }
}
