// SPDX-License-Identifier: GPL-2.0
//
// scx_powerhint: Touchscreen input source
// Copyright (c) 2025 RitzDaCat
//
// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

use std::collections::BTreeSet;
use std::fs;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use evdev::{AbsoluteAxisType, EventType, InputEvent, Key, PropType};
use log::{debug, info, warn};

/// Finger state derived from one touchscreen's event stream.
///
/// Multitouch devices report contacts per slot (`ABS_MT_SLOT`), a slot's
/// contact ends when its tracking id becomes -1. Single-touch devices only
/// report `BTN_TOUCH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchTracker {
    btn_touch: bool,
    slot: i32,
    contacts: BTreeSet<i32>,
    last_activity: Option<Duration>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one batch of events read at `now`. Returns true when the batch
    /// carried touch activity (contact change or movement).
    pub fn feed<I>(&mut self, events: I, now: Duration) -> bool
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let mut active = false;
        for ev in events {
            match ev.event_type() {
                EventType::KEY if ev.code() == Key::BTN_TOUCH.code() => {
                    self.btn_touch = ev.value() != 0;
                    active = true;
                }
                EventType::ABSOLUTE => {
                    let code = ev.code();
                    if code == AbsoluteAxisType::ABS_MT_SLOT.0 {
                        self.slot = ev.value();
                    } else if code == AbsoluteAxisType::ABS_MT_TRACKING_ID.0 {
                        if ev.value() < 0 {
                            self.contacts.remove(&self.slot);
                        } else {
                            self.contacts.insert(self.slot);
                        }
                    }
                    active = true;
                }
                _ => {}
            }
        }
        if active {
            self.last_activity = Some(now);
        }
        active
    }

    pub fn finger_down(&self) -> bool {
        self.btn_touch || !self.contacts.is_empty()
    }

    /// A frame is still expected while a finger is on the screen and for
    /// `settle` after the last activity (fling animations).
    pub fn frame_expected(&self, now: Duration, settle: Duration) -> bool {
        self.finger_down()
            || self
                .last_activity
                .map_or(false, |at| now.saturating_sub(at) <= settle)
    }
}

fn is_touchscreen(dev: &evdev::Device) -> bool {
    // Touchpads report BTN_TOUCH too but drive a pointer.
    if dev.properties().contains(PropType::POINTER) {
        return false;
    }
    let has_touch = dev
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_TOUCH));
    let has_mt = dev
        .supported_absolute_axes()
        .map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_MT_POSITION_X));
    has_touch || has_mt
}

fn set_nonblocking(dev: &evdev::Device) {
    let fd = dev.as_raw_fd();
    // SAFETY: fd is owned by `dev` and open for the duration of the call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags >= 0 {
            let _ = libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

/// Open every touchscreen `event*` node under `dir` in non-blocking mode.
pub fn open_touch_devices(dir: &Path) -> Result<Vec<evdev::Device>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Error opening {}", dir.display()))?;

    let mut devs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|s| s.to_str())
            .map_or(false, |name| name.starts_with("event"));
        if !is_event_node {
            continue;
        }

        let dev = match evdev::Device::open(&path) {
            Ok(dev) => dev,
            Err(e) => {
                debug!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !is_touchscreen(&dev) {
            continue;
        }
        if dev.as_raw_fd() < 0 {
            warn!("invalid fd for {}", path.display());
            continue;
        }
        set_nonblocking(&dev);
        info!(
            "touch device: {} ({})",
            dev.name().unwrap_or("unknown"),
            path.display()
        );
        devs.push(dev);
    }
    Ok(devs)
}
