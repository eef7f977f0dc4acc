//! Playback controller for one watch session.
//!
//! The controller never touches a media element or storage directly. It
//! talks to a [`MediaSink`] for playback and a [`KeyValueStore`] for resume
//! positions and the quality preference, and it is driven by the host calling
//! [`PlaybackController::pump`] with a monotonic timestamp. The watch view
//! plugs in an mpv process as the sink.

#[cfg(test)]
mod clock;
mod controller;
mod controls;
mod gesture;
mod media;
#[cfg(unix)]
mod mpv;
mod progress;
mod quality;
mod timer;
mod transition;

use std::time::Duration;

#[cfg(test)]
pub(crate) use clock::HeadlessClock;
pub(crate) use controller::{PlaybackController, SessionStatus, Snapshot};
pub(crate) use gesture::{BarGeometry, Focus, Key, Side};
pub(crate) use media::MediaSink;
#[cfg(unix)]
pub(crate) use mpv::MpvSink;
#[cfg(test)]
pub(crate) use progress::MemoryStore;
pub(crate) use progress::{KeyValueStore, PREFERRED_QUALITY_KEY, StoreError, progress_key};
pub(crate) use quality::list_qualities;

/// Timing and threshold knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlayerSettings {
    pub(crate) controls_timeout: Duration,
    pub(crate) pointer_leave_hide: Duration,
    pub(crate) save_interval: Duration,
    pub(crate) min_progress_secs: f64,
    pub(crate) end_threshold_secs: f64,
    pub(crate) seek_step_secs: f64,
    pub(crate) double_tap_window: Duration,
    pub(crate) cue_duration: Duration,
    pub(crate) default_quality: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            controls_timeout: Duration::from_millis(3000),
            pointer_leave_hide: Duration::from_millis(500),
            save_interval: Duration::from_millis(5000),
            min_progress_secs: 5.0,
            end_threshold_secs: 10.0,
            seek_step_secs: 5.0,
            double_tap_window: Duration::from_millis(300),
            cue_duration: Duration::from_millis(500),
            default_quality: 720,
        }
    }
}

/// Clamps a seek target into `[0, duration]`. Non-finite targets go to 0 and
/// an unknown duration leaves only the lower bound in place.
pub(crate) fn clamp_seek(target: f64, duration: f64) -> f64 {
    if !target.is_finite() {
        return 0.0;
    }
    let lower = target.max(0.0);
    if duration.is_finite() && duration > 0.0 {
        lower.min(duration)
    } else {
        lower
    }
}
