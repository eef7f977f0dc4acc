use std::time::Duration;

use super::timer::{TimerHandle, TimerKind, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// Which half of a surface `width` wide the point `x` falls in. The midpoint
/// itself belongs to the right half.
pub(crate) fn side_for(x: f64, width: f64) -> Side {
    if x < width / 2.0 {
        Side::Left
    } else {
        Side::Right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapState {
    Idle,
    Pending { at: Duration, handle: TimerHandle },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TapOutcome {
    /// First tap of a possible pair; its action waits for the window to close.
    SingleDeferred,
    Double,
}

/// Splits taps into singles and doubles. A single tap's action only runs
/// when its deferred timer fires, so a quick second tap can still claim it.
#[derive(Debug)]
pub(crate) struct TapClassifier {
    state: TapState,
}

impl Default for TapClassifier {
    fn default() -> Self {
        Self {
            state: TapState::Idle,
        }
    }
}

impl TapClassifier {
    pub(crate) fn register(
        &mut self,
        now: Duration,
        window: Duration,
        timers: &mut TimerQueue,
    ) -> TapOutcome {
        if let TapState::Pending { at, handle } = self.state
            && now.saturating_sub(at) < window
        {
            timers.cancel(handle);
            self.state = TapState::Idle;
            return TapOutcome::Double;
        }

        self.reset(timers);
        let handle = timers.schedule(TimerKind::SingleTap, now, window);
        self.state = TapState::Pending { at: now, handle };
        TapOutcome::SingleDeferred
    }

    /// Handles a fired single-tap timer. True when the deferred single action
    /// should run now.
    pub(crate) fn on_timer(&mut self, handle: TimerHandle) -> bool {
        match self.state {
            TapState::Pending { handle: pending, .. } if pending == handle => {
                self.state = TapState::Idle;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.state, TapState::Pending { .. })
    }

    pub(crate) fn reset(&mut self, timers: &mut TimerQueue) {
        if let TapState::Pending { handle, .. } = self.state {
            timers.cancel(handle);
        }
        self.state = TapState::Idle;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Key {
    Char(char),
    Space,
    Left,
    Right,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Player,
    TextInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shortcut {
    TogglePlay,
    SeekBackward,
    SeekForward,
    Fullscreen,
    Mute,
    Stats,
}

pub(crate) fn shortcut_for(key: Key, focus: Focus) -> Option<Shortcut> {
    if focus == Focus::TextInput {
        return None;
    }
    match key {
        Key::Space => Some(Shortcut::TogglePlay),
        Key::Left => Some(Shortcut::SeekBackward),
        Key::Right => Some(Shortcut::SeekForward),
        Key::Char(c) => match c.to_ascii_lowercase() {
            'k' => Some(Shortcut::TogglePlay),
            'f' => Some(Shortcut::Fullscreen),
            'm' => Some(Shortcut::Mute),
            'i' => Some(Shortcut::Stats),
            ' ' => Some(Shortcut::TogglePlay),
            _ => None,
        },
        Key::Other => None,
    }
}

/// Horizontal extent of the progress bar in the host's coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BarGeometry {
    pub(crate) left: f64,
    pub(crate) width: f64,
}

/// Seek target for a pointer at `x` over the bar, or `None` when either the
/// bar or the media has no length.
pub(crate) fn bar_seek_target(x: f64, bar: BarGeometry, duration: f64) -> Option<f64> {
    if !bar.width.is_finite() || bar.width <= 0.0 {
        return None;
    }
    if !duration.is_finite() || duration <= 0.0 || !x.is_finite() {
        return None;
    }
    let ratio = ((x - bar.left) / bar.width).clamp(0.0, 1.0);
    Some(ratio * duration)
}

/// Pointer capture for a progress-bar drag. Moves only count while
/// captured; release always succeeds wherever the pointer is.
#[derive(Debug, Default)]
pub(crate) struct ProgressDrag {
    captured: bool,
}

impl ProgressDrag {
    pub(crate) fn begin(&mut self) {
        self.captured = true;
    }

    pub(crate) fn is_captured(&self) -> bool {
        self.captured
    }

    pub(crate) fn end(&mut self) -> bool {
        std::mem::take(&mut self.captured)
    }
}
