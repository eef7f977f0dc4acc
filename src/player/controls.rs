use std::time::Duration;

use super::timer::{TimerHandle, TimerKind, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    /// Visible until something hides it explicitly. Used while paused.
    VisiblePinned,
    /// Visible with a hide timer running.
    VisibleTimed,
    Hidden,
}

impl Visibility {
    pub(crate) fn is_visible(self) -> bool {
        !matches!(self, Visibility::Hidden)
    }
}

/// Transport control fade in/out. Owns at most one hide timer; every path
/// that schedules cancels the previous one first.
#[derive(Debug)]
pub(crate) struct ControlVisibility {
    state: Visibility,
    hide_timer: Option<TimerHandle>,
    hovered: bool,
}

impl Default for ControlVisibility {
    fn default() -> Self {
        Self {
            state: Visibility::Hidden,
            hide_timer: None,
            hovered: false,
        }
    }
}

impl ControlVisibility {
    pub(crate) fn state(&self) -> Visibility {
        self.state
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.state.is_visible()
    }

    pub(crate) fn show(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.hide_timer);
        self.state = Visibility::VisiblePinned;
    }

    pub(crate) fn show_temporarily(
        &mut self,
        timers: &mut TimerQueue,
        now: Duration,
        playing: bool,
        timeout: Duration,
    ) {
        timers.cancel_slot(&mut self.hide_timer);
        if playing && !self.hovered {
            self.hide_timer = Some(timers.schedule(TimerKind::HideControls, now, timeout));
            self.state = Visibility::VisibleTimed;
        } else {
            self.state = Visibility::VisiblePinned;
        }
    }

    /// Playback started. Visible controls start their countdown, hidden ones
    /// stay hidden.
    pub(crate) fn on_play(&mut self, timers: &mut TimerQueue, now: Duration, timeout: Duration) {
        if self.is_visible() {
            self.show_temporarily(timers, now, true, timeout);
        }
    }

    pub(crate) fn pin(&mut self, timers: &mut TimerQueue) {
        self.show(timers);
    }

    /// The pointer is over the player. Controls stay up, with no hide
    /// pending, until it leaves.
    pub(crate) fn pointer_enter(&mut self, timers: &mut TimerQueue) {
        self.hovered = true;
        self.show(timers);
    }

    pub(crate) fn pointer_leave(
        &mut self,
        timers: &mut TimerQueue,
        now: Duration,
        playing: bool,
        delay: Duration,
    ) {
        self.hovered = false;
        if playing && self.is_visible() {
            self.show_temporarily(timers, now, true, delay);
        }
    }

    pub(crate) fn hide_now(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.hide_timer);
        self.state = Visibility::Hidden;
    }

    /// Handles a fired hide timer. Returns false for a handle this instance
    /// no longer owns.
    pub(crate) fn on_timer(&mut self, handle: TimerHandle, playing: bool) -> bool {
        if self.hide_timer != Some(handle) {
            return false;
        }
        self.hide_timer = None;
        self.state = if playing {
            Visibility::Hidden
        } else {
            Visibility::VisiblePinned
        };
        true
    }

    pub(crate) fn cancel(&mut self, timers: &mut TimerQueue) {
        timers.cancel_slot(&mut self.hide_timer);
    }
}
