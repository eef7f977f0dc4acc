use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    HideControls,
    SaveProgress,
    ClearCue,
    SingleTap,
}

/// Identifies one scheduled firing. Handles are never reused, so a handle
/// kept past cancellation can't match a newer timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Scheduled {
    handle: TimerHandle,
    kind: TimerKind,
    deadline: Duration,
    period: Option<Duration>,
}

/// Single-threaded cooperative timer queue. Time is whatever monotonic
/// `Duration` the host passes in; nothing fires unless the host asks for
/// due timers.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    entries: Vec<Scheduled>,
}

impl TimerQueue {
    pub(crate) fn schedule(
        &mut self,
        kind: TimerKind,
        now: Duration,
        delay: Duration,
    ) -> TimerHandle {
        self.push(kind, now + delay, None)
    }

    pub(crate) fn schedule_repeating(
        &mut self,
        kind: TimerKind,
        now: Duration,
        period: Duration,
    ) -> TimerHandle {
        // A zero period would make pop_due spin forever.
        let period = period.max(Duration::from_millis(1));
        self.push(kind, now + period, Some(period))
    }

    fn push(
        &mut self,
        kind: TimerKind,
        deadline: Duration,
        period: Option<Duration>,
    ) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.entries.push(Scheduled {
            handle,
            kind,
            deadline,
            period,
        });
        handle
    }

    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.handle != handle);
        self.entries.len() != before
    }

    /// Cancels whatever the slot holds and leaves it empty.
    pub(crate) fn cancel_slot(&mut self, slot: &mut Option<TimerHandle>) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|entry| entry.handle == handle)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|entry| entry.deadline).min()
    }

    /// Pops the earliest timer due at `now`. Ties go to the timer scheduled
    /// first. Repeating timers stay queued with their next deadline moved past
    /// `now`, so a stalled host sees one firing instead of a burst.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(TimerHandle, TimerKind)> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.deadline <= now)
            .min_by_key(|(_, entry)| (entry.deadline, entry.handle.0))
            .map(|(idx, _)| idx)?;

        let entry = &mut self.entries[idx];
        let fired = (entry.handle, entry.kind);
        match entry.period {
            Some(period) => {
                while entry.deadline <= now {
                    entry.deadline += period;
                }
            }
            None => {
                self.entries.swap_remove(idx);
            }
        }
        Some(fired)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn pops_due_timers_in_deadline_order() {
        let mut timers = TimerQueue::default();
        let late = timers.schedule(TimerKind::HideControls, ms(0), ms(3000));
        let early = timers.schedule(TimerKind::ClearCue, ms(0), ms(500));

        assert_eq!(timers.pop_due(ms(100)), None);
        assert_eq!(timers.pop_due(ms(4000)), Some((early, TimerKind::ClearCue)));
        assert_eq!(timers.pop_due(ms(4000)), Some((late, TimerKind::HideControls)));
        assert_eq!(timers.pop_due(ms(4000)), None);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerQueue::default();
        let mut slot = Some(timers.schedule(TimerKind::SingleTap, ms(0), ms(300)));
        timers.cancel_slot(&mut slot);

        assert!(slot.is_none());
        assert_eq!(timers.pop_due(ms(1000)), None);
        assert_eq!(timers.len(), 0);
    }

    #[test]
    fn handles_are_not_reused_after_cancel() {
        let mut timers = TimerQueue::default();
        let first = timers.schedule(TimerKind::HideControls, ms(0), ms(10));
        timers.cancel(first);
        let second = timers.schedule(TimerKind::HideControls, ms(0), ms(10));

        assert_ne!(first, second);
        assert!(!timers.is_pending(first));
        assert!(timers.is_pending(second));
    }

    #[test]
    fn repeating_timer_skips_missed_periods() {
        let mut timers = TimerQueue::default();
        let handle = timers.schedule_repeating(TimerKind::SaveProgress, ms(0), ms(5000));

        assert_eq!(
            timers.pop_due(ms(17_000)),
            Some((handle, TimerKind::SaveProgress))
        );
        assert_eq!(timers.pop_due(ms(17_000)), None);
        assert_eq!(timers.next_deadline(), Some(ms(20_000)));
        assert!(timers.is_pending(handle));
    }

    #[test]
    fn clear_drops_everything() {
        let mut timers = TimerQueue::default();
        timers.schedule(TimerKind::HideControls, ms(0), ms(10));
        timers.schedule_repeating(TimerKind::SaveProgress, ms(0), ms(10));
        timers.clear();

        assert_eq!(timers.next_deadline(), None);
        assert_eq!(timers.pop_due(ms(100)), None);
    }
}
