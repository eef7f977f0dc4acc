use std::collections::HashMap;
use std::time::Duration;

use super::clamp_seek;
use super::media::{MediaError, MediaEvent, MediaSink};

/// In-process media sink for tests: a playhead with no decoder. It advances
/// against the host's clock while playing and raises the same events a media
/// element would.
///
/// Sources load on the next poll. Their duration comes from a per-URL table
/// or falls back to the nominal duration.
#[derive(Debug)]
pub(crate) struct HeadlessClock {
    nominal_duration: f64,
    durations: HashMap<String, f64>,
    source: Option<String>,
    loading: bool,
    has_data: bool,
    play_requested: bool,
    position: f64,
    duration: f64,
    paused: bool,
    muted: bool,
    fullscreen: bool,
    last_now: Option<Duration>,
    queued: Vec<MediaEvent>,
    block_autoplay: bool,
    deny_fullscreen: bool,
    fail_loads: bool,
}

impl HeadlessClock {
    pub(crate) fn new(nominal_duration: f64) -> Self {
        Self {
            nominal_duration: if nominal_duration.is_finite() && nominal_duration > 0.0 {
                nominal_duration
            } else {
                1.0
            },
            durations: HashMap::new(),
            source: None,
            loading: false,
            has_data: false,
            play_requested: false,
            position: 0.0,
            duration: f64::NAN,
            paused: true,
            muted: false,
            fullscreen: false,
            last_now: None,
            queued: Vec::new(),
            block_autoplay: false,
            deny_fullscreen: false,
            fail_loads: false,
        }
    }

    pub(crate) fn with_duration(mut self, url: &str, secs: f64) -> Self {
        self.durations.insert(url.to_string(), secs);
        self
    }

    pub(crate) fn set_block_autoplay(&mut self, blocked: bool) {
        self.block_autoplay = blocked;
    }

    pub(crate) fn set_deny_fullscreen(&mut self, denied: bool) {
        self.deny_fullscreen = denied;
    }

    pub(crate) fn set_fail_loads(&mut self, fail: bool) {
        self.fail_loads = fail;
    }

    pub(crate) fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.muted
    }

    fn start(&mut self) {
        if !self.paused {
            return;
        }
        if self.position >= self.duration {
            self.position = 0.0;
        }
        self.paused = false;
        self.queued.push(MediaEvent::Play);
    }

    fn finish_loading(&mut self, events: &mut Vec<MediaEvent>) {
        self.loading = false;
        let Some(url) = self.source.as_deref() else {
            return;
        };
        if self.fail_loads {
            events.push(MediaEvent::Error(format!("failed to load {url}")));
            self.play_requested = false;
            return;
        }

        self.duration = self
            .durations
            .get(url)
            .copied()
            .unwrap_or(self.nominal_duration);
        self.has_data = true;
        events.push(MediaEvent::LoadedMetadata);
        events.push(MediaEvent::LoadedData);
        if std::mem::take(&mut self.play_requested) {
            self.start();
        }
    }
}

impl MediaSink for HeadlessClock {
    fn load(&mut self, url: &str) {
        self.source = Some(url.to_string());
        self.loading = true;
        self.has_data = false;
        self.play_requested = false;
        self.position = 0.0;
        self.duration = f64::NAN;
        self.paused = true;
        self.queued.clear();
    }

    fn unload(&mut self) {
        self.source = None;
        self.loading = false;
        self.has_data = false;
        self.play_requested = false;
        self.position = 0.0;
        self.duration = f64::NAN;
        self.paused = true;
        self.queued.clear();
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.block_autoplay {
            return Err(MediaError::PlayRejected("autoplay blocked".to_string()));
        }
        if self.has_data {
            self.start();
        } else {
            self.play_requested = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.play_requested = false;
        if !self.paused {
            self.paused = true;
            self.queued.push(MediaEvent::Pause);
        }
    }

    fn seek(&mut self, secs: f64) {
        if !self.has_data {
            return;
        }
        self.position = clamp_seek(secs, self.duration);
        self.queued.push(MediaEvent::TimeUpdate);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn request_fullscreen(&mut self) -> Result<(), MediaError> {
        if self.deny_fullscreen {
            return Err(MediaError::FullscreenDenied("permission denied".to_string()));
        }
        self.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) {
        self.fullscreen = false;
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_data(&self) -> bool {
        self.has_data
    }

    fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    fn poll_events(&mut self, now: Duration) -> Vec<MediaEvent> {
        let elapsed = self
            .last_now
            .map(|last| now.saturating_sub(last))
            .unwrap_or_default();
        self.last_now = Some(now);

        let mut events = std::mem::take(&mut self.queued);
        if self.loading {
            self.finish_loading(&mut events);
            events.append(&mut self.queued);
            return events;
        }

        if !self.paused && self.has_data {
            self.position = (self.position + elapsed.as_secs_f64()).min(self.duration);
            events.push(MediaEvent::TimeUpdate);
            if self.position >= self.duration {
                self.paused = true;
                events.push(MediaEvent::Pause);
                events.push(MediaEvent::Ended);
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn source_becomes_ready_on_next_poll() {
        let mut clock = HeadlessClock::new(90.0);
        clock.load("https://cdn.example.test/a.mp4");
        assert!(!clock.has_data());
        assert!(clock.duration().is_nan());

        let events = clock.poll_events(secs(0));
        assert_eq!(events, vec![MediaEvent::LoadedMetadata, MediaEvent::LoadedData]);
        assert!(clock.has_data());
        assert_eq!(clock.duration(), 90.0);
    }

    #[test]
    fn playhead_advances_only_while_playing() {
        let mut clock = HeadlessClock::new(90.0);
        clock.load("u");
        clock.poll_events(secs(0));
        clock.play().expect("play should be accepted");

        assert_eq!(clock.poll_events(secs(0)), vec![MediaEvent::Play, MediaEvent::TimeUpdate]);
        clock.poll_events(secs(4));
        assert_eq!(clock.current_time(), 4.0);

        clock.pause();
        assert_eq!(clock.poll_events(secs(10)), vec![MediaEvent::Pause]);
        assert_eq!(clock.current_time(), 4.0);
    }

    #[test]
    fn play_before_ready_starts_once_loaded() {
        let mut clock = HeadlessClock::new(30.0);
        clock.load("u");
        clock.play().expect("pending play should be accepted");

        let events = clock.poll_events(secs(0));
        assert_eq!(
            events,
            vec![MediaEvent::LoadedMetadata, MediaEvent::LoadedData, MediaEvent::Play]
        );
        assert!(!clock.is_paused());
    }

    #[test]
    fn reaching_the_end_pauses_then_ends() {
        let mut clock = HeadlessClock::new(10.0);
        clock.load("u");
        clock.poll_events(secs(0));
        clock.play().expect("play should be accepted");
        clock.poll_events(secs(0));

        let events = clock.poll_events(secs(12));
        assert_eq!(
            events,
            vec![MediaEvent::TimeUpdate, MediaEvent::Pause, MediaEvent::Ended]
        );
        assert_eq!(clock.current_time(), 10.0);
        assert!(clock.is_paused());
    }

    #[test]
    fn per_url_duration_overrides_nominal() {
        let mut clock = HeadlessClock::new(10.0).with_duration("long", 600.0);
        clock.load("long");
        clock.poll_events(secs(0));
        assert_eq!(clock.duration(), 600.0);
    }

    #[test]
    fn seek_is_clamped_and_ignored_before_data() {
        let mut clock = HeadlessClock::new(100.0);
        clock.load("u");
        clock.seek(50.0);
        clock.poll_events(secs(0));
        assert_eq!(clock.current_time(), 0.0);

        clock.seek(500.0);
        assert_eq!(clock.current_time(), 100.0);
        clock.seek(-3.0);
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut clock = HeadlessClock::new(10.0);
        assert_eq!(clock.play(), Err(MediaError::NoSource));

        clock.set_block_autoplay(true);
        clock.set_deny_fullscreen(true);
        clock.load("u");
        clock.poll_events(secs(0));
        assert!(matches!(clock.play(), Err(MediaError::PlayRejected(_))));
        assert!(matches!(
            clock.request_fullscreen(),
            Err(MediaError::FullscreenDenied(_))
        ));
        assert!(!clock.is_fullscreen());

        clock.set_fail_loads(true);
        clock.load("broken");
        let events = clock.poll_events(secs(1));
        assert!(matches!(events.as_slice(), [MediaEvent::Error(_)]));
        assert!(!clock.has_data());
    }
}
