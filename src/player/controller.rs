use std::time::Duration;

use log::{debug, info, warn};

use super::controls::{ControlVisibility, Visibility};
use super::gesture::{
    BarGeometry, Focus, Key, ProgressDrag, Shortcut, Side, TapClassifier, TapOutcome,
    bar_seek_target, shortcut_for, side_for,
};
use super::media::{MediaEvent, MediaSink};
use super::progress::{KeyValueStore, ProgressStore};
use super::quality::{Carryover, list_qualities, pick_default};
use super::timer::{TimerHandle, TimerKind, TimerQueue};
use super::transition::{NextUp, next_index, next_up};
use super::{PlayerSettings, clamp_seek};
use crate::catalog::{Episode, EpisodeSource, VideoQuality};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    Loading,
    Ready,
    NoContent,
}

/// Everything a view needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Snapshot {
    pub(crate) status: SessionStatus,
    pub(crate) episode_id: Option<String>,
    pub(crate) episode_name: Option<String>,
    pub(crate) episode_index: Option<usize>,
    pub(crate) episode_count: usize,
    pub(crate) current_time: f64,
    pub(crate) duration: f64,
    pub(crate) playing: bool,
    pub(crate) muted: bool,
    pub(crate) fullscreen: bool,
    pub(crate) controls: Visibility,
    pub(crate) qualities: Vec<u32>,
    pub(crate) selected_quality: Option<u32>,
    pub(crate) source_url: Option<String>,
    pub(crate) video_available: bool,
    pub(crate) switching_quality: bool,
    pub(crate) next_episode: Option<NextUp>,
    pub(crate) cue: Option<Side>,
    pub(crate) episode_list_open: bool,
    pub(crate) stats_open: bool,
    pub(crate) dragging: bool,
    pub(crate) load_error: Option<String>,
}

impl Snapshot {
    pub(crate) fn controls_visible(&self) -> bool {
        self.controls.is_visible()
    }
}

/// Owns one watch session: the episode list, the selected rendition, the
/// four session timers and the bridge between host input and the media sink.
///
/// Entry points never fail. Media and storage errors are logged and the
/// session carries on in whatever state the sink reports.
pub(crate) struct PlaybackController<S: MediaSink, K: KeyValueStore> {
    settings: PlayerSettings,
    content_id: String,
    sink: S,
    progress: ProgressStore<K>,
    timers: TimerQueue,
    status: SessionStatus,
    episodes: Vec<Episode>,
    current: Option<usize>,
    qualities: Vec<VideoQuality>,
    selected: Option<VideoQuality>,
    controls: ControlVisibility,
    taps: TapClassifier,
    drag: ProgressDrag,
    save_timer: Option<TimerHandle>,
    cue_timer: Option<TimerHandle>,
    cue: Option<Side>,
    carryover: Option<Carryover>,
    pending_load: bool,
    playing: bool,
    muted: bool,
    current_time: f64,
    duration: f64,
    episode_list_open: bool,
    stats_open: bool,
    scroll_to_top: bool,
    load_error: Option<String>,
    torn_down: bool,
}

impl<S: MediaSink, K: KeyValueStore> PlaybackController<S, K> {
    pub(crate) fn new(content_id: &str, sink: S, store: K, settings: PlayerSettings) -> Self {
        Self {
            settings,
            content_id: content_id.to_string(),
            sink,
            progress: ProgressStore::new(
                store,
                settings.min_progress_secs,
                settings.end_threshold_secs,
            ),
            timers: TimerQueue::default(),
            status: SessionStatus::Loading,
            episodes: Vec::new(),
            current: None,
            qualities: Vec::new(),
            selected: None,
            controls: ControlVisibility::default(),
            taps: TapClassifier::default(),
            drag: ProgressDrag::default(),
            save_timer: None,
            cue_timer: None,
            cue: None,
            carryover: None,
            pending_load: false,
            playing: false,
            muted: false,
            current_time: 0.0,
            duration: f64::NAN,
            episode_list_open: false,
            stats_open: false,
            scroll_to_top: false,
            load_error: None,
            torn_down: false,
        }
    }

    /// Fetches the episode list itself and opens the session on it. The
    /// fetch is not retried; an empty result ends in `NoContent`.
    pub(crate) fn load_episodes(
        &mut self,
        source: &impl EpisodeSource,
        initial_episode: Option<&str>,
        now: Duration,
    ) {
        let episodes = source.fetch_episodes(&self.content_id);
        self.open(episodes, initial_episode, now);
    }

    /// Starts the session on a pre-fetched list. An unknown or missing
    /// initial episode falls back to the first one.
    pub(crate) fn open(
        &mut self,
        episodes: Vec<Episode>,
        initial_episode: Option<&str>,
        now: Duration,
    ) {
        if self.torn_down {
            return;
        }
        self.episodes = episodes;
        if self.episodes.is_empty() {
            info!("no episodes available for {}", self.content_id);
            self.status = SessionStatus::NoContent;
            self.current = None;
            self.sink.unload();
            return;
        }

        let index = match initial_episode {
            Some(id) => self.index_of(id).unwrap_or_else(|| {
                warn!("episode {id} not found in {}, starting from the first", self.content_id);
                0
            }),
            None => 0,
        };

        self.status = SessionStatus::Ready;
        self.timers.cancel_slot(&mut self.save_timer);
        self.save_timer = Some(self.timers.schedule_repeating(
            TimerKind::SaveProgress,
            now,
            self.settings.save_interval,
        ));
        info!(
            "opened {} with {} episode(s)",
            self.content_id,
            self.episodes.len()
        );
        self.enter_episode(index, now);
    }

    /// Drains sink events, then fires every timer due at `now`.
    pub(crate) fn pump(&mut self, now: Duration) {
        if self.torn_down {
            return;
        }
        for event in self.sink.poll_events(now) {
            self.handle_media_event(event, now);
        }
        self.run_due_timers(now);
    }

    pub(crate) fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    fn handle_media_event(&mut self, event: MediaEvent, now: Duration) {
        match event {
            MediaEvent::TimeUpdate => self.sync_time(),
            MediaEvent::LoadedMetadata => self.duration = self.sink.duration(),
            MediaEvent::LoadedData => self.restore(now),
            MediaEvent::Play => {
                self.playing = true;
                self.load_error = None;
                self.controls
                    .on_play(&mut self.timers, now, self.settings.controls_timeout);
            }
            MediaEvent::Pause => {
                self.playing = false;
                self.controls.pin(&mut self.timers);
                self.save_progress();
            }
            MediaEvent::Ended => {
                self.playing = false;
                self.advance(now);
            }
            MediaEvent::Error(message) => {
                warn!("media error: {message}");
                self.playing = false;
                self.pending_load = false;
                self.load_error = Some(message);
                self.controls.show(&mut self.timers);
            }
        }
    }

    fn run_due_timers(&mut self, now: Duration) {
        while let Some((handle, kind)) = self.timers.pop_due(now) {
            match kind {
                TimerKind::HideControls => {
                    self.controls.on_timer(handle, self.playing);
                }
                TimerKind::SaveProgress => {
                    if self.save_timer == Some(handle) {
                        self.save_progress();
                    }
                }
                TimerKind::ClearCue => {
                    if self.cue_timer == Some(handle) {
                        self.cue_timer = None;
                        self.cue = None;
                    }
                }
                TimerKind::SingleTap => {
                    if self.taps.on_timer(handle) {
                        self.toggle_play();
                        self.reveal_controls(now);
                    }
                }
            }
        }
    }

    fn sync_time(&mut self) {
        self.current_time = self.sink.current_time();
        self.duration = self.sink.duration();
    }

    fn index_of(&self, chapter_id: &str) -> Option<usize> {
        self.episodes
            .iter()
            .position(|episode| episode.chapter_id == chapter_id)
    }

    fn current_episode(&self) -> Option<&Episode> {
        self.current.and_then(|index| self.episodes.get(index))
    }

    /// Resets per-episode state and loads the default rendition.
    fn enter_episode(&mut self, index: usize, now: Duration) {
        self.taps.reset(&mut self.timers);
        self.timers.cancel_slot(&mut self.cue_timer);
        self.cue = None;
        self.drag.end();
        self.carryover = None;
        self.load_error = None;
        self.current = Some(index);
        self.playing = false;
        self.current_time = 0.0;
        self.duration = f64::NAN;
        self.controls.hide_now(&mut self.timers);

        let episode = &self.episodes[index];
        self.qualities = list_qualities(episode);
        self.selected = pick_default(
            &self.qualities,
            self.progress.preferred_quality(),
            self.settings.default_quality,
        );
        info!(
            "entering episode {} of {} ({:?})",
            episode.chapter_id,
            self.content_id,
            self.selected.as_ref().map(|q| q.quality)
        );

        match self.selected.clone() {
            Some(quality) => self.load_source(&quality.video_path, now),
            None => {
                self.sink.unload();
                self.pending_load = false;
                self.controls.show(&mut self.timers);
            }
        }
    }

    fn load_source(&mut self, url: &str, now: Duration) {
        self.sink.load(url);
        self.pending_load = true;
        if self.sink.has_data() {
            self.restore(now);
        }
    }

    /// Runs once the new source can seek: a pending quality carryover wins,
    /// then the stored record, then the start. Plays afterwards unless the
    /// carryover says playback was paused.
    fn restore(&mut self, now: Duration) {
        if !self.pending_load {
            return;
        }
        self.pending_load = false;
        self.duration = self.sink.duration();

        let resume = match self.carryover.take() {
            Some(carryover) => {
                if carryover.saved_time > 0.0 {
                    self.sink
                        .seek(clamp_seek(carryover.saved_time, self.duration));
                }
                carryover.was_playing
            }
            None => {
                let stored = self.current_episode().and_then(|episode| {
                    self.progress
                        .resume_position(&self.content_id, &episode.chapter_id, self.duration)
                });
                if let Some(position) = stored {
                    debug!("resuming at {position}s");
                    self.sink.seek(position);
                }
                true
            }
        };

        self.current_time = self.sink.current_time();
        if resume {
            self.start_playback(now);
        } else {
            self.controls.show(&mut self.timers);
        }
    }

    fn start_playback(&mut self, now: Duration) {
        if let Err(err) = self.sink.play() {
            debug!("playback did not start: {err}");
            self.controls
                .show_temporarily(&mut self.timers, now, false, self.settings.controls_timeout);
        }
    }

    /// Writes the resume position for the current episode when it is worth
    /// keeping. Does nothing while a source is still loading.
    pub(crate) fn save_progress(&mut self) -> bool {
        if self.pending_load || !self.sink.is_attached() {
            return false;
        }
        let Some(index) = self.current else {
            return false;
        };
        let time = self.sink.current_time();
        let duration = self.sink.duration();
        let episode_id = self.episodes[index].chapter_id.clone();
        self.progress
            .save(&self.content_id, &episode_id, time, duration)
    }

    fn advance(&mut self, now: Duration) {
        let Some(current) = self.current else {
            return;
        };
        match next_index(&self.episodes, current) {
            Some(next) => {
                info!("episode finished, advancing to #{}", next + 1);
                self.enter_episode(next, now);
                self.episode_list_open = false;
                self.scroll_to_top = true;
            }
            None => {
                info!("last episode of {} finished", self.content_id);
                self.controls.show(&mut self.timers);
            }
        }
    }

    /// Switches to another episode by id, flushing progress of the one being
    /// left. Returns false for an unknown id.
    pub(crate) fn select_episode(&mut self, chapter_id: &str, now: Duration) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(index) = self.index_of(chapter_id) else {
            warn!("episode {chapter_id} is not part of {}", self.content_id);
            return false;
        };

        if self.current != Some(index) {
            self.save_progress();
            self.enter_episode(index, now);
        }
        self.episode_list_open = false;
        self.scroll_to_top = true;
        true
    }

    pub(crate) fn select_next(&mut self, now: Duration) -> bool {
        let next = self
            .current
            .and_then(|current| next_index(&self.episodes, current))
            .map(|index| self.episodes[index].chapter_id.clone());
        match next {
            Some(chapter_id) => self.select_episode(&chapter_id, now),
            None => false,
        }
    }

    /// Swaps to another rendition of the current episode. Position and play
    /// state are carried over once the new source is ready.
    pub(crate) fn change_quality(&mut self, tier: u32, now: Duration) -> bool {
        if self.torn_down || self.selected.as_ref().map(|q| q.quality) == Some(tier) {
            return false;
        }
        let Some(quality) = self.qualities.iter().find(|q| q.quality == tier).cloned() else {
            warn!("quality {tier} is not offered for this episode");
            return false;
        };

        // A switch during a switch keeps the first capture. Before the first
        // source has data there is nothing to carry; the new source resumes
        // from the stored record and autoplays.
        self.carryover = match self.carryover.take() {
            Some(first) => Some(first),
            None if self.pending_load => None,
            None => Some(Carryover {
                saved_time: self.sink.current_time(),
                was_playing: self.playing,
            }),
        };
        self.progress.set_preferred_quality(tier);
        self.controls.hide_now(&mut self.timers);
        self.playing = false;
        self.load_error = None;
        match self.carryover {
            Some(carryover) => info!("switching to {tier}p at {}s", carryover.saved_time),
            None => info!("switching to {tier}p before the first source loaded"),
        }

        self.selected = Some(quality.clone());
        self.load_source(&quality.video_path, now);
        true
    }

    pub(crate) fn toggle_play(&mut self) {
        if self.torn_down {
            return;
        }
        if self.sink.is_paused() {
            if let Err(err) = self.sink.play() {
                debug!("play request failed: {err}");
            }
        } else {
            self.sink.pause();
        }
    }

    pub(crate) fn toggle_mute(&mut self) {
        if self.torn_down {
            return;
        }
        self.muted = !self.muted;
        self.sink.set_muted(self.muted);
    }

    pub(crate) fn toggle_fullscreen(&mut self) {
        if self.torn_down {
            return;
        }
        if self.sink.is_fullscreen() {
            self.sink.exit_fullscreen();
        } else if let Err(err) = self.sink.request_fullscreen() {
            debug!("fullscreen unavailable: {err}");
        }
    }

    pub(crate) fn seek(&mut self, secs: f64) {
        self.apply_seek(secs);
    }

    /// Returns false when there is nothing to seek in yet.
    fn apply_seek(&mut self, secs: f64) -> bool {
        if self.torn_down || !self.sink.is_attached() || !self.sink.has_data() {
            return false;
        }
        self.sink.seek(clamp_seek(secs, self.sink.duration()));
        self.current_time = self.sink.current_time();
        true
    }

    fn seek_by(&mut self, delta: f64) -> bool {
        let target = self.sink.current_time() + delta;
        self.apply_seek(target)
    }

    fn show_cue(&mut self, side: Side, now: Duration) {
        self.timers.cancel_slot(&mut self.cue_timer);
        self.cue = Some(side);
        self.cue_timer = Some(
            self.timers
                .schedule(TimerKind::ClearCue, now, self.settings.cue_duration),
        );
    }

    fn reveal_controls(&mut self, now: Duration) {
        self.controls.show_temporarily(
            &mut self.timers,
            now,
            self.playing,
            self.settings.controls_timeout,
        );
    }

    /// Seeks one step toward `side`, flashes the side cue and resumes
    /// playback if the sink is paused.
    pub(crate) fn double_tap(&mut self, side: Side, now: Duration) {
        if self.torn_down || !self.sink.is_attached() {
            return;
        }
        self.taps.reset(&mut self.timers);
        let step = self.settings.seek_step_secs;
        let delta = match side {
            Side::Left => -step,
            Side::Right => step,
        };
        if self.seek_by(delta) {
            self.show_cue(side, now);
        }
        if self.sink.is_paused()
            && let Err(err) = self.sink.play()
        {
            debug!("resume after double tap failed: {err}");
        }
    }

    /// A tap on the video surface `width` wide at horizontal offset `x`.
    pub(crate) fn tap(&mut self, x: f64, width: f64, now: Duration) {
        if self.torn_down || self.status != SessionStatus::Ready {
            return;
        }
        self.run_due_timers(now);
        match self
            .taps
            .register(now, self.settings.double_tap_window, &mut self.timers)
        {
            TapOutcome::SingleDeferred => {}
            TapOutcome::Double => self.double_tap(side_for(x, width), now),
        }
    }

    /// Applies a keyboard shortcut. Returns whether the key was consumed.
    pub(crate) fn handle_key(&mut self, key: Key, focus: Focus, now: Duration) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(shortcut) = shortcut_for(key, focus) else {
            return false;
        };
        let step = self.settings.seek_step_secs;
        match shortcut {
            Shortcut::TogglePlay => {
                self.toggle_play();
                self.reveal_controls(now);
            }
            Shortcut::SeekBackward => {
                if self.seek_by(-step) {
                    self.show_cue(Side::Left, now);
                }
                self.reveal_controls(now);
            }
            Shortcut::SeekForward => {
                if self.seek_by(step) {
                    self.show_cue(Side::Right, now);
                }
                self.reveal_controls(now);
            }
            Shortcut::Fullscreen => self.toggle_fullscreen(),
            Shortcut::Mute => self.toggle_mute(),
            Shortcut::Stats => self.toggle_stats(),
        }
        true
    }

    /// Pointer over the video or the progress bar. Controls stay visible
    /// until [`Self::pointer_leave`].
    pub(crate) fn pointer_enter(&mut self) {
        if !self.torn_down {
            self.controls.pointer_enter(&mut self.timers);
        }
    }

    pub(crate) fn pointer_leave(&mut self, now: Duration) {
        if !self.torn_down {
            self.controls.pointer_leave(
                &mut self.timers,
                now,
                self.playing,
                self.settings.pointer_leave_hide,
            );
        }
    }

    pub(crate) fn drag_begin(&mut self, x: f64, bar: BarGeometry) {
        if self.torn_down {
            return;
        }
        self.drag.begin();
        self.controls.show(&mut self.timers);
        self.seek_to_bar(x, bar);
    }

    pub(crate) fn drag_move(&mut self, x: f64, bar: BarGeometry) {
        if !self.torn_down && self.drag.is_captured() {
            self.seek_to_bar(x, bar);
        }
    }

    pub(crate) fn drag_end(&mut self, now: Duration) {
        if self.drag.end() && !self.torn_down {
            self.reveal_controls(now);
        }
    }

    fn seek_to_bar(&mut self, x: f64, bar: BarGeometry) {
        if let Some(target) = bar_seek_target(x, bar, self.sink.duration()) {
            self.seek(target);
        }
    }

    pub(crate) fn toggle_episode_list(&mut self) {
        self.episode_list_open = !self.episode_list_open;
    }

    pub(crate) fn toggle_stats(&mut self) {
        self.stats_open = !self.stats_open;
    }

    /// Hands the pending scroll-to-top request to the view, once.
    pub(crate) fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_top)
    }

    pub(crate) fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &K {
        self.progress.store()
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(test)]
    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut K {
        self.progress.store_mut()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let episode = self.current_episode();
        let next_episode = self.current.and_then(|index| {
            next_up(
                &self.episodes,
                index,
                self.current_time,
                self.duration,
                self.settings.end_threshold_secs,
            )
        });

        Snapshot {
            status: self.status,
            episode_id: episode.map(|ep| ep.chapter_id.clone()),
            episode_name: episode.map(Episode::display_name),
            episode_index: self.current,
            episode_count: self.episodes.len(),
            current_time: self.current_time,
            duration: self.duration,
            playing: self.playing,
            muted: self.muted,
            fullscreen: self.sink.is_fullscreen(),
            controls: self.controls.state(),
            qualities: self.qualities.iter().map(|q| q.quality).collect(),
            selected_quality: self.selected.as_ref().map(|q| q.quality),
            source_url: self.selected.as_ref().map(|q| q.video_path.clone()),
            video_available: self.selected.is_some(),
            switching_quality: self.carryover.is_some(),
            next_episode,
            cue: self.cue,
            episode_list_open: self.episode_list_open,
            stats_open: self.stats_open,
            dragging: self.drag.is_captured(),
            load_error: self.load_error.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Flushes progress and cancels every timer. Later input is ignored.
    pub(crate) fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.save_progress();
        self.controls.cancel(&mut self.timers);
        self.taps.reset(&mut self.timers);
        self.timers.cancel_slot(&mut self.save_timer);
        self.timers.cancel_slot(&mut self.cue_timer);
        self.timers.clear();
        self.torn_down = true;
        info!("closed session for {}", self.content_id);
    }
}

impl<S: MediaSink, K: KeyValueStore> Drop for PlaybackController<S, K> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::episode;
    use crate::player::{HeadlessClock, MemoryStore, PREFERRED_QUALITY_KEY};

    type Controller = PlaybackController<HeadlessClock, MemoryStore>;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    fn controller(store: MemoryStore, duration: f64) -> Controller {
        PlaybackController::new(
            "c",
            HeadlessClock::new(duration),
            store,
            PlayerSettings::default(),
        )
    }

    /// Opens the list and pumps until the first episode is playing.
    fn playing(store: MemoryStore, duration: f64, episodes: Vec<Episode>) -> Controller {
        let mut player = controller(store, duration);
        player.open(episodes, None, ms(0));
        player.pump(ms(0));
        player.pump(ms(0));
        assert!(player.snapshot().playing);
        player
    }

    #[test]
    fn empty_list_is_no_content() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(Vec::new(), None, ms(0));

        let snapshot = player.snapshot();
        assert_eq!(snapshot.status, SessionStatus::NoContent);
        assert_eq!(snapshot.episode_id, None);
        assert_eq!(player.next_deadline(), None);
    }

    #[test]
    fn open_selects_initial_episode_and_default_quality() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(
            vec![
                episode("1", "EP 1", &[480, 720, 1080]),
                episode("2", "EP 2", &[480, 720]),
            ],
            Some("2"),
            ms(0),
        );

        let snapshot = player.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.episode_id.as_deref(), Some("2"));
        assert_eq!(snapshot.qualities, vec![720, 480]);
        assert_eq!(snapshot.selected_quality, Some(720));
        assert_eq!(snapshot.controls, Visibility::Hidden);
        assert!(!snapshot.playing);
    }

    #[test]
    fn unknown_initial_episode_starts_at_first() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(vec![episode("1", "EP 1", &[720])], Some("99"), ms(0));
        assert_eq!(player.snapshot().episode_id.as_deref(), Some("1"));
    }

    #[test]
    fn playing_is_reported_only_after_sink_confirms() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(vec![episode("1", "EP 1", &[720])], None, ms(0));
        assert!(!player.snapshot().playing);

        player.pump(ms(0));
        assert!(!player.snapshot().playing);
        player.pump(ms(0));
        assert!(player.snapshot().playing);
    }

    #[test]
    fn autoplay_rejection_leaves_session_paused_with_controls() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.sink_mut().set_block_autoplay(true);
        player.open(vec![episode("1", "EP 1", &[720])], None, ms(0));
        player.pump(ms(0));
        player.pump(ms(100));

        let snapshot = player.snapshot();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.controls, Visibility::VisiblePinned);
    }

    #[test]
    fn stored_progress_is_applied_on_ready() {
        let store = MemoryStore::default().with_entry("progress_c_1", "120");
        let player = playing(store, 600.0, vec![episode("1", "EP 1", &[720])]);
        assert_eq!(player.sink().current_time(), 120.0);
        assert_eq!(player.snapshot().current_time, 120.0);
    }

    #[test]
    fn out_of_bounds_progress_is_ignored() {
        let store = MemoryStore::default().with_entry("progress_c_1", "595");
        let player = playing(store, 600.0, vec![episode("1", "EP 1", &[720])]);
        assert_eq!(player.sink().current_time(), 0.0);
    }

    #[test]
    fn periodic_save_writes_inside_bounds() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(4));
        assert_eq!(player.store().value("progress_c_1"), None);

        player.pump(secs(10));
        assert_eq!(player.store().value("progress_c_1"), Some("10"));
    }

    #[test]
    fn pause_flushes_progress_and_pins_controls() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(ms(7_500));
        player.toggle_play();
        player.pump(ms(7_500));

        let snapshot = player.snapshot();
        assert!(!snapshot.playing);
        assert_eq!(snapshot.controls, Visibility::VisiblePinned);
        assert_eq!(player.store().value("progress_c_1"), Some("7.5"));
    }

    #[test]
    fn carryover_wins_over_stored_record_and_clears() {
        let store = MemoryStore::default()
            .with_entry("progress_c_1", "100")
            .with_entry(PREFERRED_QUALITY_KEY, "480");
        let mut player = playing(store, 600.0, vec![episode("1", "EP 1", &[480, 1080])]);
        assert_eq!(player.sink().current_time(), 100.0);

        player.seek(42.0);
        assert!(player.change_quality(1080, ms(0)));
        assert!(player.snapshot().switching_quality);

        player.pump(ms(0));
        assert_eq!(player.sink().current_time(), 42.0);
        assert!(!player.snapshot().switching_quality);
    }

    #[test]
    fn quality_switch_resumes_position_and_playback() {
        let store = MemoryStore::default().with_entry(PREFERRED_QUALITY_KEY, "480");
        let mut player = playing(store, 600.0, vec![episode("1", "EP 1", &[480, 1080])]);
        assert_eq!(player.snapshot().selected_quality, Some(480));

        player.pump(secs(60));
        assert_eq!(player.sink().current_time(), 60.0);

        assert!(player.change_quality(1080, secs(60)));
        let switching = player.snapshot();
        assert!(!switching.playing);
        assert_eq!(switching.controls, Visibility::Hidden);
        assert_eq!(switching.selected_quality, Some(1080));
        assert_eq!(player.store().value(PREFERRED_QUALITY_KEY), Some("1080"));
        assert_eq!(
            player.sink().source(),
            Some("https://cdn.example.test/1/1080.mp4")
        );

        player.pump(secs(60));
        assert_eq!(player.sink().current_time(), 60.0);
        player.pump(secs(60));
        assert!(player.snapshot().playing);
    }

    #[test]
    fn paused_quality_switch_stays_paused() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[480, 720])],
        );
        player.pump(secs(30));
        player.toggle_play();
        player.pump(secs(30));

        player.change_quality(480, secs(31));
        player.pump(secs(31));
        player.pump(secs(32));
        assert_eq!(player.sink().current_time(), 30.0);
        assert!(!player.snapshot().playing);
        assert!(player.snapshot().controls_visible());
    }

    #[test]
    fn switch_before_first_load_resumes_stored_record_and_autoplays() {
        let store = MemoryStore::default().with_entry("progress_c_1", "120");
        let mut player = controller(store, 600.0);
        player.open(vec![episode("1", "EP 1", &[480, 720])], None, ms(0));
        assert!(player.change_quality(480, ms(0)));
        assert!(!player.snapshot().switching_quality);

        player.pump(ms(0));
        player.pump(ms(0));
        let snapshot = player.snapshot();
        assert!(snapshot.playing);
        assert_eq!(snapshot.selected_quality, Some(480));
        assert_eq!(player.sink().current_time(), 120.0);
    }

    #[test]
    fn arrow_keys_show_cue_only_when_seek_applies() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(vec![episode("1", "EP 1", &[720])], None, ms(0));
        assert!(player.handle_key(Key::Right, Focus::Player, ms(0)));
        assert_eq!(player.snapshot().cue, None);

        player.pump(ms(0));
        player.pump(secs(20));
        assert!(player.handle_key(Key::Left, Focus::Player, secs(20)));
        assert_eq!(player.snapshot().cue, Some(Side::Left));
        assert_eq!(player.sink().current_time(), 15.0);
    }

    #[test]
    fn selecting_current_quality_is_noop() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        assert!(!player.change_quality(720, ms(0)));
        assert!(!player.change_quality(1080, ms(0)));
        assert_eq!(player.store().value(PREFERRED_QUALITY_KEY), None);
    }

    #[test]
    fn failed_source_does_not_report_playing() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[480, 720])],
        );
        player.sink_mut().set_fail_loads(true);
        player.change_quality(480, ms(0));
        player.pump(ms(100));
        player.pump(ms(200));

        let snapshot = player.snapshot();
        assert!(!snapshot.playing);
        assert!(snapshot.load_error.is_some());
        assert!(snapshot.controls_visible());
    }

    #[test]
    fn missing_renditions_mark_video_unavailable() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.open(vec![episode("1", "EP 1", &[])], None, ms(0));
        player.pump(ms(0));

        let snapshot = player.snapshot();
        assert!(!snapshot.video_available);
        assert_eq!(snapshot.selected_quality, None);
        assert!(snapshot.qualities.is_empty());
        assert!(!player.save_progress());
    }

    #[test]
    fn ended_advances_without_saving() {
        let mut player = playing(
            MemoryStore::default(),
            30.0,
            vec![episode("1", "EP 1", &[720]), episode("2", "EP 2", &[720])],
        );
        player.pump(secs(22));
        let banner = player.snapshot().next_episode.expect("next banner near the end");
        assert_eq!(banner.chapter_id, "2");
        assert_eq!(banner.countdown_secs, 8);
        let writes = player.store().writes();

        player.pump(secs(31));
        let snapshot = player.snapshot();
        assert_eq!(snapshot.episode_id.as_deref(), Some("2"));
        assert_eq!(snapshot.current_time, 0.0);
        assert_eq!(snapshot.next_episode, None);
        assert_eq!(player.store().writes(), writes);
        assert!(player.take_scroll_request());

        player.pump(secs(31));
        player.pump(secs(31));
        assert!(player.snapshot().playing);
        assert_eq!(player.snapshot().controls, Visibility::Hidden);
    }

    #[test]
    fn last_episode_end_is_terminal() {
        let mut player = playing(
            MemoryStore::default(),
            20.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(15));
        assert_eq!(player.snapshot().next_episode, None);

        player.pump(secs(25));
        let snapshot = player.snapshot();
        assert_eq!(snapshot.episode_id.as_deref(), Some("1"));
        assert!(!snapshot.playing);
        assert_eq!(snapshot.controls, Visibility::VisiblePinned);
    }

    #[test]
    fn affordance_turns_off_after_seeking_back() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720]), episode("2", "EP 2", &[720])],
        );
        player.seek(595.0);
        assert!(player.snapshot().next_episode.is_some());
        player.seek(500.0);
        assert!(player.snapshot().next_episode.is_none());
    }

    #[test]
    fn explicit_selection_flushes_and_resets() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720]), episode("2", "EP 2", &[720])],
        );
        player.toggle_episode_list();
        player.pump(secs(3));
        player.seek(50.0);

        assert!(player.select_episode("2", secs(3)));
        assert_eq!(player.store().value("progress_c_1"), Some("50"));
        let snapshot = player.snapshot();
        assert_eq!(snapshot.episode_id.as_deref(), Some("2"));
        assert!(!snapshot.episode_list_open);
        assert!(!snapshot.playing);
        assert_eq!(snapshot.current_time, 0.0);
        assert!(player.take_scroll_request());
        assert!(!player.take_scroll_request());

        assert!(!player.select_episode("nope", secs(3)));
    }

    #[test]
    fn next_shortcut_selects_following_episode() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720]), episode("2", "EP 2", &[720])],
        );
        assert!(player.select_next(ms(10)));
        assert_eq!(player.snapshot().episode_id.as_deref(), Some("2"));
        assert!(!player.select_next(ms(20)));
    }

    #[test]
    fn quick_taps_make_one_double_and_no_single() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(10));
        player.tap(80.0, 100.0, secs(10));
        player.tap(80.0, 100.0, secs(10) + ms(150));
        assert_eq!(player.sink().current_time(), 15.0);

        player.pump(secs(11));
        assert!(!player.sink().is_paused());
        assert!(player.snapshot().playing);
    }

    #[test]
    fn slow_taps_are_two_singles() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.tap(20.0, 100.0, secs(1));
        player.pump(secs(1) + ms(300));
        assert!(player.sink().is_paused());

        player.tap(20.0, 100.0, secs(1) + ms(500));
        player.pump(secs(1) + ms(800));
        assert!(!player.sink().is_paused());
    }

    #[test]
    fn double_tap_right_seeks_and_shows_cue() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(10));
        player.toggle_play();
        player.pump(secs(10));
        assert!(player.sink().is_paused());
        assert_eq!(player.sink().current_time(), 10.0);

        player.double_tap(Side::Right, secs(10));
        assert_eq!(player.sink().current_time(), 15.0);
        assert_eq!(player.snapshot().cue, Some(Side::Right));
        assert!(!player.sink().is_paused());

        player.pump(secs(10) + ms(499));
        assert_eq!(player.snapshot().cue, Some(Side::Right));
        player.pump(secs(10) + ms(500));
        assert_eq!(player.snapshot().cue, None);
    }

    #[test]
    fn double_tap_left_clamps_at_zero() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(2));
        player.double_tap(Side::Left, secs(2));
        assert_eq!(player.sink().current_time(), 0.0);
        assert_eq!(player.snapshot().cue, Some(Side::Left));
    }

    #[test]
    fn seek_is_clamped() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.seek(700.0);
        assert_eq!(player.sink().current_time(), 600.0);
        player.seek(-10.0);
        assert_eq!(player.sink().current_time(), 0.0);
        player.seek(f64::NAN);
        assert_eq!(player.sink().current_time(), 0.0);
    }

    #[test]
    fn keyboard_shortcuts_drive_playback() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.seek(100.0);

        assert!(player.handle_key(Key::Right, Focus::Player, secs(1)));
        assert_eq!(player.sink().current_time(), 105.0);
        assert_eq!(player.snapshot().cue, Some(Side::Right));
        assert_eq!(player.snapshot().controls, Visibility::VisibleTimed);

        assert!(player.handle_key(Key::Char('M'), Focus::Player, secs(1)));
        assert!(player.snapshot().muted);
        assert!(player.sink().is_muted());

        assert!(player.handle_key(Key::Char('f'), Focus::Player, secs(1)));
        assert!(player.snapshot().fullscreen);

        assert!(player.handle_key(Key::Space, Focus::Player, secs(1)));
        player.pump(secs(1));
        assert!(!player.snapshot().playing);

        assert!(player.handle_key(Key::Char('i'), Focus::Player, secs(1)));
        assert!(player.snapshot().stats_open);
    }

    #[test]
    fn shortcuts_ignored_in_text_input() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        assert!(!player.handle_key(Key::Char('k'), Focus::TextInput, secs(1)));
        assert!(!player.handle_key(Key::Left, Focus::TextInput, secs(1)));
        player.pump(secs(1));
        assert!(player.snapshot().playing);
    }

    #[test]
    fn denied_fullscreen_is_swallowed() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.sink_mut().set_deny_fullscreen(true);
        player.toggle_fullscreen();
        assert!(!player.snapshot().fullscreen);
    }

    #[test]
    fn revealed_controls_hide_after_timeout_while_playing() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.handle_key(Key::Right, Focus::Player, secs(1));
        assert_eq!(player.snapshot().controls, Visibility::VisibleTimed);
        player.pump(secs(3));
        assert!(player.snapshot().controls_visible());
        player.pump(secs(4));
        assert_eq!(player.snapshot().controls, Visibility::Hidden);
    }

    #[test]
    fn hovered_controls_stay_visible_while_playing() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pointer_enter();
        player.pump(ms(4_500));
        assert!(player.snapshot().playing);
        assert_eq!(player.snapshot().controls, Visibility::VisiblePinned);

        player.handle_key(Key::Right, Focus::Player, ms(4_500));
        player.pump(secs(10));
        assert_eq!(player.snapshot().controls, Visibility::VisiblePinned);

        player.pointer_leave(secs(10));
        player.pump(secs(10) + ms(500));
        assert_eq!(player.snapshot().controls, Visibility::Hidden);
    }

    #[test]
    fn pointer_leave_hides_quickly() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pointer_enter();
        player.pointer_leave(secs(1));
        player.pump(secs(1) + ms(500));
        assert_eq!(player.snapshot().controls, Visibility::Hidden);
    }

    #[test]
    fn progress_drag_seeks_until_release() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        let bar = BarGeometry {
            left: 10.0,
            width: 100.0,
        };
        player.drag_begin(60.0, bar);
        assert!(player.snapshot().dragging);
        assert_eq!(player.sink().current_time(), 300.0);

        player.drag_move(500.0, bar);
        assert_eq!(player.sink().current_time(), 600.0);

        player.drag_end(secs(1));
        assert!(!player.snapshot().dragging);
        player.drag_move(10.0, bar);
        assert_eq!(player.sink().current_time(), 600.0);
    }

    #[test]
    fn unavailable_storage_does_not_stop_playback() {
        let mut player = controller(MemoryStore::default(), 600.0);
        player.store_mut().set_unavailable(true);
        player.open(vec![episode("1", "EP 1", &[480, 720])], None, ms(0));
        player.pump(ms(0));
        player.pump(ms(0));
        assert!(player.snapshot().playing);

        player.pump(secs(20));
        assert!(player.change_quality(480, secs(20)));
        player.pump(secs(20));
        player.pump(secs(20));
        assert!(player.snapshot().playing);
        assert_eq!(player.sink().current_time(), 20.0);
    }

    #[test]
    fn teardown_flushes_and_silences_session() {
        let mut player = playing(
            MemoryStore::default(),
            600.0,
            vec![episode("1", "EP 1", &[720])],
        );
        player.pump(secs(33));
        player.pointer_enter();
        player.pointer_leave(secs(33));
        player.teardown();

        assert!(player.is_torn_down());
        assert_eq!(player.store().value("progress_c_1"), Some("33"));
        assert_eq!(player.next_deadline(), None);

        player.pump(secs(40));
        player.tap(10.0, 100.0, secs(40));
        assert!(!player.handle_key(Key::Space, Focus::Player, secs(40)));
        assert!(!player.select_episode("1", secs(40)));
        assert_eq!(player.snapshot().controls, Visibility::VisibleTimed);
    }

    #[test]
    fn fetches_episodes_when_none_supplied() {
        struct Fixed(Vec<Episode>);
        impl EpisodeSource for Fixed {
            fn fetch_episodes(&self, _content_id: &str) -> Vec<Episode> {
                self.0.clone()
            }
        }

        let mut player = controller(MemoryStore::default(), 600.0);
        player.load_episodes(&Fixed(vec![episode("1", "EP 1", &[720])]), None, ms(0));
        assert_eq!(player.snapshot().status, SessionStatus::Ready);

        let mut empty = controller(MemoryStore::default(), 600.0);
        empty.load_episodes(&Fixed(Vec::new()), None, ms(0));
        assert_eq!(empty.snapshot().status, SessionStatus::NoContent);
    }
}
