use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MediaError {
    #[error("no source attached")]
    NoSource,
    #[error("playback start rejected: {0}")]
    PlayRejected(String),
    #[error("fullscreen request denied: {0}")]
    FullscreenDenied(String),
}

/// Signals a media element raises on its own.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MediaEvent {
    TimeUpdate,
    Play,
    Pause,
    Ended,
    LoadedMetadata,
    LoadedData,
    Error(String),
}

/// The one media element a session drives: commands go in, events come out
/// through [`MediaSink::poll_events`].
///
/// `play` succeeding only means the request was accepted. The controller
/// treats playback as started once a [`MediaEvent::Play`] arrives.
pub(crate) trait MediaSink {
    fn load(&mut self, url: &str);
    fn unload(&mut self);
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn seek(&mut self, secs: f64);
    fn set_muted(&mut self, muted: bool);
    fn request_fullscreen(&mut self) -> Result<(), MediaError>;
    fn exit_fullscreen(&mut self);
    fn is_fullscreen(&self) -> bool;
    fn current_time(&self) -> f64;
    /// `NaN` or 0 until metadata is known.
    fn duration(&self) -> f64;
    fn is_paused(&self) -> bool;
    /// True once the current source can seek meaningfully.
    fn has_data(&self) -> bool;
    fn is_attached(&self) -> bool;
    /// Drains events raised since the previous call. `now` is the host's
    /// monotonic clock; sinks that keep their own time may ignore it.
    fn poll_events(&mut self, now: Duration) -> Vec<MediaEvent>;
}
