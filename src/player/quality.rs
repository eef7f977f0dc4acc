use crate::catalog::{Episode, VideoQuality};

/// Renditions of an episode, highest tier first.
pub(crate) fn list_qualities(episode: &Episode) -> Vec<VideoQuality> {
    let mut qualities = episode.renditions().to_vec();
    qualities.sort_by(|a, b| b.quality.cmp(&a.quality));
    qualities
}

/// Default rendition: the stored preference when offered, then `fallback`
/// (720 unless configured otherwise), then the highest tier.
pub(crate) fn pick_default(
    qualities: &[VideoQuality],
    preferred: Option<u32>,
    fallback: u32,
) -> Option<VideoQuality> {
    let by_tier = |tier: u32| qualities.iter().find(|q| q.quality == tier);

    preferred
        .and_then(by_tier)
        .or_else(|| by_tier(fallback))
        .or_else(|| qualities.iter().max_by_key(|q| q.quality))
        .cloned()
}

/// Position and play state captured right before a rendition swap. Lives
/// only until the new source can seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Carryover {
    pub(crate) saved_time: f64,
    pub(crate) was_playing: bool,
}
