use crate::catalog::Episode;

/// Banner data for the upcoming episode.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NextUp {
    pub(crate) chapter_id: String,
    pub(crate) name: String,
    pub(crate) countdown_secs: u64,
}

/// True inside the trailing window of an episode. Recomputed on every time
/// update, so seeking back out of the window clears it.
pub(crate) fn shows_next_affordance(current_time: f64, duration: f64, end_secs: f64) -> bool {
    if !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
        return false;
    }
    let remaining = duration - current_time;
    (0.0..end_secs).contains(&remaining)
}

pub(crate) fn next_index(episodes: &[Episode], current: usize) -> Option<usize> {
    let next = current.checked_add(1)?;
    (next < episodes.len()).then_some(next)
}

pub(crate) fn countdown_secs(current_time: f64, duration: f64) -> u64 {
    let remaining = (duration - current_time).max(0.0);
    if remaining.is_finite() {
        remaining.ceil() as u64
    } else {
        0
    }
}

pub(crate) fn next_up(
    episodes: &[Episode],
    current: usize,
    current_time: f64,
    duration: f64,
    end_secs: f64,
) -> Option<NextUp> {
    if !shows_next_affordance(current_time, duration, end_secs) {
        return None;
    }
    let next = &episodes[next_index(episodes, current)?];
    Some(NextUp {
        chapter_id: next.chapter_id.clone(),
        name: next.display_name(),
        countdown_secs: countdown_secs(current_time, duration),
    })
}
