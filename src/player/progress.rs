use log::{debug, warn};
use thiserror::Error;

pub(crate) const PREFERRED_QUALITY_KEY: &str = "preferred_quality";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum StoreError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable string storage shared by every session. Writes are last-write-wins.
pub(crate) trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// A store that failed to open. Reads and writes report `Unavailable`.
impl<K: KeyValueStore> KeyValueStore for Option<K> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Some(store) => store.get(key),
            None => Err(StoreError::Unavailable),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            Some(store) => store.set(key, value),
            None => Err(StoreError::Unavailable),
        }
    }
}

pub(crate) fn progress_key(content_id: &str, episode_id: &str) -> String {
    format!("progress_{content_id}_{episode_id}")
}

/// A position is worth keeping when it is past the opening noise and short
/// of the tail that would immediately count as finished. Both bounds are
/// strict.
pub(crate) fn within_bounds(time: f64, duration: f64, min_secs: f64, end_secs: f64) -> bool {
    time.is_finite()
        && duration.is_finite()
        && duration > 0.0
        && time > min_secs
        && time < duration - end_secs
}

/// Resume positions and the quality preference on top of a [`KeyValueStore`].
/// Storage failures are logged and turn into no-ops.
#[derive(Debug)]
pub(crate) struct ProgressStore<K> {
    store: K,
    min_secs: f64,
    end_secs: f64,
}

impl<K: KeyValueStore> ProgressStore<K> {
    pub(crate) fn new(store: K, min_secs: f64, end_secs: f64) -> Self {
        Self {
            store,
            min_secs,
            end_secs,
        }
    }

    /// Writes the record when `time` is inside the bounds. Returns whether a
    /// write went through.
    pub(crate) fn save(
        &mut self,
        content_id: &str,
        episode_id: &str,
        time: f64,
        duration: f64,
    ) -> bool {
        if !within_bounds(time, duration, self.min_secs, self.end_secs) {
            return false;
        }
        let key = progress_key(content_id, episode_id);
        match self.store.set(&key, &time.to_string()) {
            Ok(()) => {
                debug!("saved {key} = {time}");
                true
            }
            Err(err) => {
                warn!("could not save {key}: {err}");
                false
            }
        }
    }

    /// The stored position for an episode, if it parses and lies inside the
    /// bounds for `duration`.
    pub(crate) fn resume_position(
        &self,
        content_id: &str,
        episode_id: &str,
        duration: f64,
    ) -> Option<f64> {
        let key = progress_key(content_id, episode_id);
        let raw = match self.store.get(&key) {
            Ok(value) => value?,
            Err(err) => {
                warn!("could not read {key}: {err}");
                return None;
            }
        };
        let time = raw.trim().parse::<f64>().ok()?;
        within_bounds(time, duration, self.min_secs, self.end_secs).then_some(time)
    }

    pub(crate) fn preferred_quality(&self) -> Option<u32> {
        match self.store.get(PREFERRED_QUALITY_KEY) {
            Ok(value) => value?.trim().parse::<u32>().ok(),
            Err(err) => {
                warn!("could not read quality preference: {err}");
                None
            }
        }
    }

    pub(crate) fn set_preferred_quality(&mut self, quality: u32) {
        if let Err(err) = self.store.set(PREFERRED_QUALITY_KEY, &quality.to_string()) {
            warn!("could not save quality preference: {err}");
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &K {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }
}

/// In-process store for tests. Can be switched into a failing mode.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: std::collections::HashMap<String, String>,
    unavailable: bool,
    writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub(crate) fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    pub(crate) fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable);
        }
        self.writes += 1;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
