/// Seek checkpoints: encoded states keyed by the sample they were taken at.
///
/// Sample 0 is an anchor and survives eviction, so a backward seek always
/// has somewhere to land once a movie has started.
use std::collections::BTreeMap;

const ANCHOR: usize = 0;

#[derive(Debug, Default)]
pub struct CheckpointStore {
    states: BTreeMap<usize, Vec<u8>>,
    interval: usize,
    max_count: usize,
}

impl CheckpointStore {
    pub fn new(interval: usize, max_count: usize) -> Self {
        Self {
            states: BTreeMap::new(),
            interval,
            max_count,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, sample: usize) -> bool {
        self.states.contains_key(&sample)
    }

    pub fn frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.states.keys().copied()
    }

    /// Whether a periodic checkpoint should be taken at `sample`.
    pub fn is_due(&self, sample: usize) -> bool {
        self.interval != 0 && sample % self.interval == 0 && !self.contains(sample)
    }

    pub fn insert(&mut self, sample: usize, state: Vec<u8>) {
        self.states.insert(sample, state);
        while self.states.len() > self.max_count.max(1) {
            let Some(oldest) = self.states.keys().copied().find(|&s| s != ANCHOR) else {
                break;
            };
            log::trace!("[VCR] Evicting seek savestate at sample {}", oldest);
            self.states.remove(&oldest);
        }
    }

    /// The latest checkpoint at or before `sample`.
    pub fn nearest_at_or_before(&self, sample: usize) -> Option<(usize, &[u8])> {
        self.states
            .range(..=sample)
            .next_back()
            .map(|(&s, state)| (s, state.as_slice()))
    }

    /// Drop checkpoints strictly after `sample`. Returns how many went.
    pub fn invalidate_after(&mut self, sample: usize) -> usize {
        let stale = match sample.checked_add(1) {
            Some(from) => self.states.split_off(&from),
            None => BTreeMap::new(),
        };
        if !stale.is_empty() {
            log::debug!(
                "[VCR] Discarded {} seek savestates after sample {}",
                stale.len(),
                sample
            );
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_checkpoint_lookup() {
        let mut store = CheckpointStore::new(10, 8);
        for s in [0, 10, 20] {
            store.insert(s, vec![s as u8]);
        }
        assert_eq!(store.nearest_at_or_before(15).map(|(s, _)| s), Some(10));
        assert_eq!(store.nearest_at_or_before(20).map(|(s, _)| s), Some(20));
        assert_eq!(store.nearest_at_or_before(0).map(|(s, _)| s), Some(0));
    }

    #[test]
    fn eviction_keeps_the_anchor() {
        let mut store = CheckpointStore::new(10, 3);
        for s in [0, 10, 20, 30, 40] {
            store.insert(s, Vec::new());
        }
        assert_eq!(store.frames().collect::<Vec<_>>(), vec![0, 30, 40]);
    }

    #[test]
    fn invalidation_is_strictly_after() {
        let mut store = CheckpointStore::new(10, 8);
        for s in [0, 10, 20, 30] {
            store.insert(s, Vec::new());
        }
        assert_eq!(store.invalidate_after(20), 1);
        assert_eq!(store.frames().collect::<Vec<_>>(), vec![0, 10, 20]);
        assert_eq!(store.invalidate_after(usize::MAX), 0);
    }

    #[test]
    fn due_respects_interval_and_existing() {
        let mut store = CheckpointStore::new(25, 8);
        assert!(store.is_due(50));
        assert!(!store.is_due(51));
        store.insert(50, Vec::new());
        assert!(!store.is_due(50));
        assert!(!CheckpointStore::new(0, 8).is_due(0));
    }
}
