use std::collections::{BTreeMap, BTreeSet};

use formats::{ObjectKey, ObjectMeta, SceneDescriptor};
use thiserror::Error;

use crate::fetch::{FetchOutcome, FetchRequest, FetchToken};
use crate::residency::{PartSlot, ResidencyState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no cache entry for {0}")]
    UnknownKey(ObjectKey),
    #[error("part {part} out of range for {key} ({parts} parts)")]
    PartOutOfRange {
        key: ObjectKey,
        part: u32,
        parts: usize,
    },
    #[error("stale fetch result {0}")]
    Stale(FetchToken),
}

/// A primitive the cache refused; handed back so its owner can release it.
#[derive(Debug)]
pub struct Rejected<P> {
    pub error: CacheError,
    pub primitive: P,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Inserted {
    Partial { resident: usize, parts: usize },
    Complete,
}

#[derive(Debug)]
pub struct CacheEntry<P> {
    key: ObjectKey,
    slots: Vec<PartSlot<P>>,
    layer: usize,
    has_transparency: bool,
    // Order in which entries became complete; newest wins as a fallback.
    completed_seq: Option<u64>,
}

impl<P> CacheEntry<P> {
    fn new(meta: &ObjectMeta) -> Self {
        Self {
            key: meta.key(),
            slots: (0..meta.parts).map(|_| PartSlot::Missing).collect(),
            layer: meta.layer,
            has_transparency: meta.has_transparency,
            completed_seq: None,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    pub fn has_transparency(&self) -> bool {
        self.has_transparency
    }

    pub fn parts(&self) -> usize {
        self.slots.len()
    }

    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state() == ResidencyState::Resident)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.resident_count() == self.slots.len()
    }

    pub fn state(&self, part: u32) -> Option<ResidencyState> {
        self.slots.get(part as usize).map(PartSlot::state)
    }

    pub fn resident_parts(&self) -> impl Iterator<Item = &P> {
        self.slots.iter().filter_map(PartSlot::resident)
    }

    fn into_resident(self) -> Vec<(ObjectKey, P)> {
        let key = self.key;
        self.slots
            .into_iter()
            .filter_map(PartSlot::into_resident)
            .map(|p| (key.clone(), p))
            .collect()
    }
}

/// Decoded object parts keyed by `(id, md5)`.
///
/// Single owner, driven from the viewer tick:
/// - `reconcile` opens slots for everything the descriptor names and returns
///   one fetch per part that is neither resident nor in flight.
/// - `insert`/`mark_failed` settle those fetches; results whose token no longer
///   owns its slot are stale.
/// - `garbage_collect` hands back every primitive that is no longer needed.
///
/// An older complete version of an id stays drawable until the referenced
/// version of that id is complete.
#[derive(Debug)]
pub struct ObjectCache<P> {
    entries: BTreeMap<ObjectKey, CacheEntry<P>>,
    next_generation: u64,
    next_completion: u64,
    retired: Vec<(ObjectKey, P)>,
}

impl<P> Default for ObjectCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ObjectCache<P> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_generation: 1,
            next_completion: 1,
            retired: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, key: &ObjectKey) -> Option<&CacheEntry<P>> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<P>> {
        self.entries.values()
    }

    pub fn state(&self, key: &ObjectKey, part: u32) -> ResidencyState {
        self.entries
            .get(key)
            .and_then(|e| e.state(part))
            .unwrap_or(ResidencyState::Missing)
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .values()
            .flat_map(|e| e.slots.iter())
            .filter(|s| s.in_flight_generation().is_some())
            .count()
    }

    pub fn resident_parts(&self) -> usize {
        self.entries.values().map(CacheEntry::resident_count).sum()
    }

    pub fn reconcile(&mut self, descriptor: &SceneDescriptor) -> Vec<FetchRequest> {
        let mut requests = Vec::new();

        for meta in &descriptor.objects {
            let key = meta.key();
            let parts = meta.parts as usize;

            // Same md5 should mean same part count; if not, start over.
            let reshaped = self
                .entries
                .get(&key)
                .is_some_and(|e| e.slots.len() != parts);
            if reshaped && let Some(old) = self.entries.remove(&key) {
                tracing::warn!(
                    key = %key,
                    was = old.slots.len(),
                    now = parts,
                    "part count changed without md5 change; refetching"
                );
                self.retired.extend(old.into_resident());
            }

            let entry = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(meta));
            entry.layer = meta.layer;
            entry.has_transparency = meta.has_transparency;

            for (part, slot) in entry.slots.iter_mut().enumerate() {
                if !matches!(slot, PartSlot::Missing) {
                    continue;
                }
                let generation = self.next_generation;
                self.next_generation += 1;
                *slot = PartSlot::Requested { generation };
                requests.push(FetchRequest {
                    token: FetchToken {
                        key: key.clone(),
                        part: part as u32,
                        generation,
                    },
                    layer: meta.layer,
                });
            }
        }

        if !requests.is_empty() {
            tracing::debug!(count = requests.len(), "issuing part fetches");
        }
        requests
    }

    /// Whether `token` still owns its slot.
    pub fn is_current(&self, token: &FetchToken) -> bool {
        self.entries
            .get(&token.key)
            .and_then(|e| e.slots.get(token.part as usize))
            .and_then(PartSlot::in_flight_generation)
            == Some(token.generation)
    }

    /// Moves a requested part to decoding once its payload has arrived.
    pub fn begin_decode(&mut self, token: &FetchToken) -> FetchOutcome {
        let slot = self
            .entries
            .get_mut(&token.key)
            .and_then(|e| e.slots.get_mut(token.part as usize));
        match slot {
            Some(slot) if slot.in_flight_generation() == Some(token.generation) => {
                *slot = PartSlot::Decoding {
                    generation: token.generation,
                };
                FetchOutcome::Accepted
            }
            _ => FetchOutcome::StaleFetchDiscard,
        }
    }

    pub fn insert(&mut self, token: &FetchToken, primitive: P) -> Result<Inserted, Rejected<P>> {
        let Some(entry) = self.entries.get_mut(&token.key) else {
            return Err(Rejected {
                error: CacheError::UnknownKey(token.key.clone()),
                primitive,
            });
        };

        let parts = entry.slots.len();
        let Some(slot) = entry.slots.get_mut(token.part as usize) else {
            return Err(Rejected {
                error: CacheError::PartOutOfRange {
                    key: token.key.clone(),
                    part: token.part,
                    parts,
                },
                primitive,
            });
        };

        if slot.in_flight_generation() != Some(token.generation) {
            return Err(Rejected {
                error: CacheError::Stale(token.clone()),
                primitive,
            });
        }
        *slot = PartSlot::Resident(primitive);

        if !entry.is_complete() {
            return Ok(Inserted::Partial {
                resident: entry.resident_count(),
                parts,
            });
        }
        if entry.completed_seq.is_none() {
            entry.completed_seq = Some(self.next_completion);
            self.next_completion += 1;
        }
        tracing::debug!(key = %token.key, parts, "object complete");
        Ok(Inserted::Complete)
    }

    /// Returns a failed part to missing so the next reconcile requests it again.
    pub fn mark_failed(&mut self, token: &FetchToken) -> bool {
        if !self.is_current(token) {
            return false;
        }
        if let Some(slot) = self
            .entries
            .get_mut(&token.key)
            .and_then(|e| e.slots.get_mut(token.part as usize))
        {
            *slot = PartSlot::Missing;
        }
        true
    }

    /// Entry to draw for a display-list key: the key itself when complete,
    /// otherwise the newest complete version of the same id.
    pub fn renderable(&self, key: &ObjectKey) -> Option<&CacheEntry<P>> {
        if let Some(entry) = self.entries.get(key)
            && entry.is_complete()
        {
            return Some(entry);
        }
        self.fallback_for(key)
    }

    fn fallback_for(&self, key: &ObjectKey) -> Option<&CacheEntry<P>> {
        self.entries
            .range(ObjectKey::new(key.id.clone(), String::new())..)
            .take_while(|(k, _)| k.id == key.id)
            .filter(|(k, e)| *k != key && e.is_complete())
            .max_by_key(|(_, e)| e.completed_seq)
            .map(|(_, e)| e)
    }

    /// Drops every entry not in `referenced`, keeping the newest complete
    /// fallback for referenced keys that are still incomplete.
    pub fn garbage_collect(&mut self, referenced: &BTreeSet<ObjectKey>) -> Vec<(ObjectKey, P)> {
        let mut fallbacks: BTreeSet<ObjectKey> = BTreeSet::new();
        for key in referenced {
            let complete = self.entries.get(key).is_some_and(CacheEntry::is_complete);
            if !complete && let Some(fallback) = self.fallback_for(key) {
                fallbacks.insert(fallback.key.clone());
            }
        }

        let doomed: Vec<ObjectKey> = self
            .entries
            .keys()
            .filter(|k| !referenced.contains(*k) && !fallbacks.contains(*k))
            .cloned()
            .collect();

        let mut evicted = std::mem::take(&mut self.retired);
        for key in &doomed {
            if let Some(entry) = self.entries.remove(key) {
                evicted.extend(entry.into_resident());
            }
        }

        if !doomed.is_empty() {
            tracing::debug!(
                entries = doomed.len(),
                parts = evicted.len(),
                kept_fallbacks = fallbacks.len(),
                "cache garbage collected"
            );
        }
        evicted
    }

    /// Empties the cache, returning every resident primitive.
    pub fn clear(&mut self) -> Vec<(ObjectKey, P)> {
        let mut evicted = std::mem::take(&mut self.retired);
        for (_, entry) in std::mem::take(&mut self.entries) {
            evicted.extend(entry.into_resident());
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn meta(id: &str, md5: &str, parts: u32) -> ObjectMeta {
        ObjectMeta {
            id: id.to_string(),
            md5: md5.to_string(),
            layer: 0,
            parts,
            has_transparency: false,
        }
    }

    fn scene(objects: Vec<ObjectMeta>) -> SceneDescriptor {
        SceneDescriptor {
            objects,
            ..SceneDescriptor::default()
        }
    }

    fn referenced(d: &SceneDescriptor) -> BTreeSet<ObjectKey> {
        d.objects.iter().map(ObjectMeta::key).collect()
    }

    fn fill(cache: &mut ObjectCache<String>, requests: &[FetchRequest]) {
        for r in requests {
            let label = format!("{}", r.token.key);
            cache.insert(&r.token, label).expect("insert");
        }
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 2), meta("b", "1", 1)]);

        let first = cache.reconcile(&d);
        assert_eq!(first.len(), 3);
        assert_eq!(cache.in_flight(), 3);
        assert!(cache.reconcile(&d).is_empty());

        fill(&mut cache, &first);
        assert!(cache.reconcile(&d).is_empty());
        assert_eq!(cache.resident_parts(), 3);
    }

    #[test]
    fn partial_object_is_not_renderable() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 2)]);
        let requests = cache.reconcile(&d);

        let inserted = cache.insert(&requests[0].token, "p0".into()).expect("insert");
        assert_eq!(inserted, Inserted::Partial { resident: 1, parts: 2 });
        assert!(cache.renderable(&ObjectKey::new("a", "1")).is_none());

        assert_eq!(cache.insert(&requests[1].token, "p1".into()).expect("insert"), Inserted::Complete);
        let entry = cache.renderable(&ObjectKey::new("a", "1")).expect("renderable");
        assert_eq!(entry.resident_parts().cloned().collect::<Vec<_>>(), vec!["p0", "p1"]);
    }

    #[test]
    fn md5_change_refetches_and_old_version_is_fallback_until_complete() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let v1 = scene(vec![meta("a", "1", 1)]);
        let requests = cache.reconcile(&v1);
        fill(&mut cache, &requests);

        let v2 = scene(vec![meta("a", "2", 1)]);
        let requests = cache.reconcile(&v2);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].token.key, ObjectKey::new("a", "2"));

        // New version incomplete: the old one survives collection and is drawn.
        assert!(cache.garbage_collect(&referenced(&v2)).is_empty());
        let drawn = cache.renderable(&ObjectKey::new("a", "2")).expect("fallback");
        assert_eq!(drawn.key(), &ObjectKey::new("a", "1"));

        fill(&mut cache, &requests);
        let evicted = cache.garbage_collect(&referenced(&v2));
        assert_eq!(evicted, vec![(ObjectKey::new("a", "1"), "a@1".to_string())]);
        assert_eq!(cache.len(), 1);
        let drawn = cache.renderable(&ObjectKey::new("a", "2")).expect("new");
        assert_eq!(drawn.key(), &ObjectKey::new("a", "2"));
    }

    #[test]
    fn absent_objects_are_collected() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1), meta("b", "1", 2)]);
        let requests = cache.reconcile(&d);
        fill(&mut cache, &requests);

        let only_a = scene(vec![meta("a", "1", 1)]);
        assert!(cache.reconcile(&only_a).is_empty());
        let evicted = cache.garbage_collect(&referenced(&only_a));
        assert_eq!(evicted.len(), 2);
        assert!(evicted.iter().all(|(k, _)| k.id == "b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newest_complete_version_is_the_fallback() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        for md5 in ["1", "2"] {
            let d = scene(vec![meta("a", md5, 1)]);
            let requests = cache.reconcile(&d);
            fill(&mut cache, &requests);
        }
        let v3 = scene(vec![meta("a", "3", 1)]);
        let _pending = cache.reconcile(&v3);

        let evicted = cache.garbage_collect(&referenced(&v3));
        assert_eq!(evicted, vec![(ObjectKey::new("a", "1"), "a@1".to_string())]);
        let drawn = cache.renderable(&ObjectKey::new("a", "3")).expect("fallback");
        assert_eq!(drawn.key(), &ObjectKey::new("a", "2"));
    }

    #[test]
    fn results_for_collected_keys_are_stale() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let v1 = scene(vec![meta("a", "1", 1)]);
        let requests = cache.reconcile(&v1);
        let stale = requests[0].token.clone();

        let v2 = scene(vec![meta("a", "2", 1)]);
        cache.reconcile(&v2);
        cache.garbage_collect(&referenced(&v2));

        assert!(!cache.is_current(&stale));
        assert_eq!(cache.begin_decode(&stale), FetchOutcome::StaleFetchDiscard);
        let rejected = cache.insert(&stale, "late".into()).unwrap_err();
        assert_eq!(rejected.error, CacheError::UnknownKey(ObjectKey::new("a", "1")));
        assert_eq!(rejected.primitive, "late");
    }

    #[test]
    fn failed_part_is_requested_again_with_a_new_generation() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1)]);
        let first = cache.reconcile(&d);
        let token = first[0].token.clone();

        assert_eq!(cache.begin_decode(&token), FetchOutcome::Accepted);
        assert_eq!(cache.state(&token.key, 0), ResidencyState::Decoding);
        assert!(cache.mark_failed(&token));
        assert_eq!(cache.state(&token.key, 0), ResidencyState::Missing);

        let retry = cache.reconcile(&d);
        assert_eq!(retry.len(), 1);
        assert_ne!(retry[0].token.generation, token.generation);

        let rejected = cache.insert(&token, "old".into()).unwrap_err();
        assert_eq!(rejected.error, CacheError::Stale(token));
        cache.insert(&retry[0].token, "new".into()).expect("insert");
    }

    #[test]
    fn out_of_range_part_is_rejected() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1)]);
        let requests = cache.reconcile(&d);
        let mut token = requests[0].token.clone();
        token.part = 5;
        let rejected = cache.insert(&token, "x".into()).unwrap_err();
        assert!(matches!(rejected.error, CacheError::PartOutOfRange { parts: 1, .. }));
    }

    #[test]
    fn layer_and_transparency_changes_keep_cached_parts() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1)]);
        let requests = cache.reconcile(&d);
        fill(&mut cache, &requests);

        let mut moved = meta("a", "1", 1);
        moved.layer = 2;
        moved.has_transparency = true;
        assert!(cache.reconcile(&scene(vec![moved])).is_empty());
        let entry = cache.entry(&ObjectKey::new("a", "1")).expect("entry");
        assert_eq!(entry.layer(), 2);
        assert!(entry.has_transparency());
        assert!(entry.is_complete());
    }

    #[test]
    fn part_count_change_retires_old_parts() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1)]);
        let requests = cache.reconcile(&d);
        fill(&mut cache, &requests);

        let grown = scene(vec![meta("a", "1", 2)]);
        assert_eq!(cache.reconcile(&grown).len(), 2);
        let evicted = cache.garbage_collect(&referenced(&grown));
        assert_eq!(evicted, vec![(ObjectKey::new("a", "1"), "a@1".to_string())]);
    }

    #[test]
    fn clear_returns_everything() {
        let mut cache: ObjectCache<String> = ObjectCache::new();
        let d = scene(vec![meta("a", "1", 1), meta("b", "1", 1)]);
        let requests = cache.reconcile(&d);
        fill(&mut cache, &requests);
        assert_eq!(cache.clear().len(), 2);
        assert!(cache.is_empty());
    }
}
