//! Keyed in-memory collections with write-back queues.
//!
//! # Responsibility
//! - Hold every admitted record of one kind with its lifecycle state.
//! - Track added, dirty and deleted ids until a flush snapshots them.
//! - Reconcile a snapshot with whatever changed while it was being written.
//!
//! # Invariants
//! - An id is in at most one of `added`/`dirty` and never in `deleted`
//!   while its slot exists.
//! - `in_flight` holds the version captured for every upsert of the running
//!   flush; a slot only turns Clean when its version still matches.

use super::entity::{EntityState, SyncEntity};
use crate::model::content_source::ContentSource;
use crate::model::document::Document;
use crate::model::language::Language;
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::model::{EntityId, EntityKind};
use crate::repo::sync_store::StoreSnapshot;
use std::collections::{BTreeMap, BTreeSet};
use std::mem;

/// Outcome of removing one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Never written; dropped without touching storage.
    Discarded,
    /// Queued for deletion at the next flush.
    Queued,
}

/// Writes for one entity kind inside a [`FlushBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct KindBatch<E> {
    pub deletions: Vec<EntityId>,
    pub upserts: Vec<E>,
}

impl<E> Default for KindBatch<E> {
    fn default() -> Self {
        Self {
            deletions: Vec::new(),
            upserts: Vec::new(),
        }
    }
}

impl<E> KindBatch<E> {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.upserts.is_empty()
    }
}

/// Everything one flush cycle commits as a single durable unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushBatch {
    pub documents: KindBatch<Document>,
    pub text_units: KindBatch<TextUnit>,
    pub notes: KindBatch<Note>,
    pub content_sources: KindBatch<ContentSource>,
    pub languages: KindBatch<Language>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.text_units.is_empty()
            && self.notes.is_empty()
            && self.content_sources.is_empty()
            && self.languages.is_empty()
    }

    pub fn deletion_count(&self) -> usize {
        self.documents.deletions.len()
            + self.text_units.deletions.len()
            + self.notes.deletions.len()
            + self.content_sources.deletions.len()
            + self.languages.deletions.len()
    }

    pub fn upsert_count(&self) -> usize {
        self.documents.upserts.len()
            + self.text_units.upserts.len()
            + self.notes.upserts.len()
            + self.content_sources.upserts.len()
            + self.languages.upserts.len()
    }
}

#[derive(Debug, Clone)]
struct Slot<E> {
    record: E,
    state: EntityState,
    version: u64,
}

/// Admitted records of one kind plus their pending writes.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    slots: BTreeMap<EntityId, Slot<E>>,
    next_id: EntityId,
    added: BTreeSet<EntityId>,
    dirty: BTreeSet<EntityId>,
    deleted: BTreeSet<EntityId>,
    in_flight: BTreeMap<EntityId, u64>,
}

impl<E: SyncEntity> Default for Collection<E> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            next_id: 1,
            added: BTreeSet::new(),
            dirty: BTreeSet::new(),
            deleted: BTreeSet::new(),
            in_flight: BTreeMap::new(),
        }
    }
}

impl<E: SyncEntity> Collection<E> {
    /// Seeds the collection with stored records, all Clean.
    pub(crate) fn from_stored(records: Vec<E>) -> Self {
        let mut collection = Self::default();
        for record in records {
            let Some(id) = record.id() else {
                continue;
            };
            collection.next_id = collection.next_id.max(id + 1);
            collection.slots.insert(
                id,
                Slot {
                    record,
                    state: EntityState::Clean,
                    version: 0,
                },
            );
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.slots.contains_key(&id)
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&E> {
        self.slots.get(&id).map(|slot| &slot.record)
    }

    /// Mutable access that bypasses change tracking.
    ///
    /// Only for derived, in-memory-only fields such as the reverse side of
    /// note lineage.
    pub(crate) fn record_mut(&mut self, id: EntityId) -> Option<&mut E> {
        self.slots.get_mut(&id).map(|slot| &mut slot.record)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &E> {
        self.slots.values().map(|slot| &slot.record)
    }

    pub(crate) fn state_of(&self, id: EntityId) -> Option<EntityState> {
        match self.slots.get(&id) {
            Some(slot) => Some(slot.state),
            None if self.deleted.contains(&id) => Some(EntityState::PendingDelete),
            None => None,
        }
    }

    /// Returns the id an admission of `record` would receive, without
    /// touching the counter.
    pub(crate) fn admission_id(&self, record: &E) -> EntityId {
        record.id().unwrap_or(self.next_id)
    }

    /// Registers `record` as Unsaved, allocating an id when it has none.
    ///
    /// Returns `None` when the id is already taken.
    pub(crate) fn admit(&mut self, mut record: E) -> Option<EntityId> {
        let id = self.admission_id(&record);
        if self.slots.contains_key(&id) || self.deleted.contains(&id) {
            return None;
        }
        record.assign_id(id);
        self.next_id = self.next_id.max(id + 1);
        self.slots.insert(
            id,
            Slot {
                record,
                state: EntityState::Unsaved,
                version: 0,
            },
        );
        self.added.insert(id);
        Some(id)
    }

    /// Applies `edit` and reports whether a tracked attribute changed.
    ///
    /// Returns `None` when `id` is unknown.
    pub(crate) fn update<F>(&mut self, id: EntityId, edit: F) -> Option<bool>
    where
        F: FnOnce(&mut E),
    {
        let slot = self.slots.get_mut(&id)?;
        let previous = slot.record.clone();
        edit(&mut slot.record);
        slot.record.assign_id(id);
        slot.record.keep_links(&previous);
        let changed = slot.record.tracked() != previous.tracked();
        if changed {
            self.mark_changed(id);
        }
        Some(changed)
    }

    /// Records a persisted change that is not visible in `Tracked`, such as
    /// a relink. Unsaved instances only bump their version.
    pub(crate) fn mark_changed(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        slot.version += 1;
        match slot.state {
            EntityState::Unsaved => {}
            EntityState::Clean | EntityState::Dirty | EntityState::PendingDelete => {
                slot.state = EntityState::Dirty;
                self.dirty.insert(id);
            }
        }
        true
    }

    /// Removes `id` from memory.
    ///
    /// Unsaved instances vanish unless the running flush is inserting them;
    /// everything else is queued for deletion.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<(E, Removal)> {
        let slot = self.slots.remove(&id)?;
        self.added.remove(&id);
        self.dirty.remove(&id);

        let removal = match slot.state {
            EntityState::Unsaved if !self.in_flight.contains_key(&id) => Removal::Discarded,
            _ => {
                self.deleted.insert(id);
                Removal::Queued
            }
        };
        Some((slot.record, removal))
    }

    pub(crate) fn has_outstanding(&self) -> bool {
        !self.added.is_empty() || !self.dirty.is_empty() || !self.deleted.is_empty()
    }

    /// Moves every queued write into a batch and remembers the versions sent.
    pub(crate) fn take_batch(&mut self) -> KindBatch<E> {
        let deletions = mem::take(&mut self.deleted).into_iter().collect();
        let mut pending = mem::take(&mut self.added);
        pending.append(&mut self.dirty);

        let mut upserts = Vec::with_capacity(pending.len());
        for id in pending {
            if let Some(slot) = self.slots.get(&id) {
                self.in_flight.insert(id, slot.version);
                upserts.push(slot.record.clone());
            }
        }
        KindBatch { deletions, upserts }
    }

    pub(crate) fn commit_succeeded(&mut self) {
        for (id, version) in mem::take(&mut self.in_flight) {
            let Some(slot) = self.slots.get_mut(&id) else {
                continue;
            };
            if slot.version == version {
                slot.state = EntityState::Clean;
            } else {
                slot.state = EntityState::Dirty;
                self.dirty.insert(id);
            }
        }
    }

    /// Puts a rejected batch back in the queues.
    pub(crate) fn commit_failed(&mut self, deletions: &[EntityId]) {
        for (id, _) in mem::take(&mut self.in_flight) {
            let Some(slot) = self.slots.get(&id) else {
                continue;
            };
            match slot.state {
                EntityState::Unsaved => {
                    self.added.insert(id);
                }
                _ => {
                    self.dirty.insert(id);
                }
            }
        }
        self.deleted.extend(deletions.iter().copied());
    }
}

/// The five per-kind collections guarded together by the engine lock.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub(crate) documents: Collection<Document>,
    pub(crate) text_units: Collection<TextUnit>,
    pub(crate) notes: Collection<Note>,
    pub(crate) content_sources: Collection<ContentSource>,
    pub(crate) languages: Collection<Language>,
}

impl Collections {
    pub(crate) fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            documents: Collection::from_stored(snapshot.documents),
            text_units: Collection::from_stored(snapshot.text_units),
            notes: Collection::from_stored(snapshot.notes),
            content_sources: Collection::from_stored(snapshot.content_sources),
            languages: Collection::from_stored(snapshot.languages),
        }
    }

    pub(crate) fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::Document => self.documents.contains(id),
            EntityKind::TextUnit => self.text_units.contains(id),
            EntityKind::Note => self.notes.contains(id),
            EntityKind::ContentSource => self.content_sources.contains(id),
            EntityKind::Language => self.languages.contains(id),
        }
    }

    pub(crate) fn has_outstanding(&self) -> bool {
        self.documents.has_outstanding()
            || self.text_units.has_outstanding()
            || self.notes.has_outstanding()
            || self.content_sources.has_outstanding()
            || self.languages.has_outstanding()
    }

    pub(crate) fn take_batch(&mut self) -> FlushBatch {
        FlushBatch {
            documents: self.documents.take_batch(),
            text_units: self.text_units.take_batch(),
            notes: self.notes.take_batch(),
            content_sources: self.content_sources.take_batch(),
            languages: self.languages.take_batch(),
        }
    }

    pub(crate) fn commit_succeeded(&mut self) {
        self.documents.commit_succeeded();
        self.text_units.commit_succeeded();
        self.notes.commit_succeeded();
        self.content_sources.commit_succeeded();
        self.languages.commit_succeeded();
    }

    pub(crate) fn commit_failed(&mut self, batch: &FlushBatch) {
        self.documents.commit_failed(&batch.documents.deletions);
        self.text_units.commit_failed(&batch.text_units.deletions);
        self.notes.commit_failed(&batch.notes.deletions);
        self.content_sources
            .commit_failed(&batch.content_sources.deletions);
        self.languages.commit_failed(&batch.languages.deletions);
    }
}

#[cfg(test)]
mod tests {
    use super::{Collection, Removal};
    use crate::model::language::Language;
    use crate::sync::entity::EntityState;

    fn language(name: &str) -> Language {
        Language::new(name, 0)
    }

    #[test]
    fn admit_assigns_sequential_ids_and_respects_existing() {
        let mut collection: Collection<Language> = Collection::default();
        assert_eq!(collection.admit(language("en")), Some(1));
        let mut preset = language("la");
        preset.id = Some(10);
        assert_eq!(collection.admit(preset), Some(10));
        assert_eq!(collection.admit(language("de")), Some(11));

        let mut duplicate = language("fr");
        duplicate.id = Some(10);
        assert_eq!(collection.admit(duplicate), None);
    }

    #[test]
    fn unsaved_update_is_exempt_and_removal_discards() {
        let mut collection: Collection<Language> = Collection::default();
        let id = collection.admit(language("en")).unwrap();
        assert_eq!(collection.update(id, |lang| lang.name = "English".into()), Some(true));
        assert_eq!(collection.state_of(id), Some(EntityState::Unsaved));

        let (_, removal) = collection.remove(id).unwrap();
        assert_eq!(removal, Removal::Discarded);
        assert_eq!(collection.state_of(id), None);
        assert!(!collection.has_outstanding());
    }

    #[test]
    fn untracked_edit_does_not_dirty_clean_record() {
        let mut collection: Collection<Language> = Collection::default();
        let id = collection.admit(language("en")).unwrap();
        collection.take_batch();
        collection.commit_succeeded();
        assert_eq!(collection.state_of(id), Some(EntityState::Clean));

        assert_eq!(collection.update(id, |lang| lang.id = Some(99)), Some(false));
        assert_eq!(collection.get(id).and_then(|lang| lang.id), Some(id));
        assert_eq!(collection.update(id, |lang| lang.order_number = 3), Some(true));
        assert_eq!(collection.state_of(id), Some(EntityState::Dirty));
    }

    #[test]
    fn change_during_flight_keeps_record_dirty() {
        let mut collection: Collection<Language> = Collection::default();
        let id = collection.admit(language("en")).unwrap();
        let batch = collection.take_batch();
        assert_eq!(batch.upserts.len(), 1);

        collection.update(id, |lang| lang.name = "English".into());
        collection.commit_succeeded();
        assert_eq!(collection.state_of(id), Some(EntityState::Dirty));
        assert!(collection.has_outstanding());
    }

    #[test]
    fn removing_in_flight_insert_queues_deletion() {
        let mut collection: Collection<Language> = Collection::default();
        let id = collection.admit(language("en")).unwrap();
        collection.take_batch();

        let (_, removal) = collection.remove(id).unwrap();
        assert_eq!(removal, Removal::Queued);
        collection.commit_succeeded();
        assert_eq!(collection.state_of(id), Some(EntityState::PendingDelete));
        assert_eq!(collection.take_batch().deletions, vec![id]);
    }

    #[test]
    fn failed_commit_requeues_everything() {
        let mut collection: Collection<Language> = Collection::default();
        let kept = collection.admit(language("en")).unwrap();
        let dropped = collection.admit(language("la")).unwrap();
        collection.take_batch();
        collection.commit_succeeded();

        collection.remove(dropped);
        collection.update(kept, |lang| lang.order_number = 5);
        let batch = collection.take_batch();
        assert!(!collection.has_outstanding());

        collection.commit_failed(&batch.deletions);
        assert!(collection.has_outstanding());
        let retry = collection.take_batch();
        assert_eq!(retry.deletions, vec![dropped]);
        assert_eq!(retry.upserts.len(), 1);
        assert_eq!(retry.upserts[0].order_number, 5);
    }
}
