//! Debounced write-back engine.
//!
//! # Responsibility
//! - Admit, update and remove records of every kind under one lock.
//! - Run cascades (seeded units and notes, owned sources, lineage).
//! - Flush queued writes from a background thread after a quiet period.
//!
//! # Invariants
//! - Foreground calls hold the state lock only for in-memory work; storage
//!   I/O happens with the state lock released.
//! - At most one flush cycle runs at a time.
//! - `dirty=true` fires on the clean → dirty edge, `dirty=false` once per
//!   successful return to clean.
//! - Notifications reach the sink in transition order: the notify slot is
//!   taken before the state lock that decided the transition is released.
//! - Shutdown always ends with one synchronous flush.

use super::collection::{Collections, Removal};
use super::entity::{EntityState, SyncEntity};
use super::{SaveStateSink, SyncError, SyncResult};
use crate::config::SyncConfig;
use crate::model::content_source::{ContentSource, SourceOwner};
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::model::{DocumentId, EntityId, EntityKind, NoteId, TextUnitId};
use crate::repo::sync_store::SyncStore;
use log::{debug, error, info, warn};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Result of admitting one record, including cascaded seeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    pub id: EntityId,
    /// Text units created because a document was admitted.
    pub seeded_text_units: Vec<TextUnitId>,
    /// Notes created because a text unit was admitted.
    pub seeded_notes: Vec<NoteId>,
}

/// Why a flush did not commit anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    NothingOutstanding,
}

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReport {
    Committed { deletions: usize, upserts: usize },
    Skipped(SkipReason),
}

struct EngineState {
    collections: Collections,
    aggregate_dirty: bool,
    flushing: bool,
    deadline: Option<Instant>,
    shutdown: bool,
    /// Set by any operation that queued a write; consumed by `mutate`.
    changed: bool,
}

impl EngineState {
    fn ensure_references<E: SyncEntity>(&self, record: &E) -> SyncResult<()> {
        for (kind, id) in record.references() {
            if !self.collections.contains(kind, id) {
                return Err(SyncError::NotFound { kind, id });
            }
        }
        Ok(())
    }

    /// Parent and successor must be other units of the same document.
    fn ensure_outline_links(
        &self,
        unit: TextUnitId,
        document_id: DocumentId,
        links: [Option<TextUnitId>; 2],
    ) -> SyncResult<()> {
        for link in links.into_iter().flatten() {
            if link == unit {
                return Err(SyncError::SelfLink { unit });
            }
            let target = self
                .collections
                .text_units
                .get(link)
                .ok_or(SyncError::NotFound {
                    kind: EntityKind::TextUnit,
                    id: link,
                })?;
            if target.document_id != document_id {
                return Err(SyncError::CrossDocumentLink {
                    unit,
                    link,
                    document_id,
                });
            }
        }
        Ok(())
    }

    fn admit<E: SyncEntity>(
        &mut self,
        record: E,
        admission: &mut Admission,
    ) -> SyncResult<EntityId> {
        self.ensure_references(&record)?;
        if let Some((document_id, parent_id, successor_id)) = record.outline_links() {
            let unit = E::collection(&self.collections).admission_id(&record);
            self.ensure_outline_links(unit, document_id, [parent_id, successor_id])?;
        }
        if let Some((source, derived)) = record.lineage().and_then(|(sources, derived)| {
            self.first_lineage_cycle(sources, derived)
        }) {
            return Err(SyncError::LineageCycle { source, derived });
        }

        let collection = E::collection_mut(&mut self.collections);
        let proposed = collection.admission_id(&record);
        let id = collection
            .admit(record)
            .ok_or(SyncError::AlreadyAdmitted {
                kind: E::KIND,
                id: proposed,
            })?;
        self.changed = true;
        debug!(
            "event=sync_admit module=sync status=ok kind={} id={}",
            E::KIND,
            id
        );

        match E::KIND {
            EntityKind::Document => {
                let unit_id = self.admit(TextUnit::new(id), admission)?;
                admission.seeded_text_units.push(unit_id);
            }
            EntityKind::TextUnit => {
                let note_id = self.admit(Note::empty_for_unit(id), admission)?;
                admission.seeded_notes.push(note_id);
            }
            EntityKind::Note => self.mirror_admitted_lineage(id),
            EntityKind::ContentSource | EntityKind::Language => {}
        }
        Ok(id)
    }

    /// Finds a pair that would close a cycle if one new note sat between
    /// `sources` and `derived`.
    fn first_lineage_cycle(
        &self,
        sources: &BTreeSet<NoteId>,
        derived: &BTreeSet<NoteId>,
    ) -> Option<(NoteId, NoteId)> {
        sources.iter().find_map(|source| {
            derived
                .iter()
                .find(|candidate| self.lineage_reaches(*source, **candidate))
                .map(|candidate| (*source, *candidate))
        })
    }

    /// Completes the reverse side of lineage edges carried by an admitted
    /// note.
    fn mirror_admitted_lineage(&mut self, id: NoteId) {
        let Some(note) = self.collections.notes.get(id).cloned() else {
            return;
        };
        for source in &note.sources {
            if let Some(source_note) = self.collections.notes.record_mut(*source) {
                source_note.derived.insert(id);
            }
        }
        for derived in &note.derived {
            if let Some(derived_note) = self.collections.notes.record_mut(*derived) {
                derived_note.sources.insert(id);
            }
            self.collections.notes.mark_changed(*derived);
        }
    }

    fn update<E, F>(&mut self, id: EntityId, edit: F) -> SyncResult<bool>
    where
        E: SyncEntity,
        F: FnOnce(&mut E),
    {
        let changed = E::collection_mut(&mut self.collections)
            .update(id, edit)
            .ok_or(SyncError::NotFound { kind: E::KIND, id })?;
        self.changed |= changed;
        Ok(changed)
    }

    fn remove<E: SyncEntity>(&mut self, id: EntityId) -> SyncResult<Removal> {
        if !E::collection(&self.collections).contains(id) {
            return Err(SyncError::NotFound { kind: E::KIND, id });
        }
        match E::KIND {
            EntityKind::Document => self.cascade_document(id)?,
            EntityKind::TextUnit => self.cascade_text_unit(id)?,
            EntityKind::Note => self.cascade_note(id)?,
            EntityKind::ContentSource | EntityKind::Language => {}
        }

        let (_, removal) = E::collection_mut(&mut self.collections)
            .remove(id)
            .ok_or(SyncError::NotFound { kind: E::KIND, id })?;
        if removal == Removal::Queued {
            self.changed = true;
        }
        debug!(
            "event=sync_remove module=sync status=ok kind={} id={} removal={:?}",
            E::KIND,
            id,
            removal
        );
        Ok(removal)
    }

    fn cascade_document(&mut self, id: DocumentId) -> SyncResult<()> {
        let units: Vec<TextUnitId> = self
            .collections
            .text_units
            .records()
            .filter(|unit| unit.document_id == id)
            .filter_map(|unit| unit.id)
            .collect();
        for unit_id in units {
            if self.collections.text_units.contains(unit_id) {
                self.remove::<TextUnit>(unit_id)?;
            }
        }
        Ok(())
    }

    fn cascade_text_unit(&mut self, id: TextUnitId) -> SyncResult<()> {
        let Some(unit) = self.collections.text_units.get(id).cloned() else {
            return Err(SyncError::NotFound {
                kind: EntityKind::TextUnit,
                id,
            });
        };

        let children: Vec<TextUnitId> = self
            .collections
            .text_units
            .records()
            .filter(|candidate| candidate.parent_id == Some(id))
            .filter_map(|candidate| candidate.id)
            .collect();
        for child in children {
            if self.collections.text_units.contains(child) {
                self.remove::<TextUnit>(child)?;
            }
        }

        let predecessor = self
            .collections
            .text_units
            .records()
            .find(|candidate| {
                candidate.successor_id == Some(id)
                    && candidate.parent_id == unit.parent_id
                    && candidate.document_id == unit.document_id
            })
            .and_then(|candidate| candidate.id);
        if let Some(predecessor) = predecessor {
            self.relink(predecessor, unit.parent_id, unit.successor_id)?;
        }

        self.remove_sources(SourceOwner::TextUnit(id))?;

        let bound: Vec<NoteId> = self
            .collections
            .notes
            .records()
            .filter(|note| note.text_unit_id == Some(id))
            .filter_map(|note| note.id)
            .collect();
        for note_id in bound {
            self.bind_note(note_id, None)?;
        }
        Ok(())
    }

    fn cascade_note(&mut self, id: NoteId) -> SyncResult<()> {
        let Some(note) = self.collections.notes.get(id).cloned() else {
            return Err(SyncError::NotFound {
                kind: EntityKind::Note,
                id,
            });
        };
        for source in &note.sources {
            if let Some(source_note) = self.collections.notes.record_mut(*source) {
                source_note.derived.remove(&id);
            }
        }
        for derived in &note.derived {
            if let Some(derived_note) = self.collections.notes.record_mut(*derived) {
                derived_note.sources.remove(&id);
            }
        }
        self.remove_sources(SourceOwner::Note(id))
    }

    fn remove_sources(&mut self, owner: SourceOwner) -> SyncResult<()> {
        let owned: Vec<EntityId> = self
            .collections
            .content_sources
            .records()
            .filter(|source| source.owner == owner)
            .filter_map(|source| source.id)
            .collect();
        for source_id in owned {
            self.remove::<ContentSource>(source_id)?;
        }
        Ok(())
    }

    fn relink(
        &mut self,
        id: TextUnitId,
        parent_id: Option<TextUnitId>,
        successor_id: Option<TextUnitId>,
    ) -> SyncResult<()> {
        let document_id = self
            .collections
            .text_units
            .get(id)
            .map(|unit| unit.document_id)
            .ok_or(SyncError::NotFound {
                kind: EntityKind::TextUnit,
                id,
            })?;
        self.ensure_outline_links(id, document_id, [parent_id, successor_id])?;
        let unit = self
            .collections
            .text_units
            .record_mut(id)
            .ok_or(SyncError::NotFound {
                kind: EntityKind::TextUnit,
                id,
            })?;
        if unit.parent_id == parent_id && unit.successor_id == successor_id {
            return Ok(());
        }
        unit.relink(parent_id, successor_id);
        self.collections.text_units.mark_changed(id);
        self.changed = true;
        Ok(())
    }

    fn bind_note(&mut self, id: NoteId, text_unit_id: Option<TextUnitId>) -> SyncResult<()> {
        if let Some(unit_id) = text_unit_id {
            if !self.collections.text_units.contains(unit_id) {
                return Err(SyncError::NotFound {
                    kind: EntityKind::TextUnit,
                    id: unit_id,
                });
            }
        }
        let note = self
            .collections
            .notes
            .record_mut(id)
            .ok_or(SyncError::NotFound {
                kind: EntityKind::Note,
                id,
            })?;
        if note.text_unit_id == text_unit_id {
            return Ok(());
        }
        note.text_unit_id = text_unit_id;
        note.touch();
        self.collections.notes.mark_changed(id);
        self.changed = true;
        Ok(())
    }

    /// Whether `ancestor` is reachable from `note` by following sources.
    fn lineage_reaches(&self, note: NoteId, ancestor: NoteId) -> bool {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([note]);
        while let Some(current) = queue.pop_front() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(record) = self.collections.notes.get(current) {
                queue.extend(record.sources.iter().copied());
            }
        }
        false
    }

    fn link_lineage(&mut self, source: NoteId, derived: NoteId) -> SyncResult<()> {
        for id in [source, derived] {
            if !self.collections.notes.contains(id) {
                return Err(SyncError::NotFound {
                    kind: EntityKind::Note,
                    id,
                });
            }
        }
        if self.lineage_reaches(source, derived) {
            return Err(SyncError::LineageCycle { source, derived });
        }

        let inserted = self
            .collections
            .notes
            .record_mut(derived)
            .is_some_and(|note| note.sources.insert(source));
        if let Some(note) = self.collections.notes.record_mut(source) {
            note.derived.insert(derived);
        }
        if inserted {
            self.collections.notes.mark_changed(derived);
            self.changed = true;
        }
        Ok(())
    }

    fn unlink_lineage(&mut self, source: NoteId, derived: NoteId) -> SyncResult<()> {
        let removed = self
            .collections
            .notes
            .record_mut(derived)
            .ok_or(SyncError::NotFound {
                kind: EntityKind::Note,
                id: derived,
            })?
            .sources
            .remove(&source);
        if let Some(note) = self.collections.notes.record_mut(source) {
            note.derived.remove(&derived);
        }
        if removed {
            self.collections.notes.mark_changed(derived);
            self.changed = true;
        }
        Ok(())
    }
}

struct Shared {
    state: Mutex<EngineState>,
    wake: Condvar,
    store: Mutex<Box<dyn SyncStore>>,
    sink: Arc<dyn SaveStateSink>,
    /// Serializes sink calls; always taken while the state lock is held.
    notify: Mutex<()>,
    config: SyncConfig,
}

impl Shared {
    fn lock_state(&self) -> SyncResult<MutexGuard<'_, EngineState>> {
        self.state
            .lock()
            .map_err(|_| SyncError::ConcurrentModification)
    }

    fn notify_slot(&self) -> MutexGuard<'_, ()> {
        self.notify.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one foreground operation and handles timer arming and the
    /// clean → dirty notification edge.
    fn mutate<R>(&self, op: impl FnOnce(&mut EngineState) -> SyncResult<R>) -> SyncResult<R> {
        let mut state = self.lock_state()?;
        let result = op(&mut state);
        let became_dirty = if std::mem::take(&mut state.changed) {
            state.deadline = Some(Instant::now() + self.config.flush_period);
            self.wake.notify_all();
            !std::mem::replace(&mut state.aggregate_dirty, true)
        } else {
            false
        };
        let slot = became_dirty.then(|| self.notify_slot());
        drop(state);

        if let Some(_slot) = slot {
            debug!("event=save_state module=sync status=dirty");
            self.sink.save_state_changed(true);
        }
        result
    }

    fn read<R>(&self, op: impl FnOnce(&EngineState) -> R) -> SyncResult<R> {
        let state = self.lock_state()?;
        Ok(op(&state))
    }

    /// One flush cycle: snapshot under the lock, commit without it,
    /// reconcile under it again.
    fn flush(&self, wait_for_running: bool) -> SyncResult<FlushReport> {
        let batch = {
            let mut state = self.lock_state()?;
            while state.flushing {
                if !wait_for_running {
                    return Ok(FlushReport::Skipped(SkipReason::AlreadyRunning));
                }
                state = self
                    .wake
                    .wait(state)
                    .map_err(|_| SyncError::ConcurrentModification)?;
            }

            if !state.collections.has_outstanding() {
                state.deadline = None;
                let settled = std::mem::replace(&mut state.aggregate_dirty, false);
                let slot = settled.then(|| self.notify_slot());
                drop(state);
                if let Some(_slot) = slot {
                    debug!("event=save_state module=sync status=clean reason=nothing_outstanding");
                    self.sink.save_state_changed(false);
                }
                return Ok(FlushReport::Skipped(SkipReason::NothingOutstanding));
            }

            state.flushing = true;
            state.collections.take_batch()
        };

        let started_at = Instant::now();
        let deletions = batch.deletion_count();
        let upserts = batch.upsert_count();
        let result = match self.store.lock() {
            Ok(mut store) => store.commit(&batch).map_err(SyncError::Persistence),
            Err(_) => Err(SyncError::ConcurrentModification),
        };

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.flushing = false;
        let became_clean = match &result {
            Ok(()) => {
                state.collections.commit_succeeded();
                if state.collections.has_outstanding() {
                    state.deadline = Some(Instant::now() + self.config.flush_period);
                    false
                } else {
                    std::mem::replace(&mut state.aggregate_dirty, false)
                }
            }
            Err(_) => {
                state.collections.commit_failed(&batch);
                state.aggregate_dirty = true;
                state.deadline = Some(Instant::now() + self.config.flush_period);
                false
            }
        };
        self.wake.notify_all();
        let slot = became_clean.then(|| self.notify_slot());
        drop(state);

        match &result {
            Ok(()) => info!(
                "event=sync_flush module=sync status=ok duration_ms={} deletions={} upserts={}",
                started_at.elapsed().as_millis(),
                deletions,
                upserts
            ),
            Err(err) => error!(
                "event=sync_flush module=sync status=error duration_ms={} deletions={} upserts={} error_code=commit_failed error={}",
                started_at.elapsed().as_millis(),
                deletions,
                upserts,
                err
            ),
        }
        if let Some(_slot) = slot {
            debug!("event=save_state module=sync status=clean");
            self.sink.save_state_changed(false);
        }
        result.map(|()| FlushReport::Committed { deletions, upserts })
    }
}

/// Flusher thread body: sleep until the armed deadline, flush, repeat.
fn run_flusher(shared: Arc<Shared>) {
    loop {
        {
            let Ok(mut state) = shared.state.lock() else {
                error!("event=sync_flusher module=sync status=error error_code=state_poisoned");
                return;
            };
            loop {
                if state.shutdown {
                    return;
                }
                match state.deadline {
                    Some(deadline) if Instant::now() >= deadline => {
                        state.deadline = None;
                        break;
                    }
                    Some(deadline) => {
                        let timeout = deadline.saturating_duration_since(Instant::now());
                        state = match shared.wake.wait_timeout(state, timeout) {
                            Ok((state, _)) => state,
                            Err(_) => return,
                        };
                    }
                    None => {
                        state = match shared.wake.wait(state) {
                            Ok(state) => state,
                            Err(_) => return,
                        };
                    }
                }
            }
        }

        if let Err(err) = shared.flush(false) {
            warn!(
                "event=sync_flusher module=sync status=retry_scheduled error={}",
                err
            );
        }
    }
}

/// Write-back synchronization engine for all five entity kinds.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct SyncEngine {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Loads `store` and starts the flusher thread.
    ///
    /// # Errors
    /// - `Persistence` when the initial load fails.
    /// - `FlusherUnavailable` when the thread cannot be spawned.
    pub fn start(
        mut store: Box<dyn SyncStore>,
        config: SyncConfig,
        sink: Arc<dyn SaveStateSink>,
    ) -> SyncResult<Self> {
        let started_at = Instant::now();
        let snapshot = store.load().map_err(SyncError::Persistence)?;
        let loaded = snapshot.documents.len()
            + snapshot.text_units.len()
            + snapshot.notes.len()
            + snapshot.content_sources.len()
            + snapshot.languages.len();

        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState {
                collections: Collections::from_snapshot(snapshot),
                aggregate_dirty: false,
                flushing: false,
                deadline: None,
                shutdown: false,
                changed: false,
            }),
            wake: Condvar::new(),
            store: Mutex::new(store),
            sink,
            notify: Mutex::new(()),
            config,
        });

        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("folio-flusher".to_string())
            .spawn(move || run_flusher(worker))
            .map_err(SyncError::FlusherUnavailable)?;

        info!(
            "event=sync_start module=sync status=ok duration_ms={} records={} flush_period_ms={}",
            started_at.elapsed().as_millis(),
            loaded,
            config.flush_period.as_millis()
        );
        Ok(Self {
            shared,
            flusher: Mutex::new(Some(handle)),
        })
    }

    pub fn config(&self) -> SyncConfig {
        self.shared.config
    }

    /// Admits `record`, assigning the next id of its kind when it has none.
    ///
    /// Documents seed one root text unit; text units seed one empty note.
    ///
    /// # Errors
    /// - `NotFound` when a referenced entity is not admitted.
    /// - `AlreadyAdmitted` when the record carries an id already in use.
    pub fn add<E: SyncEntity>(&self, record: E) -> SyncResult<Admission> {
        self.shared.mutate(|state| {
            let mut admission = Admission::default();
            let id = state.admit(record, &mut admission)?;
            admission.id = id;
            Ok(admission)
        })
    }

    /// Applies `edit` to one record.
    ///
    /// Returns whether a tracked attribute changed. Changing the id inside
    /// `edit` has no effect.
    pub fn update<E, F>(&self, id: EntityId, edit: F) -> SyncResult<bool>
    where
        E: SyncEntity,
        F: FnOnce(&mut E),
    {
        self.shared.mutate(|state| state.update::<E, F>(id, edit))
    }

    /// Removes one record with its cascades.
    pub fn remove<E: SyncEntity>(&self, id: EntityId) -> SyncResult<Removal> {
        self.shared.mutate(|state| state.remove::<E>(id))
    }

    /// Persists new structural links for a text unit.
    pub fn relink_text_unit(
        &self,
        id: TextUnitId,
        parent_id: Option<TextUnitId>,
        successor_id: Option<TextUnitId>,
    ) -> SyncResult<()> {
        self.shared
            .mutate(|state| state.relink(id, parent_id, successor_id))
    }

    /// Binds a note to a text unit, or unsorts it with `None`.
    pub fn bind_note(&self, id: NoteId, text_unit_id: Option<TextUnitId>) -> SyncResult<()> {
        self.shared.mutate(|state| state.bind_note(id, text_unit_id))
    }

    /// Records that `derived` was derived from `source`.
    ///
    /// `source` becomes read-only.
    ///
    /// # Errors
    /// - `LineageCycle` when `source` already descends from `derived`.
    pub fn link_lineage(&self, source: NoteId, derived: NoteId) -> SyncResult<()> {
        self.shared
            .mutate(|state| state.link_lineage(source, derived))
    }

    pub fn unlink_lineage(&self, source: NoteId, derived: NoteId) -> SyncResult<()> {
        self.shared
            .mutate(|state| state.unlink_lineage(source, derived))
    }

    pub fn get<E: SyncEntity>(&self, id: EntityId) -> SyncResult<Option<E>> {
        self.shared
            .read(|state| E::collection(&state.collections).get(id).cloned())
    }

    /// All records of one kind in id order.
    pub fn list<E: SyncEntity>(&self) -> SyncResult<Vec<E>> {
        self.shared
            .read(|state| E::collection(&state.collections).records().cloned().collect())
    }

    /// Lifecycle state of one instance; `None` once it is gone.
    pub fn state_of<E: SyncEntity>(&self, id: EntityId) -> SyncResult<Option<EntityState>> {
        self.shared
            .read(|state| E::collection(&state.collections).state_of(id))
    }

    /// Whether any write is waiting for a flush.
    pub fn is_dirty(&self) -> SyncResult<bool> {
        self.shared.read(|state| state.aggregate_dirty)
    }

    pub fn text_units_of(&self, document_id: DocumentId) -> SyncResult<Vec<TextUnit>> {
        self.shared.read(|state| {
            state
                .collections
                .text_units
                .records()
                .filter(|unit| unit.document_id == document_id)
                .cloned()
                .collect()
        })
    }

    pub fn notes_for_unit(&self, text_unit_id: TextUnitId) -> SyncResult<Vec<Note>> {
        self.shared.read(|state| {
            state
                .collections
                .notes
                .records()
                .filter(|note| note.text_unit_id == Some(text_unit_id))
                .cloned()
                .collect()
        })
    }

    pub fn unsorted_notes(&self) -> SyncResult<Vec<Note>> {
        self.shared.read(|state| {
            state
                .collections
                .notes
                .records()
                .filter(|note| note.is_unsorted())
                .cloned()
                .collect()
        })
    }

    pub fn sources_for(&self, owner: SourceOwner) -> SyncResult<Vec<ContentSource>> {
        self.shared.read(|state| {
            state
                .collections
                .content_sources
                .records()
                .filter(|source| source.owner == owner)
                .cloned()
                .collect()
        })
    }

    /// Flushes synchronously, waiting for an in-flight cycle first.
    ///
    /// # Errors
    /// - `Persistence` when the commit fails; queued work is kept.
    pub fn flush_now(&self) -> SyncResult<FlushReport> {
        self.shared.flush(true)
    }

    /// Stops the flusher thread and runs one final flush.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) -> SyncResult<FlushReport> {
        {
            let mut state = self.shared.lock_state()?;
            state.shutdown = true;
            state.deadline = None;
            self.shared.wake.notify_all();
        }

        let handle = match self.flusher.lock() {
            Ok(mut flusher) => flusher.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("event=sync_shutdown module=sync status=error error_code=flusher_panicked");
            }
        }

        let report = self.shared.flush(true);
        match &report {
            Ok(report) => info!(
                "event=sync_shutdown module=sync status=ok report={:?}",
                report
            ),
            Err(err) => error!(
                "event=sync_shutdown module=sync status=error error_code=final_flush_failed error={}",
                err
            ),
        }
        report
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
