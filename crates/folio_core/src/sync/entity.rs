//! Per-kind synchronization contract.
//!
//! Each entity kind declares which attributes make an instance dirty through
//! its `Tracked` projection. Changes outside that projection are kept in
//! memory but do not schedule a write.

use super::collection::{Collection, Collections};
use crate::model::content_source::{Citation, ContentSource, SourceOwner};
use crate::model::document::Document;
use crate::model::language::Language;
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::model::{DocumentId, EntityId, EntityKind, TextUnitId};
use std::collections::BTreeSet;

/// Lifecycle state of one admitted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Admitted, never written.
    Unsaved,
    /// Stored copy matches memory.
    Clean,
    /// Tracked attributes changed since the last write.
    Dirty,
    /// Removed from memory, deletion not yet written.
    PendingDelete,
}

/// Record kind managed by [`super::SyncEngine`].
pub trait SyncEntity: Clone + Send + 'static {
    /// Projection of the attributes whose change marks an instance dirty.
    type Tracked: PartialEq;

    const KIND: EntityKind;

    fn id(&self) -> Option<EntityId>;

    fn assign_id(&mut self, id: EntityId);

    fn tracked(&self) -> Self::Tracked;

    /// Entities that must already be admitted before this one.
    fn references(&self) -> Vec<(EntityKind, EntityId)> {
        Vec::new()
    }

    /// Restores relationship fields an attribute edit must not change.
    ///
    /// Links move only through the engine's dedicated relationship calls.
    fn keep_links(&mut self, _previous: &Self) {}

    /// Lineage sets (sources, derived) for kinds that carry them.
    fn lineage(&self) -> Option<(&BTreeSet<EntityId>, &BTreeSet<EntityId>)> {
        None
    }

    /// Outline placement `(document, parent, successor)` for kinds that sit
    /// in an outline.
    fn outline_links(&self) -> Option<(DocumentId, Option<TextUnitId>, Option<TextUnitId>)> {
        None
    }

    fn collection(collections: &Collections) -> &Collection<Self>;

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self>;
}

impl SyncEntity for Document {
    type Tracked = (String, i64);

    const KIND: EntityKind = EntityKind::Document;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn tracked(&self) -> Self::Tracked {
        (self.title.clone(), self.modified_at)
    }

    fn collection(collections: &Collections) -> &Collection<Self> {
        &collections.documents
    }

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
        &mut collections.documents
    }
}

impl SyncEntity for TextUnit {
    type Tracked = i64;

    const KIND: EntityKind = EntityKind::TextUnit;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn tracked(&self) -> Self::Tracked {
        self.modified_at
    }

    fn references(&self) -> Vec<(EntityKind, EntityId)> {
        let mut references = vec![(EntityKind::Document, self.document_id)];
        references.extend(self.parent_id.map(|id| (EntityKind::TextUnit, id)));
        references.extend(self.successor_id.map(|id| (EntityKind::TextUnit, id)));
        references
    }

    fn keep_links(&mut self, previous: &Self) {
        self.document_id = previous.document_id;
        self.parent_id = previous.parent_id;
        self.successor_id = previous.successor_id;
    }

    fn outline_links(&self) -> Option<(DocumentId, Option<TextUnitId>, Option<TextUnitId>)> {
        Some((self.document_id, self.parent_id, self.successor_id))
    }

    fn collection(collections: &Collections) -> &Collection<Self> {
        &collections.text_units
    }

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
        &mut collections.text_units
    }
}

impl SyncEntity for Note {
    type Tracked = (String, String);

    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn tracked(&self) -> Self::Tracked {
        (self.text.clone(), self.language.clone())
    }

    fn references(&self) -> Vec<(EntityKind, EntityId)> {
        let mut references: Vec<_> = self
            .text_unit_id
            .map(|id| (EntityKind::TextUnit, id))
            .into_iter()
            .collect();
        references.extend(
            self.sources
                .iter()
                .chain(self.derived.iter())
                .map(|id| (EntityKind::Note, *id)),
        );
        references
    }

    fn keep_links(&mut self, previous: &Self) {
        self.text_unit_id = previous.text_unit_id;
        self.sources = previous.sources.clone();
        self.derived = previous.derived.clone();
    }

    fn lineage(&self) -> Option<(&BTreeSet<EntityId>, &BTreeSet<EntityId>)> {
        Some((&self.sources, &self.derived))
    }

    fn collection(collections: &Collections) -> &Collection<Self> {
        &collections.notes
    }

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
        &mut collections.notes
    }
}

impl SyncEntity for ContentSource {
    type Tracked = Citation;

    const KIND: EntityKind = EntityKind::ContentSource;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn tracked(&self) -> Self::Tracked {
        self.citation.clone()
    }

    fn references(&self) -> Vec<(EntityKind, EntityId)> {
        match self.owner {
            SourceOwner::Note(id) => vec![(EntityKind::Note, id)],
            SourceOwner::TextUnit(id) => vec![(EntityKind::TextUnit, id)],
        }
    }

    fn keep_links(&mut self, previous: &Self) {
        self.owner = previous.owner;
    }

    fn collection(collections: &Collections) -> &Collection<Self> {
        &collections.content_sources
    }

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
        &mut collections.content_sources
    }
}

impl SyncEntity for Language {
    type Tracked = (String, i64);

    const KIND: EntityKind = EntityKind::Language;

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn tracked(&self) -> Self::Tracked {
        (self.name.clone(), self.order_number)
    }

    fn collection(collections: &Collections) -> &Collection<Self> {
        &collections.languages
    }

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
        &mut collections.languages
    }
}
