//! Workspace facade over the outline and the synchronization engine.
//!
//! # Responsibility
//! - Run structural text unit operations on the [`Outline`].
//! - Forward the resulting structural events to the [`SyncEngine`] so
//!   persisted parent/successor links follow the outline.
//! - Expose a combined read model ([`UnitView`]).
//!
//! # Invariants
//! - Every outline node is bound to the durable id of an admitted unit.
//! - After each call, stored links of every touched unit equal
//!   [`Outline::link_ids`].

use crate::config::SyncConfig;
use crate::model::document::Document;
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::model::{DocumentId, EntityKind, TextUnitId};
use crate::outline::{Outline, OutlineError, UnitHandle};
use crate::repo::sync_store::SyncStore;
use crate::sync::{FlushReport, SaveStateSink, SyncEngine, SyncError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors from workspace operations.
#[derive(Debug)]
pub enum WorkspaceError {
    Outline(OutlineError),
    Sync(SyncError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outline(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Outline(err) => Some(err),
            Self::Sync(err) => Some(err),
        }
    }
}

impl From<OutlineError> for WorkspaceError {
    fn from(value: OutlineError) -> Self {
        Self::Outline(value)
    }
}

impl From<SyncError> for WorkspaceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// A text unit together with its derived outline data and notes.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitView {
    pub unit: TextUnit,
    pub order_key: f64,
    pub depth: u32,
    pub children: Vec<TextUnitId>,
    pub notes: Vec<Note>,
}

/// Outline plus engine, driven by the presentation layer.
pub struct Workspace {
    outline: Outline,
    engine: Arc<SyncEngine>,
}

impl Workspace {
    /// Starts an engine on `store` and materializes the outline.
    ///
    /// Stored links that the loader had to repair are written back through
    /// the engine.
    pub fn open(
        store: Box<dyn SyncStore>,
        config: SyncConfig,
        sink: Arc<dyn SaveStateSink>,
    ) -> WorkspaceResult<Self> {
        let engine = Arc::new(SyncEngine::start(store, config, sink)?);
        Self::attach(engine)
    }

    /// Builds a workspace over an already running engine.
    pub fn attach(engine: Arc<SyncEngine>) -> WorkspaceResult<Self> {
        let started_at = Instant::now();
        let units = engine.list::<TextUnit>()?;
        let outline = Outline::load(&units);

        let mut repaired = 0usize;
        for unit in &units {
            let Some(id) = unit.id else {
                continue;
            };
            let handle = outline.handle_of(id)?;
            let (parent_id, successor_id) = outline.link_ids(handle)?;
            if (parent_id, successor_id) != (unit.parent_id, unit.successor_id) {
                engine.relink_text_unit(id, parent_id, successor_id)?;
                repaired += 1;
            }
        }
        if repaired > 0 {
            warn!(
                "event=workspace_open module=service status=repaired units={}",
                repaired
            );
        }
        info!(
            "event=workspace_open module=service status=ok duration_ms={} units={} documents={}",
            started_at.elapsed().as_millis(),
            outline.len(),
            outline.documents().len()
        );
        Ok(Self { outline, engine })
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// Creates a document with its seeded root unit.
    pub fn create_document(
        &mut self,
        title: impl Into<String>,
    ) -> WorkspaceResult<(DocumentId, TextUnitId)> {
        let admission = self.engine.add(Document::new(title))?;
        let Some(&unit_id) = admission.seeded_text_units.first() else {
            return Err(SyncError::NotFound {
                kind: EntityKind::TextUnit,
                id: admission.id,
            }
            .into());
        };
        let edit = self.outline.insert_root(admission.id)?;
        let handle = edit
            .inserted
            .ok_or(OutlineError::UnknownDocument(admission.id))?;
        self.outline.bind_id(handle, unit_id)?;
        self.persist_links(&edit.relinked)?;
        Ok((admission.id, unit_id))
    }

    /// Inserts a new first child under `parent_id`.
    pub fn insert_child(&mut self, parent_id: TextUnitId) -> WorkspaceResult<TextUnitId> {
        let parent = self.outline.handle_of(parent_id)?;
        let edit = self.outline.insert_child(parent)?;
        let handle = edit.inserted.ok_or(OutlineError::NotFound(parent))?;
        self.admit_inserted(handle, &edit.relinked)
    }

    /// Inserts a new unit right after `node_id` in its sibling chain.
    pub fn insert_after(&mut self, node_id: TextUnitId) -> WorkspaceResult<TextUnitId> {
        let node = self.outline.handle_of(node_id)?;
        let edit = self.outline.insert_after(node)?;
        let handle = edit.inserted.ok_or(OutlineError::NotFound(node))?;
        self.admit_inserted(handle, &edit.relinked)
    }

    /// Removes a unit with its subtree.
    ///
    /// The engine cascades to descendants, citations and bound notes.
    pub fn remove_unit(&mut self, id: TextUnitId) -> WorkspaceResult<Vec<TextUnitId>> {
        let handle = self.outline.handle_of(id)?;
        self.engine.remove::<TextUnit>(id)?;
        let edit = self.outline.remove(handle)?;
        self.persist_links(&edit.relinked)?;
        Ok(edit.removed.iter().filter_map(|unit| unit.id).collect())
    }

    /// Removes a document and every unit in it.
    pub fn remove_document(&mut self, id: DocumentId) -> WorkspaceResult<()> {
        self.engine.remove::<Document>(id)?;
        match self.outline.remove_document(id) {
            Ok(_) | Err(OutlineError::UnknownDocument(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Moves `node_id` with its subtree right after `target_id`.
    pub fn move_after(
        &mut self,
        node_id: TextUnitId,
        target_id: TextUnitId,
    ) -> WorkspaceResult<()> {
        let node = self.outline.handle_of(node_id)?;
        let target = self.outline.handle_of(target_id)?;
        let edit = self.outline.move_after(node, target)?;
        self.persist_links(&edit.relinked)
    }

    /// Moves `node_id` with its subtree to be the first child of `parent_id`.
    pub fn move_under(
        &mut self,
        node_id: TextUnitId,
        parent_id: TextUnitId,
    ) -> WorkspaceResult<()> {
        let node = self.outline.handle_of(node_id)?;
        let parent = self.outline.handle_of(parent_id)?;
        let edit = self.outline.move_under(node, parent)?;
        self.persist_links(&edit.relinked)
    }

    /// Unit ids of one document in pre-order.
    pub fn flatten(&self, document_id: DocumentId) -> WorkspaceResult<Vec<TextUnitId>> {
        let order = self.outline.flatten(document_id)?;
        let mut ids = Vec::with_capacity(order.len());
        for handle in order {
            if let Some(id) = self.outline.id_of(handle)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    pub fn unit_view(&self, id: TextUnitId) -> WorkspaceResult<UnitView> {
        let handle = self.outline.handle_of(id)?;
        let unit = self
            .engine
            .get::<TextUnit>(id)?
            .ok_or(OutlineError::UnknownUnit(id))?;
        let mut children = Vec::new();
        for child in self.outline.children(handle)? {
            if let Some(child_id) = self.outline.id_of(*child)? {
                children.push(child_id);
            }
        }
        Ok(UnitView {
            unit,
            order_key: self.outline.key(handle)?,
            depth: self.outline.depth(handle)?,
            children,
            notes: self.engine.notes_for_unit(id)?,
        })
    }

    /// Views of one document in pre-order.
    pub fn document_views(&self, document_id: DocumentId) -> WorkspaceResult<Vec<UnitView>> {
        self.flatten(document_id)?
            .into_iter()
            .map(|id| self.unit_view(id))
            .collect()
    }

    /// Stops the engine, running the final flush.
    pub fn close(self) -> WorkspaceResult<FlushReport> {
        Ok(self.engine.shutdown()?)
    }

    /// Admits the unit for a freshly inserted node and persists the links of
    /// the neighbours it displaced. The node is dropped again if admission
    /// fails.
    fn admit_inserted(
        &mut self,
        handle: UnitHandle,
        relinked: &[UnitHandle],
    ) -> WorkspaceResult<TextUnitId> {
        let document_id = self.outline.document_of(handle)?;
        let (parent_id, successor_id) = self.outline.link_ids(handle)?;

        let mut unit = TextUnit::new(document_id);
        unit.parent_id = parent_id;
        unit.successor_id = successor_id;
        let admission = match self.engine.add(unit) {
            Ok(admission) => admission,
            Err(err) => {
                if let Err(rollback) = self.outline.remove(handle) {
                    warn!(
                        "event=workspace_insert module=service status=error error_code=rollback_failed error={}",
                        rollback
                    );
                }
                return Err(err.into());
            }
        };
        self.outline.bind_id(handle, admission.id)?;
        self.persist_links(relinked)?;
        Ok(admission.id)
    }

    fn persist_links(&self, relinked: &[UnitHandle]) -> WorkspaceResult<()> {
        for handle in relinked {
            let Some(id) = self.outline.id_of(*handle)? else {
                continue;
            };
            let (parent_id, successor_id) = self.outline.link_ids(*handle)?;
            self.engine.relink_text_unit(id, parent_id, successor_id)?;
        }
        Ok(())
    }
}
