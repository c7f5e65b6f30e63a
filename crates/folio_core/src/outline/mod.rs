//! Hierarchical sequencing engine for text units.
//!
//! # Responsibility
//! - Keep the parent/child tree and sibling successor chains of every
//!   document in one arena addressed by [`UnitHandle`].
//! - Allocate floating-point order keys so local insertion never renumbers
//!   siblings.
//! - Report every structural change as an [`OutlineEdit`] for the
//!   synchronization layer.
//!
//! # Invariants
//! - Sibling chains are linear; `predecessor` and `successor` stay symmetric
//!   and mirror the order of the owning `children` (or root) vector.
//! - Keys strictly increase in document pre-order.
//! - `depth` is 0 for leaves and `1 + max(children)` otherwise.
//! - Handles are never reused, so a stale handle fails with `NotFound`.

pub mod keys;
mod load;

use crate::model::{DocumentId, TextUnitId};
use keys::key_between;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OutlineResult<T> = Result<T, OutlineError>;

/// Errors from sequencing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// Handle points at a removed or never-allocated node.
    NotFound(UnitHandle),
    /// No node is bound to this durable id.
    UnknownUnit(TextUnitId),
    /// Document has no units in this outline.
    UnknownDocument(DocumentId),
    /// Move target lives in another document.
    CrossDocumentMove {
        node: UnitHandle,
        target: UnitHandle,
    },
    /// Move would place a node inside its own subtree.
    CycleDetected {
        node: UnitHandle,
        target: UnitHandle,
    },
}

impl Display for OutlineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(handle) => write!(f, "outline node not found: {handle}"),
            Self::UnknownUnit(id) => write!(f, "text unit is not in the outline: {id}"),
            Self::UnknownDocument(id) => write!(f, "document has no outline: {id}"),
            Self::CrossDocumentMove { node, target } => {
                write!(f, "cannot move {node} next to {target} in another document")
            }
            Self::CycleDetected { node, target } => {
                write!(f, "cannot move {node} into its own subtree at {target}")
            }
        }
    }
}

impl Error for OutlineError {}

/// Opaque, stable address of one outline node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitHandle(usize);

impl Display for UnitHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node removed by a structural operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedUnit {
    pub handle: UnitHandle,
    /// Durable id, if one had been bound.
    pub id: Option<TextUnitId>,
}

/// Structural events produced by one outline operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineEdit {
    /// Newly created node, if any.
    pub inserted: Option<UnitHandle>,
    /// Existing nodes whose parent or successor changed.
    pub relinked: Vec<UnitHandle>,
    /// Nodes removed, descendants before ancestors.
    pub removed: Vec<RemovedUnit>,
}

impl OutlineEdit {
    fn insertion(handle: UnitHandle, relinked: Option<UnitHandle>) -> Self {
        Self {
            inserted: Some(handle),
            relinked: relinked.into_iter().collect(),
            removed: Vec::new(),
        }
    }

    fn merge(&mut self, other: OutlineEdit) {
        if other.inserted.is_some() {
            self.inserted = other.inserted;
        }
        for handle in other.relinked {
            if !self.relinked.contains(&handle) {
                self.relinked.push(handle);
            }
        }
        self.removed.extend(other.removed);
        let removed = &self.removed;
        self.relinked
            .retain(|handle| !removed.iter().any(|unit| unit.handle == *handle));
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: Option<TextUnitId>,
    document_id: DocumentId,
    parent: Option<UnitHandle>,
    predecessor: Option<UnitHandle>,
    successor: Option<UnitHandle>,
    children: Vec<UnitHandle>,
    key: f64,
    depth: u32,
}

impl Node {
    fn new(document_id: DocumentId, id: Option<TextUnitId>) -> Self {
        Self {
            id,
            document_id,
            parent: None,
            predecessor: None,
            successor: None,
            children: Vec::new(),
            key: 0.0,
            depth: 0,
        }
    }
}

/// Arena-backed outline of every loaded document.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    nodes: Vec<Option<Node>>,
    roots: BTreeMap<DocumentId, Vec<UnitHandle>>,
    by_id: HashMap<TextUnitId, UnitHandle>,
}

impl Outline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents that currently hold at least one unit.
    pub fn documents(&self) -> Vec<DocumentId> {
        self.roots
            .iter()
            .filter(|(_, roots)| !roots.is_empty())
            .map(|(document_id, _)| *document_id)
            .collect()
    }

    /// Appends a root-level unit at the end of `document_id`.
    ///
    /// Used for the unit seeded with a new document. The previous last root,
    /// if any, is reported as relinked.
    pub fn insert_root(&mut self, document_id: DocumentId) -> OutlineResult<OutlineEdit> {
        let index = self.roots.get(&document_id).map_or(0, Vec::len);
        let handle = self.alloc(document_id, None);
        let predecessor = self.link_at(handle, document_id, None, index)?;
        self.assign_fresh_key(handle)?;
        Ok(OutlineEdit::insertion(handle, predecessor))
    }

    /// Inserts a new first child under `parent`.
    ///
    /// The previous first child becomes the new node's successor.
    pub fn insert_child(&mut self, parent: UnitHandle) -> OutlineResult<OutlineEdit> {
        let document_id = self.node(parent)?.document_id;
        let handle = self.alloc(document_id, None);
        let predecessor = self.link_at(handle, document_id, Some(parent), 0)?;
        self.assign_fresh_key(handle)?;
        self.refresh_depth(Some(parent))?;
        Ok(OutlineEdit::insertion(handle, predecessor))
    }

    /// Inserts a new node immediately after `node` among its siblings.
    ///
    /// `node` is reported as relinked because its successor changes.
    pub fn insert_after(&mut self, node: UnitHandle) -> OutlineResult<OutlineEdit> {
        let (document_id, parent) = {
            let current = self.node(node)?;
            (current.document_id, current.parent)
        };
        let index = self.position(node)? + 1;
        let handle = self.alloc(document_id, None);
        let predecessor = self.link_at(handle, document_id, parent, index)?;
        self.assign_fresh_key(handle)?;
        self.refresh_depth(parent)?;
        Ok(OutlineEdit::insertion(handle, predecessor))
    }

    /// Removes `node` and its whole subtree.
    ///
    /// Sibling keys are untouched; the predecessor is reported as relinked.
    pub fn remove(&mut self, node: UnitHandle) -> OutlineResult<OutlineEdit> {
        let parent = self.node(node)?.parent;
        let subtree = self.subtree(node)?;
        let predecessor = self.unlink(node)?;

        let mut removed = Vec::with_capacity(subtree.len());
        for handle in subtree.into_iter().rev() {
            if let Some(detached) = self.nodes.get_mut(handle.0).and_then(Option::take) {
                if let Some(id) = detached.id {
                    self.by_id.remove(&id);
                }
                removed.push(RemovedUnit {
                    handle,
                    id: detached.id,
                });
            }
        }

        self.refresh_depth(parent)?;
        Ok(OutlineEdit {
            inserted: None,
            relinked: predecessor.into_iter().collect(),
            removed,
        })
    }

    /// Removes every unit of `document_id`.
    pub fn remove_document(&mut self, document_id: DocumentId) -> OutlineResult<OutlineEdit> {
        let roots = self.roots.get(&document_id).cloned().unwrap_or_default();
        let mut edit = OutlineEdit::default();
        for root in roots {
            edit.merge(self.remove(root)?);
        }
        self.roots.remove(&document_id);
        Ok(edit)
    }

    /// Moves `node` with its subtree to sit right after `target`.
    pub fn move_after(
        &mut self,
        node: UnitHandle,
        target: UnitHandle,
    ) -> OutlineResult<OutlineEdit> {
        let document_id = self.check_move(node, target)?;
        let old_parent = self.node(node)?.parent;
        let old_predecessor = self.unlink(node)?;

        let new_parent = self.node(target)?.parent;
        let index = self.position(target)? + 1;
        let new_predecessor = self.link_at(node, document_id, new_parent, index)?;

        self.finish_move(document_id, old_parent, new_parent)?;
        let mut edit = OutlineEdit::default();
        edit.merge(OutlineEdit {
            inserted: None,
            relinked: [Some(node), old_predecessor, new_predecessor]
                .into_iter()
                .flatten()
                .collect(),
            removed: Vec::new(),
        });
        Ok(edit)
    }

    /// Moves `node` with its subtree to become the first child of `parent`.
    pub fn move_under(
        &mut self,
        node: UnitHandle,
        parent: UnitHandle,
    ) -> OutlineResult<OutlineEdit> {
        let document_id = self.check_move(node, parent)?;
        let old_parent = self.node(node)?.parent;
        let old_predecessor = self.unlink(node)?;
        self.link_at(node, document_id, Some(parent), 0)?;

        self.finish_move(document_id, old_parent, Some(parent))?;
        let mut edit = OutlineEdit::default();
        edit.merge(OutlineEdit {
            inserted: None,
            relinked: [Some(node), old_predecessor].into_iter().flatten().collect(),
            removed: Vec::new(),
        });
        Ok(edit)
    }

    /// Reassigns integer keys to `document_id` in pre-order, starting at 0.
    pub fn resequence(&mut self, document_id: DocumentId) -> OutlineResult<()> {
        let order = self.flatten(document_id)?;
        for (index, handle) in order.iter().enumerate() {
            self.node_mut(*handle)?.key = index as f64 * keys::KEY_STEP;
        }
        debug!(
            "event=outline_resequence module=outline status=ok document_id={} units={}",
            document_id,
            order.len()
        );
        Ok(())
    }

    /// Pre-order list of every unit in `document_id`.
    pub fn flatten(&self, document_id: DocumentId) -> OutlineResult<Vec<UnitHandle>> {
        let roots = self
            .roots
            .get(&document_id)
            .ok_or(OutlineError::UnknownDocument(document_id))?;
        let mut order = Vec::new();
        for root in roots {
            order.extend(self.subtree(*root)?);
        }
        Ok(order)
    }

    /// Root-level units of `document_id` in chain order.
    pub fn roots(&self, document_id: DocumentId) -> &[UnitHandle] {
        self.roots.get(&document_id).map_or(&[], Vec::as_slice)
    }

    /// Binds the durable id assigned at admission.
    pub fn bind_id(&mut self, handle: UnitHandle, id: TextUnitId) -> OutlineResult<()> {
        let node = self.node_mut(handle)?;
        if let Some(previous) = node.id.replace(id) {
            self.by_id.remove(&previous);
        }
        self.by_id.insert(id, handle);
        Ok(())
    }

    pub fn handle_of(&self, id: TextUnitId) -> OutlineResult<UnitHandle> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or(OutlineError::UnknownUnit(id))
    }

    pub fn contains(&self, handle: UnitHandle) -> bool {
        self.node(handle).is_ok()
    }

    pub fn id_of(&self, handle: UnitHandle) -> OutlineResult<Option<TextUnitId>> {
        Ok(self.node(handle)?.id)
    }

    pub fn document_of(&self, handle: UnitHandle) -> OutlineResult<DocumentId> {
        Ok(self.node(handle)?.document_id)
    }

    pub fn key(&self, handle: UnitHandle) -> OutlineResult<f64> {
        Ok(self.node(handle)?.key)
    }

    pub fn depth(&self, handle: UnitHandle) -> OutlineResult<u32> {
        Ok(self.node(handle)?.depth)
    }

    pub fn parent(&self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        Ok(self.node(handle)?.parent)
    }

    pub fn successor(&self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        Ok(self.node(handle)?.successor)
    }

    pub fn predecessor(&self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        Ok(self.node(handle)?.predecessor)
    }

    pub fn children(&self, handle: UnitHandle) -> OutlineResult<&[UnitHandle]> {
        Ok(self.node(handle)?.children.as_slice())
    }

    /// Durable ids of the parent and successor, as they would be persisted.
    pub fn link_ids(
        &self,
        handle: UnitHandle,
    ) -> OutlineResult<(Option<TextUnitId>, Option<TextUnitId>)> {
        let node = self.node(handle)?;
        let parent_id = match node.parent {
            Some(parent) => self.node(parent)?.id,
            None => None,
        };
        let successor_id = match node.successor {
            Some(successor) => self.node(successor)?.id,
            None => None,
        };
        Ok((parent_id, successor_id))
    }

    fn alloc(&mut self, document_id: DocumentId, id: Option<TextUnitId>) -> UnitHandle {
        let handle = UnitHandle(self.nodes.len());
        self.nodes.push(Some(Node::new(document_id, id)));
        if let Some(id) = id {
            self.by_id.insert(id, handle);
        }
        handle
    }

    fn node(&self, handle: UnitHandle) -> OutlineResult<&Node> {
        self.nodes
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(OutlineError::NotFound(handle))
    }

    fn node_mut(&mut self, handle: UnitHandle) -> OutlineResult<&mut Node> {
        self.nodes
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(OutlineError::NotFound(handle))
    }

    fn siblings(
        &self,
        document_id: DocumentId,
        parent: Option<UnitHandle>,
    ) -> OutlineResult<&[UnitHandle]> {
        match parent {
            Some(parent) => Ok(self.node(parent)?.children.as_slice()),
            None => Ok(self.roots(document_id)),
        }
    }

    fn siblings_mut(
        &mut self,
        document_id: DocumentId,
        parent: Option<UnitHandle>,
    ) -> OutlineResult<&mut Vec<UnitHandle>> {
        match parent {
            Some(parent) => Ok(&mut self.node_mut(parent)?.children),
            None => Ok(self.roots.entry(document_id).or_default()),
        }
    }

    fn position(&self, handle: UnitHandle) -> OutlineResult<usize> {
        let node = self.node(handle)?;
        self.siblings(node.document_id, node.parent)?
            .iter()
            .position(|sibling| *sibling == handle)
            .ok_or(OutlineError::NotFound(handle))
    }

    /// Splices `handle` into a sibling group at `index`.
    ///
    /// Returns the new predecessor, whose successor now points at `handle`.
    fn link_at(
        &mut self,
        handle: UnitHandle,
        document_id: DocumentId,
        parent: Option<UnitHandle>,
        index: usize,
    ) -> OutlineResult<Option<UnitHandle>> {
        let siblings = self.siblings_mut(document_id, parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, handle);
        let predecessor = index.checked_sub(1).map(|at| siblings[at]);
        let successor = siblings.get(index + 1).copied();

        {
            let node = self.node_mut(handle)?;
            node.parent = parent;
            node.predecessor = predecessor;
            node.successor = successor;
        }
        if let Some(predecessor) = predecessor {
            self.node_mut(predecessor)?.successor = Some(handle);
        }
        if let Some(successor) = successor {
            self.node_mut(successor)?.predecessor = Some(handle);
        }
        Ok(predecessor)
    }

    /// Detaches `handle` from its sibling group, repairing the chain.
    ///
    /// Returns the former predecessor, whose successor changed.
    fn unlink(&mut self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        let (document_id, parent, predecessor, successor) = {
            let node = self.node(handle)?;
            (
                node.document_id,
                node.parent,
                node.predecessor,
                node.successor,
            )
        };
        self.siblings_mut(document_id, parent)?
            .retain(|sibling| *sibling != handle);

        if let Some(predecessor) = predecessor {
            self.node_mut(predecessor)?.successor = successor;
        }
        if let Some(successor) = successor {
            self.node_mut(successor)?.predecessor = predecessor;
        }

        let node = self.node_mut(handle)?;
        node.parent = None;
        node.predecessor = None;
        node.successor = None;
        Ok(predecessor)
    }

    /// Pre-order list of `handle` and its descendants.
    fn subtree(&self, handle: UnitHandle) -> OutlineResult<Vec<UnitHandle>> {
        let mut order = Vec::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.node(current)?.children.iter().rev().copied());
        }
        Ok(order)
    }

    fn last_descendant(&self, handle: UnitHandle) -> OutlineResult<UnitHandle> {
        let mut cursor = handle;
        while let Some(last) = self.node(cursor)?.children.last() {
            cursor = *last;
        }
        Ok(cursor)
    }

    /// Node visited right before `handle` in document pre-order.
    fn preorder_previous(&self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        let node = self.node(handle)?;
        match node.predecessor {
            Some(predecessor) => Ok(Some(self.last_descendant(predecessor)?)),
            None => Ok(node.parent),
        }
    }

    /// First node after the subtree of `handle`, walking up through parents
    /// when no sibling successor exists.
    fn next_after_subtree(&self, handle: UnitHandle) -> OutlineResult<Option<UnitHandle>> {
        let mut cursor = handle;
        loop {
            let node = self.node(cursor)?;
            if let Some(successor) = node.successor {
                return Ok(Some(successor));
            }
            match node.parent {
                Some(parent) => cursor = parent,
                None => return Ok(None),
            }
        }
    }

    /// Gives a freshly linked leaf a key between its pre-order neighbours,
    /// resequencing the document when the gap is exhausted.
    fn assign_fresh_key(&mut self, handle: UnitHandle) -> OutlineResult<()> {
        let lower = match self.preorder_previous(handle)? {
            Some(previous) => Some(self.node(previous)?.key),
            None => None,
        };
        let upper = match self.next_after_subtree(handle)? {
            Some(next) => Some(self.node(next)?.key),
            None => None,
        };

        match key_between(lower, upper) {
            Some(key) => {
                self.node_mut(handle)?.key = key;
                Ok(())
            }
            None => {
                let document_id = self.node(handle)?.document_id;
                debug!(
                    "event=outline_key_exhausted module=outline status=resequence document_id={}",
                    document_id
                );
                self.resequence(document_id)
            }
        }
    }

    /// Recomputes depth from `start` upward, stopping once a value holds.
    fn refresh_depth(&mut self, start: Option<UnitHandle>) -> OutlineResult<()> {
        let mut cursor = start;
        while let Some(handle) = cursor {
            let node = self.node(handle)?;
            let mut depth = 0;
            for child in &node.children {
                depth = depth.max(self.node(*child)?.depth + 1);
            }
            if depth == node.depth {
                break;
            }
            let parent = node.parent;
            self.node_mut(handle)?.depth = depth;
            cursor = parent;
        }
        Ok(())
    }

    fn check_move(&self, node: UnitHandle, target: UnitHandle) -> OutlineResult<DocumentId> {
        let document_id = self.node(node)?.document_id;
        if self.node(target)?.document_id != document_id {
            return Err(OutlineError::CrossDocumentMove { node, target });
        }
        let mut cursor = Some(target);
        while let Some(current) = cursor {
            if current == node {
                return Err(OutlineError::CycleDetected { node, target });
            }
            cursor = self.node(current)?.parent;
        }
        Ok(document_id)
    }

    fn finish_move(
        &mut self,
        document_id: DocumentId,
        old_parent: Option<UnitHandle>,
        new_parent: Option<UnitHandle>,
    ) -> OutlineResult<()> {
        self.resequence(document_id)?;
        self.refresh_depth(old_parent)?;
        self.refresh_depth(new_parent)
    }
}

#[cfg(test)]
mod tests {
    use super::{Outline, OutlineError, UnitHandle};

    fn assert_preorder_keys_increase(outline: &Outline, document_id: i64) {
        let order = outline.flatten(document_id).unwrap();
        for pair in order.windows(2) {
            let left = outline.key(pair[0]).unwrap();
            let right = outline.key(pair[1]).unwrap();
            assert!(left < right, "{} ({left}) !< {} ({right})", pair[0], pair[1]);
        }
    }

    fn root(outline: &mut Outline, document_id: i64) -> UnitHandle {
        outline.insert_root(document_id).unwrap().inserted.unwrap()
    }

    #[test]
    fn first_root_gets_key_zero() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        assert_eq!(outline.key(t0).unwrap(), 0.0);
        assert_eq!(outline.depth(t0).unwrap(), 0);
    }

    #[test]
    fn insert_child_becomes_first_child_with_old_first_as_successor() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        let first = outline.insert_child(t0).unwrap().inserted.unwrap();
        let edit = outline.insert_child(t0).unwrap();
        let newest = edit.inserted.unwrap();

        assert!(edit.relinked.is_empty());
        assert_eq!(outline.children(t0).unwrap(), &[newest, first]);
        assert_eq!(outline.successor(newest).unwrap(), Some(first));
        assert_eq!(outline.predecessor(first).unwrap(), Some(newest));
        assert_preorder_keys_increase(&outline, 1);
    }

    #[test]
    fn insert_child_of_leaf_stays_below_next_sibling() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        let t1 = outline.insert_after(t0).unwrap().inserted.unwrap();
        let child = outline.insert_child(t0).unwrap().inserted.unwrap();

        assert!(outline.key(child).unwrap() < outline.key(t1).unwrap());
        assert_preorder_keys_increase(&outline, 1);
    }

    #[test]
    fn insert_after_reports_predecessor_and_skips_subtree() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        let child = outline.insert_child(t0).unwrap().inserted.unwrap();
        let edit = outline.insert_after(t0).unwrap();
        let sibling = edit.inserted.unwrap();

        assert_eq!(edit.relinked, vec![t0]);
        assert_eq!(outline.successor(t0).unwrap(), Some(sibling));
        assert!(outline.key(child).unwrap() < outline.key(sibling).unwrap());
        assert_preorder_keys_increase(&outline, 1);
    }

    #[test]
    fn repeated_midpoint_insertion_resequences_instead_of_colliding() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        let _tail = outline.insert_after(t0).unwrap().inserted.unwrap();
        for _ in 0..200 {
            outline.insert_after(t0).unwrap();
            assert_preorder_keys_increase(&outline, 1);
        }
        assert_eq!(outline.flatten(1).unwrap().len(), 202);
    }

    #[test]
    fn depth_propagates_up_and_back_down() {
        let mut outline = Outline::new();
        let t0 = root(&mut outline, 1);
        let t1 = outline.insert_child(t0).unwrap().inserted.unwrap();
        let t2 = outline.insert_child(t1).unwrap().inserted.unwrap();
        assert_eq!(outline.depth(t0).unwrap(), 2);
        assert_eq!(outline.depth(t1).unwrap(), 1);

        outline.remove(t2).unwrap();
        assert_eq!(outline.depth(t1).unwrap(), 0);
        assert_eq!(outline.depth(t0).unwrap(), 1);
    }

    #[test]
    fn remove_repairs_chain_and_drops_subtree() {
        let mut outline = Outline::new();
        let a = root(&mut outline, 1);
        let b = outline.insert_after(a).unwrap().inserted.unwrap();
        let c = outline.insert_after(b).unwrap().inserted.unwrap();
        let b_child = outline.insert_child(b).unwrap().inserted.unwrap();
        let key_a = outline.key(a).unwrap();
        let key_c = outline.key(c).unwrap();

        let edit = outline.remove(b).unwrap();
        assert_eq!(edit.relinked, vec![a]);
        assert_eq!(edit.removed.len(), 2);
        assert_eq!(edit.removed[0].handle, b_child);
        assert_eq!(outline.successor(a).unwrap(), Some(c));
        assert_eq!(outline.predecessor(c).unwrap(), Some(a));
        assert_eq!(outline.key(a).unwrap(), key_a);
        assert_eq!(outline.key(c).unwrap(), key_c);
        assert_eq!(outline.key(b), Err(OutlineError::NotFound(b)));
    }

    #[test]
    fn move_rejects_own_subtree_and_other_documents() {
        let mut outline = Outline::new();
        let a = root(&mut outline, 1);
        let child = outline.insert_child(a).unwrap().inserted.unwrap();
        let other = root(&mut outline, 2);

        assert_eq!(
            outline.move_under(a, child),
            Err(OutlineError::CycleDetected {
                node: a,
                target: child
            })
        );
        assert_eq!(
            outline.move_after(a, other),
            Err(OutlineError::CrossDocumentMove {
                node: a,
                target: other
            })
        );
    }

    #[test]
    fn move_after_relinks_both_neighbourhoods() {
        let mut outline = Outline::new();
        let a = root(&mut outline, 1);
        let b = outline.insert_after(a).unwrap().inserted.unwrap();
        let c = outline.insert_after(b).unwrap().inserted.unwrap();

        let edit = outline.move_after(a, c).unwrap();
        assert_eq!(outline.roots(1), &[b, c, a]);
        assert!(edit.relinked.contains(&a));
        assert!(edit.relinked.contains(&c));
        assert_eq!(outline.successor(c).unwrap(), Some(a));
        assert_eq!(outline.successor(a).unwrap(), None);
        assert_preorder_keys_increase(&outline, 1);
    }
}
