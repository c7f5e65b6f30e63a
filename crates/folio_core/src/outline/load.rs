//! Materializes an outline from persisted text unit records.
//!
//! Sibling groups are ordered from their successor chains. Persisted data
//! that breaks the chain invariants is repaired deterministically (by id)
//! instead of being rejected, so one bad row cannot hide a document.

use super::{Node, Outline, UnitHandle};
use crate::model::text_unit::TextUnit;
use crate::model::{DocumentId, TextUnitId};
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

type GroupKey = (DocumentId, Option<TextUnitId>);

impl Outline {
    /// Builds an outline for every document in `units`, then resequences.
    ///
    /// Units without a durable id are ignored. A unit whose parent is
    /// missing or belongs to another document is promoted to root level.
    pub fn load(units: &[TextUnit]) -> Self {
        let mut outline = Outline::new();
        let mut records: BTreeMap<TextUnitId, &TextUnit> = BTreeMap::new();
        for unit in units {
            match unit.id {
                Some(id) => {
                    records.insert(id, unit);
                }
                None => warn!(
                    "event=outline_load module=outline status=skipped reason=missing_id document_id={}",
                    unit.document_id
                ),
            }
        }

        for (id, unit) in &records {
            outline.alloc(unit.document_id, Some(*id));
        }

        let mut groups: BTreeMap<GroupKey, Vec<&TextUnit>> = BTreeMap::new();
        for unit in records.values() {
            let parent_id = unit.parent_id.filter(|parent_id| {
                records
                    .get(parent_id)
                    .is_some_and(|parent| parent.document_id == unit.document_id)
            });
            if parent_id != unit.parent_id {
                warn!(
                    "event=outline_load module=outline status=repaired reason=dangling_parent document_id={}",
                    unit.document_id
                );
            }
            groups
                .entry((unit.document_id, parent_id))
                .or_default()
                .push(unit);
        }

        for ((document_id, parent_id), members) in &groups {
            let ordered: Vec<UnitHandle> = order_sibling_chain(*document_id, members)
                .into_iter()
                .filter_map(|id| outline.by_id.get(&id).copied())
                .collect();
            let parent = parent_id.and_then(|id| outline.by_id.get(&id).copied());
            for handle in &ordered {
                if let Some(node) = outline.nodes[handle.0].as_mut() {
                    node.parent = parent;
                }
            }
            match parent {
                Some(parent) => {
                    if let Some(node) = outline.nodes[parent.0].as_mut() {
                        node.children = ordered;
                    }
                }
                None => {
                    outline.roots.insert(*document_id, ordered);
                }
            }
        }

        outline.detach_parent_cycles();
        outline.rebuild_chain_pointers();

        let documents: Vec<DocumentId> = outline.roots.keys().copied().collect();
        for document_id in documents {
            if outline.resequence(document_id).is_err() {
                continue;
            }
            outline.recompute_depths(document_id);
        }
        outline
    }

    /// Promotes nodes unreachable from any root, which only happens when
    /// persisted parent links form a cycle.
    fn detach_parent_cycles(&mut self) {
        loop {
            let mut reachable: HashSet<UnitHandle> = HashSet::new();
            for roots in self.roots.values() {
                for root in roots {
                    if let Ok(subtree) = self.subtree(*root) {
                        reachable.extend(subtree);
                    }
                }
            }

            let orphan = (0..self.nodes.len())
                .map(UnitHandle)
                .find(|handle| self.nodes[handle.0].is_some() && !reachable.contains(handle));
            let Some(orphan) = orphan else {
                return;
            };

            let (document_id, parent) = match self.nodes[orphan.0].as_ref() {
                Some(node) => (node.document_id, node.parent),
                None => return,
            };
            warn!(
                "event=outline_load module=outline status=repaired reason=parent_cycle document_id={}",
                document_id
            );
            if let Some(parent) = parent {
                if let Some(node) = self.nodes[parent.0].as_mut() {
                    node.children.retain(|child| *child != orphan);
                }
            }
            if let Some(node) = self.nodes[orphan.0].as_mut() {
                node.parent = None;
            }
            self.roots.entry(document_id).or_default().push(orphan);
        }
    }

    /// Derives predecessor/successor pointers from sibling vector order.
    fn rebuild_chain_pointers(&mut self) {
        let mut groups: Vec<Vec<UnitHandle>> = self.roots.values().cloned().collect();
        groups.extend(
            self.nodes
                .iter()
                .flatten()
                .map(|node: &Node| node.children.clone()),
        );
        for group in groups {
            for (index, handle) in group.iter().enumerate() {
                let predecessor = index.checked_sub(1).map(|at| group[at]);
                let successor = group.get(index + 1).copied();
                if let Some(node) = self.nodes[handle.0].as_mut() {
                    node.predecessor = predecessor;
                    node.successor = successor;
                }
            }
        }
    }

    /// Bottom-up depth pass; reverse pre-order visits children first.
    fn recompute_depths(&mut self, document_id: DocumentId) {
        let Ok(order) = self.flatten(document_id) else {
            return;
        };
        for handle in order.into_iter().rev() {
            let depth = match self.nodes[handle.0].as_ref() {
                Some(node) => node
                    .children
                    .iter()
                    .filter_map(|child| self.nodes[child.0].as_ref())
                    .map(|child| child.depth + 1)
                    .max()
                    .unwrap_or(0),
                None => continue,
            };
            if let Some(node) = self.nodes[handle.0].as_mut() {
                node.depth = depth;
            }
        }
    }
}

/// Orders one sibling group by walking its successor chain from the head.
///
/// The head is the member no other member names as successor. A broken
/// chain with several heads is walked head by head in id order; members only
/// reachable through a cycle are appended in id order.
fn order_sibling_chain(document_id: DocumentId, members: &[&TextUnit]) -> Vec<TextUnitId> {
    let by_id: HashMap<TextUnitId, &TextUnit> = members
        .iter()
        .filter_map(|unit| unit.id.map(|id| (id, *unit)))
        .collect();
    let referenced: HashSet<TextUnitId> = members
        .iter()
        .filter_map(|unit| unit.successor_id)
        .filter(|id| by_id.contains_key(id))
        .collect();
    let heads: BTreeSet<TextUnitId> = by_id
        .keys()
        .copied()
        .filter(|id| !referenced.contains(id))
        .collect();

    let mut ordered = Vec::with_capacity(by_id.len());
    let mut visited = HashSet::with_capacity(by_id.len());
    for head in &heads {
        let mut cursor = Some(*head);
        while let Some(id) = cursor {
            if !visited.insert(id) {
                break;
            }
            ordered.push(id);
            cursor = by_id
                .get(&id)
                .and_then(|unit| unit.successor_id)
                .filter(|next| by_id.contains_key(next));
        }
    }

    if ordered.len() != by_id.len() || heads.len() > 1 {
        warn!(
            "event=outline_load module=outline status=repaired reason=broken_chain document_id={} members={} chained={}",
            document_id,
            by_id.len(),
            ordered.len()
        );
        let rest: BTreeSet<TextUnitId> = by_id
            .keys()
            .copied()
            .filter(|id| !visited.contains(id))
            .collect();
        ordered.extend(rest);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::order_sibling_chain;
    use crate::model::text_unit::TextUnit;
    use crate::outline::Outline;

    fn unit(id: i64, parent_id: Option<i64>, successor_id: Option<i64>) -> TextUnit {
        let mut unit = TextUnit::new(1);
        unit.id = Some(id);
        unit.parent_id = parent_id;
        unit.successor_id = successor_id;
        unit
    }

    #[test]
    fn chain_order_follows_successors_not_ids() {
        let units = [unit(1, None, None), unit(2, None, Some(3)), unit(3, None, Some(1))];
        let members: Vec<&TextUnit> = units.iter().collect();
        assert_eq!(order_sibling_chain(1, &members), vec![2, 3, 1]);
    }

    #[test]
    fn broken_chain_appends_leftovers_by_id() {
        let units = [unit(5, None, None), unit(4, None, None), unit(9, None, Some(5))];
        let members: Vec<&TextUnit> = units.iter().collect();
        assert_eq!(order_sibling_chain(1, &members), vec![4, 9, 5]);
    }

    #[test]
    fn load_assigns_preorder_integer_keys_and_depths() {
        let units = [
            unit(1, None, Some(4)),
            unit(2, Some(1), Some(3)),
            unit(3, Some(1), None),
            unit(4, None, None),
        ];
        let outline = Outline::load(&units);
        let order: Vec<i64> = outline
            .flatten(1)
            .unwrap()
            .into_iter()
            .map(|handle| outline.id_of(handle).unwrap().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4]);

        let first = outline.handle_of(1).unwrap();
        assert_eq!(outline.key(first).unwrap(), 0.0);
        assert_eq!(outline.key(outline.handle_of(4).unwrap()).unwrap(), 3.0);
        assert_eq!(outline.depth(first).unwrap(), 1);
        assert_eq!(outline.successor(first).unwrap(), outline.handle_of(4).ok());
    }

    #[test]
    fn parent_cycle_is_promoted_to_root() {
        let units = [unit(1, Some(2), None), unit(2, Some(1), None)];
        let outline = Outline::load(&units);
        assert_eq!(outline.flatten(1).unwrap().len(), 2);
    }
}
