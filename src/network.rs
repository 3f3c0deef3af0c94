//! Arena store for work items and their relations.
//!
//! Items live in a `Vec` and every relation (parent/child, follows) is kept
//! as slot indices. Cycles in either kind of edge are representable; every
//! walk keeps its own visited set.

use crate::error::{ScheduleError, ScheduleResult};
use crate::work_item::{FollowsRelation, ItemId, WorkItem};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct WorkItemNetwork {
    items: Vec<WorkItem>,
    relations: Vec<FollowsRelation>,
    slots: HashMap<ItemId, usize>,
    children: Vec<Vec<usize>>,
    /// Relation indices where the item is the successor.
    incoming: Vec<Vec<usize>>,
    /// Relation indices where the item is the predecessor.
    outgoing: Vec<Vec<usize>>,
}

impl WorkItemNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        items: Vec<WorkItem>,
        relations: Vec<FollowsRelation>,
    ) -> ScheduleResult<Self> {
        let mut network = Self::new();
        for item in &items {
            if network.slots.insert(item.id, network.items.len()).is_some() {
                return Err(ScheduleError::DuplicateItem(item.id));
            }
            network.items.push(item.clone());
        }
        for item in &network.items {
            if let Some(parent) = item.parent {
                if parent == item.id {
                    return Err(ScheduleError::SelfParent(item.id));
                }
                if !network.slots.contains_key(&parent) {
                    return Err(ScheduleError::UnknownItem(parent));
                }
            }
        }
        for relation in relations {
            network.check_relation(&relation)?;
            if !network.relations.contains(&relation) {
                network.relations.push(relation);
            }
        }
        network.reindex();
        Ok(network)
    }

    fn check_relation(&self, relation: &FollowsRelation) -> ScheduleResult<()> {
        if relation.predecessor == relation.successor {
            return Err(ScheduleError::SelfRelation(relation.successor));
        }
        for id in [relation.predecessor, relation.successor] {
            if !self.slots.contains_key(&id) {
                return Err(ScheduleError::UnknownItem(id));
            }
        }
        Ok(())
    }

    fn reindex(&mut self) {
        self.slots = self
            .items
            .iter()
            .enumerate()
            .map(|(slot, item)| (item.id, slot))
            .collect();
        self.children = vec![Vec::new(); self.items.len()];
        self.incoming = vec![Vec::new(); self.items.len()];
        self.outgoing = vec![Vec::new(); self.items.len()];

        for (slot, item) in self.items.iter().enumerate() {
            if let Some(parent_slot) = item.parent.and_then(|p| self.slots.get(&p).copied()) {
                self.children[parent_slot].push(slot);
            }
        }
        for (idx, relation) in self.relations.iter().enumerate() {
            if let (Some(&from), Some(&to)) = (
                self.slots.get(&relation.predecessor),
                self.slots.get(&relation.successor),
            ) {
                self.outgoing[from].push(idx);
                self.incoming[to].push(idx);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&WorkItem> {
        self.slots.get(&id).map(|&slot| &self.items[slot])
    }

    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }

    pub fn relations(&self) -> &[FollowsRelation] {
        &self.relations
    }

    pub fn next_id(&self) -> ItemId {
        ItemId(self.items.iter().map(|item| item.id.0).max().map_or(1, |max| max + 1))
    }

    pub fn insert(&mut self, item: WorkItem) -> ScheduleResult<()> {
        if self.contains(item.id) {
            return Err(ScheduleError::DuplicateItem(item.id));
        }
        self.check_parent(&item)?;
        self.items.push(item);
        self.reindex();
        Ok(())
    }

    /// Replace the stored item with the same id, keeping relations.
    pub fn update(&mut self, item: WorkItem) -> ScheduleResult<()> {
        let slot = *self
            .slots
            .get(&item.id)
            .ok_or(ScheduleError::UnknownItem(item.id))?;
        self.check_parent(&item)?;
        let reparented = self.items[slot].parent != item.parent;
        self.items[slot] = item;
        if reparented {
            self.reindex();
        }
        Ok(())
    }

    fn check_parent(&self, item: &WorkItem) -> ScheduleResult<()> {
        match item.parent {
            Some(parent) if parent == item.id => Err(ScheduleError::SelfParent(item.id)),
            Some(parent) if !self.contains(parent) => Err(ScheduleError::UnknownItem(parent)),
            _ => Ok(()),
        }
    }

    /// Remove an item and every relation touching it. Its children become
    /// top-level items.
    pub fn remove(&mut self, id: ItemId) -> ScheduleResult<WorkItem> {
        let slot = *self.slots.get(&id).ok_or(ScheduleError::UnknownItem(id))?;
        let removed = self.items.remove(slot);
        for item in &mut self.items {
            if item.parent == Some(id) {
                item.parent = None;
            }
        }
        self.relations
            .retain(|relation| relation.predecessor != id && relation.successor != id);
        self.reindex();
        Ok(removed)
    }

    /// Add a follows relation, replacing the lag of an existing one.
    pub fn add_relation(&mut self, relation: FollowsRelation) -> ScheduleResult<()> {
        self.check_relation(&relation)?;
        match self.relations.iter_mut().find(|existing| {
            existing.predecessor == relation.predecessor && existing.successor == relation.successor
        }) {
            Some(existing) => existing.lag = relation.lag,
            None => {
                self.relations.push(relation);
                self.reindex();
            }
        }
        Ok(())
    }

    pub fn remove_relation(&mut self, predecessor: ItemId, successor: ItemId) -> bool {
        let before = self.relations.len();
        self.relations
            .retain(|r| !(r.predecessor == predecessor && r.successor == successor));
        let removed = self.relations.len() != before;
        if removed {
            self.reindex();
        }
        removed
    }

    pub fn parent(&self, id: ItemId) -> Option<&WorkItem> {
        self.get(id).and_then(|item| item.parent).and_then(|p| self.get(p))
    }

    pub fn children(&self, id: ItemId) -> impl Iterator<Item = &WorkItem> {
        self.slots
            .get(&id)
            .map(|&slot| self.children[slot].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&child| &self.items[child])
    }

    pub fn has_children(&self, id: ItemId) -> bool {
        self.children(id).next().is_some()
    }

    /// Relations in which `id` is the successor.
    pub fn predecessors(&self, id: ItemId) -> impl Iterator<Item = &FollowsRelation> {
        self.relation_slice(id, &self.incoming)
    }

    /// Relations in which `id` is the predecessor.
    pub fn successors(&self, id: ItemId) -> impl Iterator<Item = &FollowsRelation> {
        self.relation_slice(id, &self.outgoing)
    }

    fn relation_slice<'a>(
        &'a self,
        id: ItemId,
        index: &'a [Vec<usize>],
    ) -> impl Iterator<Item = &'a FollowsRelation> {
        self.slots
            .get(&id)
            .map(|&slot| index[slot].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.relations[idx])
    }

    /// Parent chain, nearest first. Stops at the first repeated item.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(|item| item.parent);
        while let Some(parent) = current {
            if !seen.insert(parent) || !self.contains(parent) {
                break;
            }
            chain.push(parent);
            current = self.get(parent).and_then(|item| item.parent);
        }
        chain
    }

    /// All items below `id`, breadth first, excluding `id` itself.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if seen.insert(child.id) {
                    result.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }
        result
    }

    /// Groups of items that form cycles through follows or parent edges.
    pub fn cycles(&self) -> Vec<Vec<ItemId>> {
        let mut graph: DiGraph<ItemId, ()> = DiGraph::with_capacity(self.items.len(), 0);
        let nodes: Vec<NodeIndex> = self.items.iter().map(|item| graph.add_node(item.id)).collect();
        for relation in &self.relations {
            if let (Some(&from), Some(&to)) = (
                self.slots.get(&relation.predecessor),
                self.slots.get(&relation.successor),
            ) {
                graph.add_edge(nodes[from], nodes[to], ());
            }
        }
        for (slot, children) in self.children.iter().enumerate() {
            for &child in children {
                graph.add_edge(nodes[child], nodes[slot], ());
            }
        }
        tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut ids: Vec<ItemId> = component.into_iter().map(|node| graph[node]).collect();
                ids.sort();
                ids
            })
            .collect()
    }
}
