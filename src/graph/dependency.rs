use crate::calendar::{Calendar, DayCounting};
use crate::network::WorkItemNetwork;
use crate::work_item::{FollowsRelation, ItemId, TemporalValues};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::instrument;

/// One item to revisit in a propagation pass, with its edges restricted to
/// the other items of the same pass.
#[derive(Debug, Clone)]
pub struct Dependency {
    item: ItemId,
    has_children: bool,
    /// Follows relations whose successor is the item itself.
    own_follows: Vec<FollowsRelation>,
    /// Follows relations whose successor is one of the item's ancestors.
    inherited_follows: Vec<FollowsRelation>,
    dependency_ids: Vec<ItemId>,
    dependent_ids: Vec<ItemId>,
}

impl Dependency {
    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// In-pass items whose new values this item reads: its children and the
    /// predecessors of the item and its ancestors.
    pub fn dependency_ids(&self) -> &[ItemId] {
        &self.dependency_ids
    }

    /// In-pass items that must be revisited after this one changes: the
    /// inverse of `dependency_ids`.
    pub fn dependent_ids(&self) -> &[ItemId] {
        &self.dependent_ids
    }

    /// Earliest start allowed by the predecessors of the item and of all its
    /// ancestors, with the predecessor imposing it.
    pub fn soonest_start_date<C, F>(
        &self,
        values: F,
        calendar: &C,
        counting: DayCounting,
    ) -> Option<(NaiveDate, ItemId)>
    where
        C: Calendar + ?Sized,
        F: Fn(ItemId) -> Option<TemporalValues>,
    {
        Self::latest_constraint(
            self.own_follows.iter().chain(&self.inherited_follows),
            values,
            calendar,
            counting,
        )
    }

    /// Earliest start the parent offers: the predecessors of the ancestors
    /// only.
    pub fn parent_soonest_start_date<C, F>(
        &self,
        values: F,
        calendar: &C,
        counting: DayCounting,
    ) -> Option<(NaiveDate, ItemId)>
    where
        C: Calendar + ?Sized,
        F: Fn(ItemId) -> Option<TemporalValues>,
    {
        Self::latest_constraint(self.inherited_follows.iter(), values, calendar, counting)
    }

    fn latest_constraint<'r, C, F>(
        relations: impl Iterator<Item = &'r FollowsRelation>,
        values: F,
        calendar: &C,
        counting: DayCounting,
    ) -> Option<(NaiveDate, ItemId)>
    where
        C: Calendar + ?Sized,
        F: Fn(ItemId) -> Option<TemporalValues>,
    {
        relations
            .filter_map(|relation| {
                let predecessor_end = values(relation.predecessor)?.span_end()?;
                let start = calendar.successor_soonest_start(predecessor_end, relation.lag, counting)?;
                Some((start, relation.predecessor))
            })
            .max_by_key(|(start, _)| *start)
    }
}

/// The closure of items whose dates may change when one item moves.
#[derive(Debug, Clone)]
pub struct ScheduleDependency {
    moved: ItemId,
    dependencies: Vec<Dependency>,
    index: HashMap<ItemId, usize>,
}

impl ScheduleDependency {
    /// Collect every item reachable from `moved` through parent edges
    /// (ancestors re-derive their span) and follows edges (successors and
    /// their descendants move). `former_parent` is included when the item was
    /// just reparented.
    #[instrument(skip(network))]
    pub fn build(network: &WorkItemNetwork, moved: ItemId, former_parent: Option<ItemId>) -> Self {
        let ids = Self::affected_ids(network, moved, former_parent);
        let members: HashSet<ItemId> = ids.iter().copied().collect();

        let mut dependencies: Vec<Dependency> = ids
            .iter()
            .map(|&id| Self::dependency_for(network, id, &members))
            .collect();
        let index: HashMap<ItemId, usize> = dependencies
            .iter()
            .enumerate()
            .map(|(idx, dependency)| (dependency.item, idx))
            .collect();

        let mut dependents: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for dependency in &dependencies {
            for &upstream in &dependency.dependency_ids {
                dependents.entry(upstream).or_default().push(dependency.item);
            }
        }
        for dependency in &mut dependencies {
            dependency.dependent_ids = dependents.remove(&dependency.item).unwrap_or_default();
        }

        Self {
            moved,
            dependencies,
            index,
        }
    }

    fn affected_ids(
        network: &WorkItemNetwork,
        moved: ItemId,
        former_parent: Option<ItemId>,
    ) -> Vec<ItemId> {
        let mut queue: VecDeque<ItemId> = VecDeque::from([moved]);
        queue.extend(network.descendants(moved));
        queue.extend(former_parent.filter(|id| network.contains(*id)));

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            ordered.push(id);

            if let Some(parent) = network.parent(id) {
                queue.push_back(parent.id);
            }
            for relation in network.successors(id) {
                queue.push_back(relation.successor);
                queue.extend(network.descendants(relation.successor));
            }
        }
        ordered
    }

    fn dependency_for(network: &WorkItemNetwork, id: ItemId, members: &HashSet<ItemId>) -> Dependency {
        let own_follows: Vec<FollowsRelation> = network.predecessors(id).copied().collect();
        let inherited_follows: Vec<FollowsRelation> = network
            .ancestors(id)
            .into_iter()
            .flat_map(|ancestor| network.predecessors(ancestor).copied().collect::<Vec<_>>())
            .collect();

        let mut dependency_ids = Vec::new();
        let upstream = network
            .children(id)
            .map(|child| child.id)
            .chain(own_follows.iter().chain(&inherited_follows).map(|r| r.predecessor));
        for candidate in upstream {
            if candidate != id && members.contains(&candidate) && !dependency_ids.contains(&candidate) {
                dependency_ids.push(candidate);
            }
        }

        Dependency {
            item: id,
            has_children: network.has_children(id),
            own_follows,
            inherited_follows,
            dependency_ids,
            dependent_ids: Vec::new(),
        }
    }

    pub fn moved(&self) -> ItemId {
        self.moved
    }

    /// Dependencies in discovery order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn get(&self, id: ItemId) -> Option<&Dependency> {
        self.index.get(&id).map(|&idx| &self.dependencies[idx])
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::WorkItem;

    fn network() -> WorkItemNetwork {
        // 1 -> 2 (follows), 2 has children 3 and 4, 5 is unrelated
        let items = vec![
            WorkItem::new(ItemId(1), "pred"),
            WorkItem::new(ItemId(2), "parent"),
            WorkItem::new(ItemId(3), "child a").with_parent(ItemId(2)),
            WorkItem::new(ItemId(4), "child b").with_parent(ItemId(2)),
            WorkItem::new(ItemId(5), "unrelated"),
        ];
        WorkItemNetwork::from_parts(items, vec![FollowsRelation::new(ItemId(1), ItemId(2), 0)]).unwrap()
    }

    #[test]
    fn closure_reaches_successor_descendants_and_ancestors() {
        let model = ScheduleDependency::build(&network(), ItemId(1), None);
        assert!(model.contains(ItemId(2)));
        assert!(model.contains(ItemId(3)));
        assert!(model.contains(ItemId(4)));
        assert!(!model.contains(ItemId(5)));
    }

    #[test]
    fn children_inherit_the_parents_predecessors() {
        let model = ScheduleDependency::build(&network(), ItemId(1), None);
        let child = model.get(ItemId(3)).unwrap();
        assert_eq!(child.dependency_ids(), &[ItemId(1)]);

        let parent = model.get(ItemId(2)).unwrap();
        assert_eq!(parent.dependency_ids(), &[ItemId(3), ItemId(4), ItemId(1)]);

        let pred = model.get(ItemId(1)).unwrap();
        assert!(pred.dependency_ids().is_empty());
        assert_eq!(pred.dependent_ids(), &[ItemId(2), ItemId(3), ItemId(4)]);
    }
}
