use super::dependency::{Dependency, ScheduleDependency};
use crate::work_item::ItemId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Index over the dependencies of one propagation pass. Edges point from a
/// dependent item to the items it reads.
pub struct DependencyGraph<'a> {
    model: &'a ScheduleDependency,
    graph: DiGraph<ItemId, ()>,
    nodes: HashMap<ItemId, NodeIndex>,
    closures: RefCell<HashMap<ItemId, HashSet<ItemId>>>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new(model: &'a ScheduleDependency) -> Self {
        let mut graph = DiGraph::with_capacity(model.len(), 0);
        let nodes: HashMap<ItemId, NodeIndex> = model
            .dependencies()
            .iter()
            .map(|dependency| (dependency.item(), graph.add_node(dependency.item())))
            .collect();

        for dependency in model.dependencies() {
            let to = nodes[&dependency.item()];
            for downstream in dependency.dependent_ids() {
                if let Some(&from) = nodes.get(downstream) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self {
            model,
            graph,
            nodes,
            closures: RefCell::new(HashMap::new()),
        }
    }

    /// Whether `candidate` reads, directly or transitively, the item that
    /// `dependency` stands for. An item never depends on itself, even when it
    /// sits on a cycle.
    pub fn depends_on(&self, candidate: ItemId, dependency: &Dependency) -> bool {
        self.depends_on_item(candidate, dependency.item())
    }

    pub fn depends_on_item(&self, candidate: ItemId, target: ItemId) -> bool {
        if candidate == target {
            return false;
        }
        self.with_closure(candidate, |closure| closure.contains(&target))
    }

    fn with_closure<R>(&self, start: ItemId, f: impl FnOnce(&HashSet<ItemId>) -> R) -> R {
        if let Some(closure) = self.closures.borrow().get(&start) {
            return f(closure);
        }
        let closure = self.transitive_dependencies(start);
        let result = f(&closure);
        self.closures.borrow_mut().insert(start, closure);
        result
    }

    fn transitive_dependencies(&self, start: ItemId) -> HashSet<ItemId> {
        let Some(&node) = self.nodes.get(&start) else {
            return HashSet::new();
        };
        let mut reached = HashSet::new();
        let mut dfs = Dfs::new(&self.graph, node);
        while let Some(next) = dfs.next(&self.graph) {
            let id = self.graph[next];
            if id != start {
                reached.insert(id);
            }
        }
        reached
    }

    /// Items in an order where each comes after everything it reads. Items on
    /// a cycle are released together in discovery order.
    #[instrument(skip(self), fields(moved = %self.model.moved(), items = self.model.len()))]
    pub fn schedule_order(&self) -> Vec<ItemId> {
        let mut pending: Vec<ItemId> = self
            .model
            .dependencies()
            .iter()
            .map(Dependency::item)
            .collect();
        let mut order = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|&candidate| self.is_ready(candidate, &pending))
                .unwrap_or_else(|| {
                    debug!(item = %pending[0], "no ready item, forcing first pending");
                    0
                });
            order.push(pending.remove(ready));
        }
        order
    }

    /// Ready when every pending item it reads is on a cycle with it.
    fn is_ready(&self, candidate: ItemId, pending: &[ItemId]) -> bool {
        pending.iter().all(|&other| {
            !self.depends_on_item(candidate, other) || self.depends_on_item(other, candidate)
        })
    }

    /// Groups of in-pass items that read each other.
    pub fn cycles(&self) -> Vec<Vec<ItemId>> {
        let mut cycles: Vec<Vec<ItemId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut ids: Vec<ItemId> = component.into_iter().map(|node| self.graph[node]).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::WorkItemNetwork;
    use crate::work_item::{FollowsRelation, WorkItem};

    fn chain() -> WorkItemNetwork {
        let items = (1..=3).map(|id| WorkItem::new(ItemId(id), format!("item {id}"))).collect();
        WorkItemNetwork::from_parts(
            items,
            vec![
                FollowsRelation::new(ItemId(1), ItemId(2), 0),
                FollowsRelation::new(ItemId(2), ItemId(3), 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn transitive_dependency_is_reported() {
        let model = ScheduleDependency::build(&chain(), ItemId(1), None);
        let graph = DependencyGraph::new(&model);
        let first = model.get(ItemId(1)).unwrap();
        assert!(graph.depends_on(ItemId(3), first));
        assert!(!graph.depends_on(ItemId(1), model.get(ItemId(3)).unwrap()));
    }

    #[test]
    fn order_puts_predecessors_first() {
        let model = ScheduleDependency::build(&chain(), ItemId(1), None);
        let graph = DependencyGraph::new(&model);
        assert_eq!(graph.schedule_order(), vec![ItemId(1), ItemId(2), ItemId(3)]);
        assert!(graph.cycles().is_empty());
    }
}
