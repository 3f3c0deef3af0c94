pub mod dependency;
pub mod dependency_graph;

pub use dependency::{Dependency, ScheduleDependency};
pub use dependency_graph::DependencyGraph;
