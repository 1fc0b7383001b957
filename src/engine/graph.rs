// ABOUTME: Dependency graph resolution and execution planning
// ABOUTME: Topological ordering with cycle naming and batched parallel planning

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashSet;

use super::error::{EngineError, Result};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    New,
    Visiting,
    Done,
}

/// Dependency graph over named tasks.
///
/// Nodes are added in registration order, which also breaks ties between
/// independent tasks during resolution. The graph seals on the first
/// `resolve` call; adding nodes afterwards is an error.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    indices: IndexMap<String, NodeIndex>,
    declared: IndexMap<String, Vec<String>>,
    sealed: bool,
    edges_built: bool,
    order: Option<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named task with its declared dependencies.
    ///
    /// Dependencies may reference tasks registered later; unknown names are
    /// rejected at resolution time.
    pub fn add_task(&mut self, name: &str, dependencies: Vec<String>) -> Result<()> {
        if self.sealed {
            return Err(EngineError::GraphSealed {
                name: name.to_string(),
            });
        }
        if self.indices.contains_key(name) {
            return Err(EngineError::DuplicateTask {
                name: name.to_string(),
            });
        }
        if dependencies.iter().any(|dep| dep == name) {
            return Err(EngineError::CircularDependency {
                cycle: vec![name.to_string(), name.to_string()],
            });
        }

        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        self.declared.insert(name.to_string(), dependencies);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn task_names(&self) -> Vec<String> {
        self.indices.keys().cloned().collect()
    }

    /// Declared dependencies of a task, in declaration order.
    pub fn dependencies(&self, name: &str) -> Vec<String> {
        self.declared.get(name).cloned().unwrap_or_default()
    }

    /// Tasks that directly depend on the given task. Meaningful after the
    /// first successful `resolve`.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let Some(&index) = self.indices.get(name) else {
            return Vec::new();
        };
        let mut neighbors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .collect();
        neighbors.sort_unstable();
        neighbors
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect()
    }

    fn build_edges(&mut self) -> Result<()> {
        if self.edges_built {
            return Ok(());
        }
        for (task, dependencies) in &self.declared {
            let Some(&task_index) = self.indices.get(task) else {
                continue;
            };
            for dependency in dependencies {
                let dependency_index = self.indices.get(dependency).copied().ok_or_else(|| {
                    EngineError::UnknownDependency {
                        task: task.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                // Edge points dependency -> dependent.
                self.graph.update_edge(dependency_index, task_index, ());
            }
        }
        self.edges_built = true;
        Ok(())
    }

    /// Dependencies of a node in registration order.
    fn dependency_indices(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Resolve the execution order.
    ///
    /// Iterative depth-first topological sort: a node is marked "visiting"
    /// while its dependency subtree is walked, and re-encountering a visiting
    /// node aborts with the offending cycle named. Every dependency precedes
    /// its dependents; ties between independent tasks follow registration
    /// order. The first call seals the graph and the result is cached.
    pub fn resolve(&mut self) -> Result<Vec<String>> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }
        self.sealed = true;
        self.build_edges()?;

        let mut marks = vec![Mark::New; self.graph.node_count()];
        let mut order: Vec<NodeIndex> = Vec::with_capacity(self.graph.node_count());

        for &root in self.indices.values() {
            if marks[root.index()] != Mark::New {
                continue;
            }
            marks[root.index()] = Mark::Visiting;
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
                vec![(root, self.dependency_indices(root), 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if frame.2 < frame.1.len() {
                    let dependency = frame.1[frame.2];
                    frame.2 += 1;
                    match marks[dependency.index()] {
                        Mark::Done => {}
                        Mark::New => {
                            marks[dependency.index()] = Mark::Visiting;
                            let deps = self.dependency_indices(dependency);
                            stack.push((dependency, deps, 0));
                        }
                        Mark::Visiting => {
                            let start = stack
                                .iter()
                                .position(|(n, _, _)| *n == dependency)
                                .unwrap_or(0);
                            let mut cycle: Vec<String> = stack[start..]
                                .iter()
                                .map(|(n, _, _)| self.graph[*n].clone())
                                .collect();
                            cycle.push(self.graph[dependency].clone());
                            return Err(EngineError::CircularDependency { cycle });
                        }
                    }
                } else {
                    marks[node.index()] = Mark::Done;
                    order.push(node);
                    stack.pop();
                }
            }
        }

        let names: Vec<String> = order.iter().map(|&n| self.graph[n].clone()).collect();
        self.order = Some(names.clone());
        Ok(names)
    }

    /// Group the resolved order into batches of mutually independent tasks.
    ///
    /// Tasks within a batch have all dependencies satisfied by earlier
    /// batches and can execute concurrently.
    pub fn execution_batches(&mut self) -> Result<Vec<Vec<String>>> {
        let order = self.resolve()?;
        let order_indices: Vec<NodeIndex> = order
            .iter()
            .filter_map(|name| self.indices.get(name).copied())
            .collect();

        let mut batches = Vec::new();
        let mut done: HashSet<NodeIndex> = HashSet::new();
        let mut remaining = order_indices;

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<NodeIndex>, Vec<NodeIndex>) =
                remaining.into_iter().partition(|&node| {
                    self.graph
                        .neighbors_directed(node, Direction::Incoming)
                        .all(|dep| done.contains(&dep))
                });

            if ready.is_empty() {
                // Unreachable after a successful resolve.
                break;
            }

            done.extend(ready.iter().copied());
            batches.push(ready.into_iter().map(|n| self.graph[n].clone()).collect());
            remaining = blocked;
        }

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(entries: &[(&str, &[&str])]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (name, deps) in entries {
            graph
                .add_task(name, deps.iter().map(|d| d.to_string()).collect())
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_resolve_orders_dependencies_first() {
        let mut graph = graph_of(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);

        let order = graph.resolve().unwrap();
        let position =
            |name: &str| order.iter().position(|n| n == name).unwrap();

        assert!(position("a") < position("b"));
        assert!(position("a") < position("c"));
        assert!(position("b") < position("d"));
        assert!(position("c") < position("d"));
    }

    #[test]
    fn test_ties_follow_registration_order() {
        let mut graph = graph_of(&[("x", &[]), ("m", &[]), ("a", &[])]);
        assert_eq!(graph.resolve().unwrap(), vec!["x", "m", "a"]);
    }

    #[test]
    fn test_dependencies_registered_later_resolve_first() {
        let mut graph = graph_of(&[("last", &["first"]), ("first", &[])]);
        assert_eq!(graph.resolve().unwrap(), vec!["first", "last"]);
    }

    #[test]
    fn test_cycle_is_named() {
        let mut graph = graph_of(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]);

        let err = graph.resolve().unwrap_err();
        match err {
            EngineError::CircularDependency { cycle } => {
                assert!(cycle.len() >= 3);
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("expected circular dependency, got {other}"),
        }
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut graph = DependencyGraph::new();
        let err = graph
            .add_task("loop", vec!["loop".to_string()])
            .unwrap_err();
        assert!(matches!(err, EngineError::CircularDependency { .. }));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let mut graph = graph_of(&[("a", &[])]);
        let err = graph.add_task("a", Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTask { .. }));
    }

    #[test]
    fn test_unknown_dependency_rejected_at_resolve() {
        let mut graph = graph_of(&[("a", &["ghost"])]);
        let err = graph.resolve().unwrap_err();
        assert!(matches!(err, EngineError::UnknownDependency { .. }));
    }

    #[test]
    fn test_sealed_after_resolve() {
        let mut graph = graph_of(&[("a", &[])]);
        graph.resolve().unwrap();

        let err = graph.add_task("b", Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::GraphSealed { .. }));
    }

    #[test]
    fn test_execution_batches() {
        let mut graph = graph_of(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);

        let batches = graph.execution_batches().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec!["a"]);
        assert_eq!(batches[1].len(), 2);
        assert!(batches[1].contains(&"b".to_string()));
        assert!(batches[1].contains(&"c".to_string()));
        assert_eq!(batches[2], vec!["d"]);
    }

    #[test]
    fn test_dependents_query() {
        let mut graph = graph_of(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        graph.resolve().unwrap();

        assert_eq!(graph.dependents("a"), vec!["b", "c"]);
        assert!(graph.dependents("b").is_empty());
        assert_eq!(graph.dependencies("b"), vec!["a"]);
    }

    #[test]
    fn test_resolve_is_cached() {
        let mut graph = graph_of(&[("a", &[]), ("b", &["a"])]);
        let first = graph.resolve().unwrap();
        let second = graph.resolve().unwrap();
        assert_eq!(first, second);
    }
}
