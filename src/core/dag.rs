//! Task graph for dependency management.
//!
//! This module provides the `TaskGraph` structure that represents producer to
//! consumer relationships between task specifications as a directed acyclic
//! graph, enabling parallel execution of independent tasks.

use crate::core::task::{TaskId, TaskSpec};
use crate::error::{Error, Result};
use crate::workflow::WorkflowPhase;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A producer to consumer edge, labelled with the report key that flows
/// along it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The report key the consumer reads.
    pub key: String,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// The task dependency graph.
///
/// TaskGraph uses petgraph's DiGraph to represent task dependencies.
/// Nodes are task specs, and edges carry the report key consumed.
/// Node insertion order is preserved and is the graph's canonical order.
pub struct TaskGraph {
    /// The underlying directed graph.
    graph: DiGraph<TaskSpec, Dependency>,
    /// Index mapping from TaskId to NodeIndex for fast lookups.
    task_index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Create a new empty TaskGraph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            task_index: HashMap::new(),
        }
    }

    /// Add a task to the graph.
    ///
    /// Returns the NodeIndex for the added task.
    /// If the task already exists (same TaskId), returns the existing NodeIndex.
    pub fn add_task(&mut self, task: TaskSpec) -> NodeIndex {
        if let Some(&index) = self.task_index.get(&task.id) {
            return index;
        }

        let id = task.id.clone();
        let index = self.graph.add_node(task);
        self.task_index.insert(id, index);
        index
    }

    /// Add a dependency between two tasks.
    ///
    /// The dependency indicates that `from` must complete before `to` can start.
    /// This method validates that adding the dependency won't create a cycle.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Either task is not found in the graph
    /// - Adding the edge would create a cycle
    pub fn add_dependency(&mut self, from: &TaskId, to: &TaskId, key: &str) -> Result<()> {
        let from_index = self
            .task_index
            .get(from)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in graph", from)))?;

        let to_index = self
            .task_index
            .get(to)
            .ok_or_else(|| Error::Validation(format!("Task {} not found in graph", to)))?;

        let edge = self.graph.add_edge(
            *from_index,
            *to_index,
            Dependency {
                key: key.to_string(),
            },
        );

        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::Validation(format!(
                "Adding dependency from {} to {} would create a cycle",
                from, to
            )));
        }

        Ok(())
    }

    /// Get a reference to a task by its ID.
    pub fn get_task(&self, id: &TaskId) -> Option<&TaskSpec> {
        self.task_index
            .get(id)
            .and_then(|&index| self.graph.node_weight(index))
    }

    /// Get the number of tasks in the graph.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of dependencies (edges) in the graph.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if a dependency exists between two tasks.
    pub fn has_dependency(&self, from: &TaskId, to: &TaskId) -> bool {
        if let (Some(&from_idx), Some(&to_idx)) =
            (self.task_index.get(from), self.task_index.get(to))
        {
            self.graph.find_edge(from_idx, to_idx).is_some()
        } else {
            false
        }
    }

    /// Get all tasks that the given task depends on (predecessors).
    pub fn get_dependencies(&self, id: &TaskId) -> Vec<&TaskSpec> {
        if let Some(&index) = self.task_index.get(id) {
            self.graph
                .neighbors_directed(index, petgraph::Direction::Incoming)
                .filter_map(|neighbor| self.graph.node_weight(neighbor))
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Get all tasks in insertion order.
    pub fn all_tasks(&self) -> Vec<&TaskSpec> {
        self.graph.node_weights().collect()
    }

    /// Get all tasks belonging to `phase`, in insertion order.
    pub fn tasks_in_phase(&self, phase: WorkflowPhase) -> Vec<&TaskSpec> {
        self.graph
            .node_weights()
            .filter(|task| task.phase == phase)
            .collect()
    }

    /// Find the task that writes `key`.
    pub fn producer_of(&self, key: &str) -> Option<&TaskSpec> {
        self.graph.node_weights().find(|task| task.output_key == key)
    }

    /// Check if the graph contains a task.
    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.task_index.contains_key(id)
    }

    // ========== Scheduling Operations ==========

    /// Get all tasks ready to execute (dependencies satisfied).
    ///
    /// A task is ready if all of its dependencies (incoming edges) are
    /// in the completed set. Tasks with no dependencies are always ready
    /// if not already completed.
    pub fn ready_tasks<'a>(&'a self, completed: &HashSet<TaskId>) -> Vec<&'a TaskSpec> {
        self.graph
            .node_indices()
            .filter_map(|index| {
                let task = self.graph.node_weight(index)?;

                if completed.contains(&task.id) {
                    return None;
                }

                let deps_satisfied = self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .all(|dep_index| {
                        self.graph
                            .node_weight(dep_index)
                            .map(|dep_task| completed.contains(&dep_task.id))
                            .unwrap_or(false)
                    });

                if deps_satisfied {
                    Some(task)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Get tasks in topological order (respecting dependencies).
    ///
    /// # Errors
    /// Returns an error if the graph contains a cycle (should never happen
    /// since add_dependency validates against cycles).
    pub fn topological_order(&self) -> Result<Vec<&TaskSpec>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let task_name = self
                .graph
                .node_weight(cycle.node_id())
                .map(|t| t.id.as_str())
                .unwrap_or("unknown");
            Error::Validation(format!("Cycle detected at task: {}", task_name))
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index))
            .collect())
    }

    /// Check that the graph has no cycles.
    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
