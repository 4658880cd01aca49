//! Dependency graph over stack names.
//!
//! An edge points from a dependency to its dependent, so a topological walk
//! yields deploy order. Construction rejects cycles; every order computed
//! afterwards covers all stacks.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::types::{Stack, StackError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

/// Acyclic dependency graph of a project's stacks.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: BTreeMap<String, NodeIndex>,
}

impl DependencyGraph {
  /// Build the graph from discovered stacks.
  ///
  /// # Errors
  ///
  /// `UnknownDependency` when a stack names a dependency outside `stacks`,
  /// `CyclicDependency` when the dependencies form a cycle.
  pub fn new(stacks: &[Stack]) -> Result<Self, StackError> {
    let mut graph = DiGraph::new();
    let mut nodes = BTreeMap::new();

    let mut sorted: Vec<&Stack> = stacks.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for stack in &sorted {
      let idx = graph.add_node(stack.name.clone());
      nodes.insert(stack.name.clone(), idx);
    }

    for stack in &sorted {
      let dependent = nodes[&stack.name];
      for dep in &stack.dependencies {
        let dependency = *nodes.get(dep).ok_or_else(|| StackError::UnknownDependency {
          stack: stack.name.clone(),
          dependency: dep.clone(),
        })?;
        graph.update_edge(dependency, dependent, ());
      }
    }

    let dag = Self { graph, nodes };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Direct dependencies of `name`, sorted.
  pub fn dependencies(&self, name: &str) -> Vec<String> {
    self.neighbors(name, Direction::Incoming)
  }

  /// Stacks that depend directly on `name`, sorted.
  pub fn dependents(&self, name: &str) -> Vec<String> {
    self.neighbors(name, Direction::Outgoing)
  }

  fn neighbors(&self, name: &str, direction: Direction) -> Vec<String> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut names: Vec<String> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| self.graph[n].clone())
      .collect();
    names.sort();
    names
  }

  /// Three-color depth-first search along "depends on" edges.
  ///
  /// The reported path starts and ends with the same stack.
  fn verify_acyclic(&self) -> Result<(), StackError> {
    let mut marks: HashMap<NodeIndex, Mark> = self.graph.node_indices().map(|n| (n, Mark::Unvisited)).collect();
    let mut path = Vec::new();

    for &idx in self.nodes.values() {
      if marks[&idx] == Mark::Unvisited {
        self.visit(idx, &mut marks, &mut path)?;
      }
    }
    Ok(())
  }

  fn visit(
    &self,
    node: NodeIndex,
    marks: &mut HashMap<NodeIndex, Mark>,
    path: &mut Vec<NodeIndex>,
  ) -> Result<(), StackError> {
    marks.insert(node, Mark::InProgress);
    path.push(node);

    let mut deps: Vec<NodeIndex> = self.graph.neighbors_directed(node, Direction::Incoming).collect();
    deps.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

    for dep in deps {
      match marks[&dep] {
        Mark::InProgress => {
          let start = path.iter().position(|n| *n == dep).unwrap_or(0);
          let mut cycle: Vec<String> = path[start..].iter().map(|n| self.graph[*n].clone()).collect();
          cycle.push(self.graph[dep].clone());
          return Err(StackError::CyclicDependency { path: cycle });
        }
        Mark::Unvisited => self.visit(dep, marks, path)?,
        Mark::Done => {}
      }
    }

    path.pop();
    marks.insert(node, Mark::Done);
    Ok(())
  }

  /// Topological order, dependencies first. Ties go to the smaller name.
  pub fn deploy_order(&self) -> Vec<String> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.graph.neighbors_directed(idx, Direction::Incoming).count()))
      .collect();

    let mut ready: BTreeMap<String, NodeIndex> = self
      .nodes
      .iter()
      .filter(|(_, idx)| in_degree[*idx] == 0)
      .map(|(name, idx)| (name.clone(), *idx))
      .collect();

    let mut order = Vec::with_capacity(self.nodes.len());
    while let Some((name, idx)) = ready.pop_first() {
      order.push(name);
      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        if let Some(degree) = in_degree.get_mut(&dependent) {
          *degree -= 1;
          if *degree == 0 {
            ready.insert(self.graph[dependent].clone(), dependent);
          }
        }
      }
    }
    order
  }

  /// Exact reverse of [`deploy_order`](Self::deploy_order).
  pub fn destroy_order(&self) -> Vec<String> {
    let mut order = self.deploy_order();
    order.reverse();
    order
  }

  /// Group stacks into dependency levels.
  ///
  /// Every stack in wave N depends only on stacks in earlier waves. Names are
  /// sorted within a wave.
  pub fn waves(&self) -> Vec<Vec<String>> {
    let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();
    let mut done: HashSet<NodeIndex> = HashSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
      let mut wave: Vec<NodeIndex> = remaining
        .iter()
        .copied()
        .filter(|idx| {
          self
            .graph
            .neighbors_directed(*idx, Direction::Incoming)
            .all(|dep| done.contains(&dep))
        })
        .collect();

      // Unreachable for a verified graph; guards against looping forever.
      if wave.is_empty() {
        break;
      }

      wave.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
      for idx in &wave {
        remaining.remove(idx);
        done.insert(*idx);
      }
      waves.push(wave.into_iter().map(|idx| self.graph[idx].clone()).collect());
    }
    waves
  }
}

/// Reorder `stacks` into deploy order.
pub fn order_stacks(stacks: Vec<Stack>) -> Result<Vec<Stack>, StackError> {
  let graph = DependencyGraph::new(&stacks)?;
  let mut by_name: BTreeMap<String, Stack> = stacks.into_iter().map(|s| (s.name.clone(), s)).collect();
  Ok(
    graph
      .deploy_order()
      .into_iter()
      .filter_map(|name| by_name.remove(&name))
      .collect(),
  )
}
