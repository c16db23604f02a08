// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashMap;
use std::collections::HashSet;

use deno_semver::StackString;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::PackageGraph;
use crate::PackageId;
use crate::PackageIdent;
use crate::PackageLocator;

/// A unique handle to a node in the work tree arena. Clones made while
/// decoupling get fresh handles; handles are never reused, so a handle held
/// across mutations always points at the node it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct WorkNodeId(u32);

/// The mutable node the hoisting passes operate on.
#[derive(Debug, Clone)]
pub(crate) struct WorkNode {
  /// Alias under the parent.
  pub name: StackString,
  /// Grows when equal-identity instances merge at a hoist root.
  pub references: IndexSet<StackString>,
  pub locator: PackageLocator,
  pub ident: PackageIdent,
  /// The current view, mutated by hoisting.
  pub dependencies: IndexMap<StackString, WorkNodeId>,
  /// Immutable record of what was declared at import time; consulted by the
  /// self-check only.
  pub original_dependencies: IndexMap<StackString, WorkNodeId>,
  /// Dependencies that used to live here but were moved toward a hoist
  /// root. Kept so descendants know the name is already claimed above.
  pub hoisted_dependencies: IndexMap<StackString, WorkNodeId>,
  pub peer_names: IndexSet<StackString>,
  /// Why a child with the given name could not be hoisted. Diagnostics
  /// only, populated at `DebugLevel::Reasons` and above.
  pub reasons: IndexMap<StackString, String>,
  /// True iff this node is reachable through a single path from the tree
  /// root. Only decoupled nodes may be mutated in place; a coupled node is
  /// cloned first.
  pub decoupled: bool,
  pub hoist_priority: u32,
  /// This node must not be hoisted out of its parent, and hoisting never
  /// crosses it.
  pub hoist_border: bool,
}

/// Arena holding every work node, including nodes that have been replaced
/// by decoupled clones (hoisted-dependency records may still point at them).
pub(crate) struct WorkTree {
  nodes: Vec<WorkNode>,
}

impl WorkTree {
  /// Imports the input graph into a fresh work tree.
  ///
  /// Decoupling status is a property of the path, not the node: a package
  /// reached a second time gains a second parent, so everything reachable
  /// from it (skipping peer edges) is marked coupled and will be cloned
  /// before any mutation.
  pub fn from_package_graph(
    graph: &PackageGraph,
    hoisting_limits: &HashMap<PackageLocator, HashSet<StackString>>,
  ) -> Self {
    let root_info = graph.package(graph.root());
    let mut tree = Self {
      nodes: vec![WorkNode {
        name: root_info.name.clone(),
        references: IndexSet::from([root_info.reference.clone()]),
        locator: root_info.locator(),
        ident: root_info.ident(),
        dependencies: Default::default(),
        original_dependencies: Default::default(),
        hoisted_dependencies: Default::default(),
        peer_names: root_info.peer_names.clone(),
        reasons: Default::default(),
        decoupled: true,
        hoist_priority: root_info.hoist_priority,
        hoist_border: false,
      }],
    };
    let root = WorkNodeId(0);
    let mut seen = HashMap::from([(graph.root(), root)]);
    for dep in graph.dependencies(graph.root()) {
      tree.import_node(graph, hoisting_limits, &mut seen, dep, root);
    }
    tree
  }

  fn import_node(
    &mut self,
    graph: &PackageGraph,
    hoisting_limits: &HashMap<PackageLocator, HashSet<StackString>>,
    seen: &mut HashMap<PackageId, WorkNodeId>,
    package: PackageId,
    parent: WorkNodeId,
  ) {
    let already_seen = seen.get(&package).copied();
    let work_id = match already_seen {
      Some(id) => id,
      None => {
        let info = graph.package(package);
        let id = self.add_node(WorkNode {
          name: info.name.clone(),
          references: IndexSet::from([info.reference.clone()]),
          locator: info.locator(),
          ident: info.ident(),
          dependencies: Default::default(),
          original_dependencies: Default::default(),
          hoisted_dependencies: Default::default(),
          peer_names: info.peer_names.clone(),
          reasons: Default::default(),
          decoupled: true,
          hoist_priority: info.hoist_priority,
          hoist_border: false,
        });
        // register before recursing so cycles attach to this node
        seen.insert(package, id);
        id
      }
    };
    let is_border = hoisting_limits
      .get(&self.node(parent).locator)
      .map(|names| names.contains(&self.node(work_id).name))
      .unwrap_or(false);
    if is_border {
      self.node_mut(work_id).hoist_border = true;
    }
    let name = self.node(work_id).name.clone();
    let parent_node = self.node_mut(parent);
    parent_node.dependencies.insert(name.clone(), work_id);
    parent_node.original_dependencies.insert(name, work_id);
    match already_seen {
      None => {
        for dep in graph.dependencies(package) {
          self.import_node(graph, hoisting_limits, seen, dep, work_id);
        }
      }
      Some(_) => self.mark_subgraph_coupled(work_id),
    }
  }

  pub fn root(&self) -> WorkNodeId {
    WorkNodeId(0)
  }

  pub fn node(&self, id: WorkNodeId) -> &WorkNode {
    &self.nodes[id.0 as usize]
  }

  pub fn node_mut(&mut self, id: WorkNodeId) -> &mut WorkNode {
    &mut self.nodes[id.0 as usize]
  }

  fn add_node(&mut self, node: WorkNode) -> WorkNodeId {
    let id = WorkNodeId(self.nodes.len() as u32);
    self.nodes.push(node);
    id
  }

  fn mark_subgraph_coupled(&mut self, start: WorkNodeId) {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
      if !seen.insert(id) {
        continue;
      }
      let node = self.node(id);
      let children: Vec<WorkNodeId> = node
        .dependencies
        .iter()
        .filter(|(name, _)| !node.peer_names.contains(*name))
        .map(|(_, dep)| *dep)
        .collect();
      self.node_mut(id).decoupled = false;
      stack.extend(children);
    }
  }

  /// Makes the parent's edge to this node safe to mutate through.
  ///
  /// A decoupled node is returned unchanged. A coupled node is shallow
  /// cloned, the clone replaces the parent's edge, and a self-dependency of
  /// the node is redirected onto the clone.
  pub fn decouple_node(
    &mut self,
    parent: WorkNodeId,
    id: WorkNodeId,
  ) -> WorkNodeId {
    if self.node(id).decoupled {
      return id;
    }
    let mut clone = self.node(id).clone();
    clone.decoupled = true;
    let clone_id = self.add_node(clone);
    let name = self.node(clone_id).name.clone();
    if let Some(&self_dep) = self.node(clone_id).dependencies.get(&name) {
      if self.node(self_dep).ident == self.node(clone_id).ident {
        self
          .node_mut(clone_id)
          .dependencies
          .insert(name.clone(), clone_id);
      }
    }
    self.node_mut(parent).dependencies.insert(name, clone_id);
    clone_id
  }

  /// Regular (non-peer) dependencies of a node, ordered so that any sibling
  /// a dependency peer-depends on comes before it. Nodes without peer
  /// obligations hoist first this way, which keeps the amount of DEPENDS
  /// bookkeeping small. Peer cycles among siblings terminate through the
  /// seen set.
  pub fn sorted_regular_dependencies(
    &self,
    id: WorkNodeId,
  ) -> Vec<WorkNodeId> {
    fn add_dep(
      tree: &WorkTree,
      parent: WorkNodeId,
      dep: WorkNodeId,
      result: &mut IndexSet<WorkNodeId>,
      seen: &mut HashSet<WorkNodeId>,
    ) {
      if !seen.insert(dep) {
        return;
      }
      let parent_node = tree.node(parent);
      for peer_name in &tree.node(dep).peer_names {
        if parent_node.peer_names.contains(peer_name) {
          continue;
        }
        if let Some(&peer_dep) = parent_node.dependencies.get(peer_name) {
          if !result.contains(&peer_dep) {
            add_dep(tree, parent, peer_dep, result, seen);
          }
        }
      }
      result.insert(dep);
    }

    let node = self.node(id);
    let mut result = IndexSet::new();
    let mut seen = HashSet::new();
    for (name, &dep) in &node.dependencies {
      if !node.peer_names.contains(name) {
        add_dep(self, id, dep, &mut result, &mut seen);
      }
    }
    result.into_iter().collect()
  }
}
