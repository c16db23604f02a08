// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashSet;

use deno_semver::StackString;
use indexmap::IndexMap;
use indexmap::IndexSet;

use super::tree::WorkNodeId;
use super::tree::WorkTree;
use crate::PackageIdent;

#[derive(Debug, Default)]
pub(crate) struct PopularityStats {
  /// Idents of the distinct parents that pull in this (name, ident) pair.
  /// The set size is the popularity metric.
  pub dependents: IndexSet<PackageIdent>,
  /// Highest hoist priority over the contributing nodes.
  pub hoist_priority: u32,
}

/// For each (dependency name, dependency ident) pair reachable from the
/// hoist root over non-peer edges, how many distinct parent package idents
/// depend on it. Entry order is the DFS discovery order, which keeps ident
/// preference deterministic when popularity ties.
#[derive(Debug, Default)]
pub(crate) struct PopularityMap {
  entries: IndexMap<(StackString, PackageIdent), PopularityStats>,
}

impl PopularityMap {
  /// Keys in candidate preference order: highest hoist priority first, then
  /// the most distinct dependents, ties kept in discovery order.
  pub fn preference_ordered(
    &self,
  ) -> Vec<&(StackString, PackageIdent)> {
    let mut keys: Vec<_> = self.entries.iter().collect();
    keys.sort_by(|(_, a), (_, b)| {
      b.hoist_priority
        .cmp(&a.hoist_priority)
        .then(b.dependents.len().cmp(&a.dependents.len()))
    });
    keys.into_iter().map(|(key, _)| key).collect()
  }

  #[cfg(test)]
  pub fn dependent_count(
    &self,
    name: &str,
    ident: &PackageIdent,
  ) -> usize {
    self
      .entries
      .get(&(StackString::from(name), ident.clone()))
      .map(|stats| stats.dependents.len())
      .unwrap_or(0)
  }
}

pub(crate) fn build_popularity_map(
  tree: &WorkTree,
  root: WorkNodeId,
) -> PopularityMap {
  fn visit(
    tree: &WorkTree,
    map: &mut PopularityMap,
    seen: &mut HashSet<WorkNodeId>,
    parent: WorkNodeId,
  ) {
    if !seen.insert(parent) {
      return;
    }
    let parent_node = tree.node(parent);
    for (name, &dep) in &parent_node.dependencies {
      if parent_node.peer_names.contains(name) {
        continue;
      }
      let dep_node = tree.node(dep);
      let stats = map
        .entries
        .entry((dep_node.name.clone(), dep_node.ident.clone()))
        .or_default();
      stats.dependents.insert(parent_node.ident.clone());
      stats.hoist_priority =
        stats.hoist_priority.max(dep_node.hoist_priority);
      visit(tree, map, seen, dep);
    }
  }

  let mut map = PopularityMap::default();
  let mut seen = HashSet::new();
  visit(tree, &mut map, &mut seen, root);
  map
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::super::test_tree::TestTreeBuilder;
  use super::super::tree::WorkTree;
  use super::*;

  #[test]
  fn counts_distinct_parent_idents() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-p@1");
    builder.add_dependency(".", "package-q@1");
    builder.add_dependency(".", "package-r@1");
    builder.add_dependency("package-p@1", "package-x@1");
    builder.add_dependency("package-q@1", "package-x@1");
    builder.add_dependency("package-r@1", "package-x@2");

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    let map = build_popularity_map(&tree, tree.root());
    let x1 = PackageIdent::new("package-x", "1");
    let x2 = PackageIdent::new("package-x", "2");
    assert_eq!(map.dependent_count("package-x", &x1), 2);
    assert_eq!(map.dependent_count("package-x", &x2), 1);
    // x@1 sorts before every single-dependent entry; those keep their
    // discovery order
    assert_eq!(
      map.preference_ordered(),
      [
        &("package-x".into(), x1.clone()),
        &("package-p".into(), PackageIdent::new("package-p", "1")),
        &("package-q".into(), PackageIdent::new("package-q", "1")),
        &("package-r".into(), PackageIdent::new("package-r", "1")),
        &("package-x".into(), x2.clone()),
      ]
    );
  }

  #[test]
  fn peer_edges_do_not_count() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-host@1");
    builder.add_dependency(".", "package-w@1");
    builder.add_peer_dependency("package-w@1", "package-host@1");

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    let map = build_popularity_map(&tree, tree.root());
    let host = PackageIdent::new("package-host", "1");
    // only the root's regular edge counts, not w's peer edge
    assert_eq!(map.dependent_count("package-host", &host), 1);
  }

  #[test]
  fn hoist_priority_outranks_popularity() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-p@1");
    builder.add_dependency(".", "package-q@1");
    builder.add_dependency("package-p@1", "package-x@1");
    builder.add_dependency("package-q@1", "package-x@1");
    builder.add_dependency(".", "package-r@1");
    builder.add_dependency("package-r@1", "package-x@2");
    builder.set_hoist_priority("package-x@2", 1);

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    let map = build_popularity_map(&tree, tree.root());
    assert_eq!(
      map.preference_ordered()[0],
      &("package-x".into(), PackageIdent::new("package-x", "2"))
    );
  }

  #[test]
  fn cyclic_graphs_terminate() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-a@1");
    builder.add_dependency("package-a@1", "package-b@1");
    builder.add_dependency("package-b@1", "package-a@1");

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    let map = build_popularity_map(&tree, tree.root());
    let a = PackageIdent::new("package-a", "1");
    assert_eq!(map.dependent_count("package-a", &a), 2);
  }
}
