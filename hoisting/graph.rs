// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashSet;

use deno_semver::StackString;
use indexmap::IndexMap;
use indexmap::IndexSet;

use super::HoistError;
use super::debug_output::dump_tree;
use super::debug_output::pretty_print_locator;
use super::debug_output::self_check;
use super::planner::Hoistable;
use super::planner::HoistIdentMap;
use super::planner::build_hoist_ident_map;
use super::planner::node_hoist_info;
use super::planner::propagate_unhoistable;
use super::popularity::build_popularity_map;
use super::tree::WorkNodeId;
use super::tree::WorkTree;
use crate::PackageIdent;
use crate::PackageLocator;

/// Drives the mutation of the work tree: hoists everything possible into
/// the tree root, then into every remaining node as its own hoist root,
/// re-planning with the next candidate ident whenever the preferred one
/// fails to reach a root.
pub(crate) struct Hoister<'a> {
  tree: &'a mut WorkTree,
  check: bool,
  output_reason: bool,
}

impl<'a> Hoister<'a> {
  pub fn new(
    tree: &'a mut WorkTree,
    check: bool,
    output_reason: bool,
  ) -> Self {
    Self {
      tree,
      check,
      output_reason,
    }
  }

  pub fn hoist_to_root(&mut self) -> Result<(), HoistError> {
    let root = self.tree.root();
    let root_locator = self.tree.node(root).locator.clone();
    self.hoist_to(
      &mut vec![root],
      &mut IndexSet::from([root_locator]),
      &mut HashSet::new(),
    )
  }

  /// Hoists everything possible into the hoist root at the end of
  /// `root_path`, then recurses into each remaining non-peer child as a new
  /// hoist root. `path_locators` guards the recursion spine against cycles;
  /// `visited_roots` keeps cyclic root chains from re-entering.
  fn hoist_to(
    &mut self,
    root_path: &mut Vec<WorkNodeId>,
    path_locators: &mut IndexSet<PackageLocator>,
    visited_roots: &mut HashSet<WorkNodeId>,
  ) -> Result<(), HoistError> {
    let root = *root_path.last().unwrap();
    if !visited_roots.insert(root) {
      return Ok(());
    }

    let popularity = build_popularity_map(self.tree, root);
    let mut ident_map = build_hoist_ident_map(self.tree, root, &popularity);
    let mut hoist_idents = ident_map.heads();
    let used_dependencies = self.used_dependencies(root_path);
    let reason_root = self.output_reason.then(|| {
      path_locators
        .iter()
        .map(pretty_print_locator)
        .collect::<Vec<_>>()
        .join("→")
    });

    loop {
      self.hoist_graph(
        root,
        &used_dependencies,
        &hoist_idents,
        &ident_map,
        reason_root.as_deref(),
      )?;
      // when the preferred ident of a name failed to reach the root, drop
      // it and retry with the next candidate
      let mut was_state_changed = false;
      for (name, idents) in ident_map.by_name.iter_mut() {
        if idents.len() > 1
          && !self.tree.node(root).dependencies.contains_key(name)
        {
          idents.remove(0);
          hoist_idents.insert(name.clone(), idents[0].clone());
          was_state_changed = true;
        }
      }
      if !was_state_changed {
        break;
      }
    }

    let children: Vec<WorkNodeId> = {
      let root_node = self.tree.node(root);
      root_node
        .dependencies
        .iter()
        .filter(|(name, _)| !root_node.peer_names.contains(*name))
        .map(|(_, dep)| *dep)
        .collect()
    };
    for dep in children {
      let locator = self.tree.node(dep).locator.clone();
      if path_locators.contains(&locator) {
        continue;
      }
      path_locators.insert(locator.clone());
      root_path.push(dep);
      self.hoist_to(root_path, path_locators, visited_roots)?;
      root_path.pop();
      path_locators.shift_remove(&locator);
    }
    Ok(())
  }

  /// Names already hoisted out of the nodes on the root path; a different
  /// ident may not occupy such a name below. Nearest root wins.
  fn used_dependencies(
    &self,
    root_path: &[WorkNodeId],
  ) -> IndexMap<StackString, WorkNodeId> {
    let mut used = IndexMap::new();
    for &node in root_path {
      for (name, &dep) in &self.tree.node(node).hoisted_dependencies {
        used.insert(name.clone(), dep);
      }
    }
    used
  }

  /// One full pass under a single hoist root: walks the root's current
  /// children, hoists every hoistable descendant up into the root and
  /// rescans nodes that newly arrived at the root until nothing moves.
  fn hoist_graph(
    &mut self,
    root: WorkNodeId,
    used_dependencies: &IndexMap<StackString, WorkNodeId>,
    hoist_idents: &IndexMap<StackString, PackageIdent>,
    ident_map: &HoistIdentMap,
    reason_root: Option<&str>,
  ) -> Result<(), HoistError> {
    let mut next_new_nodes: IndexSet<WorkNodeId> = self
      .tree
      .sorted_regular_dependencies(root)
      .into_iter()
      .collect();
    while !next_new_nodes.is_empty() {
      let new_nodes = std::mem::take(&mut next_new_nodes);
      for dep in new_nodes {
        if self.tree.node(dep).hoist_border {
          continue;
        }
        let dep = self.tree.decouple_node(root, dep);
        let root_locator = self.tree.node(root).locator.clone();
        self.hoist_node_dependencies(
          &mut vec![root, dep],
          &mut vec![root_locator],
          used_dependencies,
          hoist_idents,
          ident_map,
          reason_root,
          &mut next_new_nodes,
        )?;
      }
    }
    Ok(())
  }

  /// Classifies the children of the last node on `node_path`, moves the
  /// hoistable ones into the root at the front of the path and descends
  /// into the rest. `locator_path` carries the locators of `node_path`
  /// minus its last entry and cuts dependency cycles.
  #[allow(clippy::too_many_arguments)]
  fn hoist_node_dependencies(
    &mut self,
    node_path: &mut Vec<WorkNodeId>,
    locator_path: &mut Vec<PackageLocator>,
    used_dependencies: &IndexMap<StackString, WorkNodeId>,
    hoist_idents: &IndexMap<StackString, PackageIdent>,
    ident_map: &HoistIdentMap,
    reason_root: Option<&str>,
    new_nodes: &mut IndexSet<WorkNodeId>,
  ) -> Result<(), HoistError> {
    let root = node_path[0];
    let parent = *node_path.last().unwrap();

    let mut hoist_infos: IndexMap<WorkNodeId, Hoistable> = IndexMap::new();
    for node in self.tree.sorted_regular_dependencies(parent) {
      let info = node_hoist_info(
        self.tree,
        node_path,
        node,
        used_dependencies,
        hoist_idents,
        ident_map,
        reason_root,
      );
      hoist_infos.insert(node, info);
    }
    propagate_unhoistable(
      self.tree,
      parent,
      &mut hoist_infos,
      reason_root.is_some(),
    );

    for (&node, info) in &hoist_infos {
      if matches!(info, Hoistable::No { .. }) {
        continue;
      }
      let name = self.tree.node(node).name.clone();
      let parent_node = self.tree.node_mut(parent);
      parent_node.dependencies.shift_remove(&name);
      parent_node.hoisted_dependencies.insert(name.clone(), node);
      parent_node.reasons.shift_remove(&name);
      match self.tree.node(root).dependencies.get(&name).copied() {
        None => {
          // never create a self loop on the root
          if self.tree.node(root).ident != self.tree.node(node).ident {
            self.tree.node_mut(root).dependencies.insert(name, node);
            new_nodes.insert(node);
          }
        }
        Some(existing) => {
          // the planner only lets the ident occupying the root slot
          // through, so this is a merge of equal instances
          debug_assert_eq!(
            self.tree.node(existing).ident,
            self.tree.node(node).ident
          );
          if existing != node {
            let references: Vec<StackString> =
              self.tree.node(node).references.iter().cloned().collect();
            self.tree.node_mut(existing).references.extend(references);
          }
        }
      }
      if self.check {
        let log = self_check(self.tree);
        if !log.is_empty() {
          return Err(HoistError::BrokenContracts {
            stage: format!(
              "after hoisting {}",
              pretty_print_locator(&self.tree.node(node).locator)
            ),
            log,
            tree_dump: dump_tree(self.tree),
          });
        }
      }
    }

    for (&node, info) in &hoist_infos {
      let Hoistable::No { reason } = info else {
        continue;
      };
      if let Some(reason) = reason {
        let name = self.tree.node(node).name.clone();
        self
          .tree
          .node_mut(parent)
          .reasons
          .insert(name, reason.clone());
      }
      if self.tree.node(node).hoist_border {
        continue;
      }
      let node_locator = self.tree.node(node).locator.clone();
      if locator_path.contains(&node_locator) {
        continue;
      }
      let decoupled = self.tree.decouple_node(parent, node);
      let parent_locator = self.tree.node(parent).locator.clone();
      node_path.push(decoupled);
      locator_path.push(parent_locator);
      self.hoist_node_dependencies(
        node_path,
        locator_path,
        used_dependencies,
        hoist_idents,
        ident_map,
        reason_root,
        new_nodes,
      )?;
      locator_path.pop();
      node_path.pop();
    }
    Ok(())
  }
}
