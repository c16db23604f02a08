// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashSet;

use deno_semver::StackString;
use indexmap::IndexMap;
use indexmap::IndexSet;

use super::debug_output::pretty_print_key;
use super::debug_output::pretty_print_locator;
use super::popularity::PopularityMap;
use super::tree::WorkNodeId;
use super::tree::WorkTree;
use crate::PackageIdent;

/// Candidate idents per dependency name under one hoist root, most
/// preferred first. The head of each list is the ident currently allowed to
/// occupy the root's slot for that name; when it fails to hoist, the
/// executor shifts it off and promotes the next one.
#[derive(Debug)]
pub(crate) struct HoistIdentMap {
  pub by_name: IndexMap<StackString, Vec<PackageIdent>>,
}

impl HoistIdentMap {
  pub fn heads(&self) -> IndexMap<StackString, PackageIdent> {
    self
      .by_name
      .iter()
      .map(|(name, idents)| (name.clone(), idents[0].clone()))
      .collect()
  }
}

pub(crate) fn build_hoist_ident_map(
  tree: &WorkTree,
  root: WorkNodeId,
  popularity: &PopularityMap,
) -> HoistIdentMap {
  let root_node = tree.node(root);
  let mut by_name = IndexMap::new();
  // the root's own identity and its current direct dependencies are pinned:
  // whatever occupies a root slot stays the winner for that name
  by_name.insert(root_node.name.clone(), vec![root_node.ident.clone()]);
  for (name, &dep) in &root_node.dependencies {
    if root_node.peer_names.contains(name) {
      continue;
    }
    by_name.insert(name.clone(), vec![tree.node(dep).ident.clone()]);
  }
  let pinned: HashSet<StackString> = by_name.keys().cloned().collect();
  for (name, ident) in popularity.preference_ordered() {
    if root_node.peer_names.contains(name) || pinned.contains(name) {
      continue;
    }
    let idents = by_name.entry(name.clone()).or_default();
    if !idents.contains(ident) {
      idents.push(ident.clone());
    }
  }
  HoistIdentMap { by_name }
}

/// Whether a node may move to the hoist root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Hoistable {
  Yes,
  No {
    reason: Option<String>,
  },
  /// Hoistable iff every listed sibling (a parent-provided peer dependency
  /// of the node) hoists too.
  Depends {
    depends_on: Vec<WorkNodeId>,
  },
}

/// Classifies one candidate. `node_path` runs from the hoist root to the
/// candidate's parent, inclusive. `reason_root` is the pretty-printed hoist
/// root path and doubles as the collect-reasons switch.
pub(crate) fn node_hoist_info(
  tree: &WorkTree,
  node_path: &[WorkNodeId],
  node: WorkNodeId,
  used_dependencies: &IndexMap<StackString, WorkNodeId>,
  hoist_idents: &IndexMap<StackString, PackageIdent>,
  ident_map: &HoistIdentMap,
  reason_root: Option<&str>,
) -> Hoistable {
  let root_node = tree.node(node_path[0]);
  let parent = *node_path.last().unwrap();
  let parent_node = tree.node(parent);
  let candidate = tree.node(node);

  if candidate.hoist_border {
    return Hoistable::No {
      reason: reason_root.map(|_| "- hoist border".to_string()),
    };
  }

  if candidate.ident == parent_node.ident {
    return Hoistable::No {
      reason: reason_root.map(|_| "- self-reference".to_string()),
    };
  }

  // hoisting over the root's own peer would give the root a private copy of
  // the instance it must share with its parent
  if root_node.peer_names.contains(&candidate.name) {
    return Hoistable::No {
      reason: reason_root.map(|_| "- cannot shadow peer".to_string()),
    };
  }

  if let Some(hoisted_ident) = hoist_idents.get(&candidate.name) {
    if *hoisted_ident != candidate.ident {
      return Hoistable::No {
        reason: reason_root.map(|root| {
          format!(
            "filled by: {} at {}",
            pretty_print_key(ident_map.by_name[&candidate.name][0].as_str()),
            root
          )
        }),
      };
    }
  }

  if let Some(&used_dep) = used_dependencies.get(&candidate.name) {
    if tree.node(used_dep).ident != candidate.ident {
      return Hoistable::No {
        reason: reason_root.map(|root| {
          format!(
            "filled by: {} at {}",
            pretty_print_locator(&tree.node(used_dep).locator),
            root
          )
        }),
      };
    }
  }

  // an ancestor between the root and the parent holding the same name with
  // a different ident would shadow the hoisted copy
  for &ancestor in &node_path[1..node_path.len() - 1] {
    let ancestor_node = tree.node(ancestor);
    if let Some(&ancestor_dep) = ancestor_node.dependencies.get(&candidate.name)
    {
      if tree.node(ancestor_dep).ident != candidate.ident {
        return Hoistable::No {
          reason: reason_root.map(|_| {
            format!(
              "filled by: {} at {}",
              pretty_print_locator(&tree.node(ancestor_dep).locator),
              pretty_print_locator(&ancestor_node.locator)
            )
          }),
        };
      }
    }
  }

  let mut depends_on = Vec::new();
  for peer_name in &candidate.peer_names {
    if let Some(&supplier) = parent_node.dependencies.get(peer_name) {
      // supplied by the immediate parent: hoistable iff the supplier
      // hoists as well
      if supplier != node {
        depends_on.push(supplier);
      }
      continue;
    }
    // supplied by a strict ancestor: the peer can only follow the node up
    // if its ident is the one winning the slot
    for idx in (0..node_path.len() - 1).rev() {
      let ancestor_node = tree.node(node_path[idx]);
      let Some(&supplier) = ancestor_node.dependencies.get(peer_name) else {
        continue;
      };
      let supplier_ident = &tree.node(supplier).ident;
      if hoist_idents.get(peer_name) != Some(supplier_ident) {
        return Hoistable::No {
          reason: reason_root.map(|root| {
            format!(
              "- peer dependency {} from parent {} was not hoisted to {}",
              pretty_print_locator(&tree.node(supplier).locator),
              pretty_print_locator(&ancestor_node.locator),
              root
            )
          }),
        };
      }
      break;
    }
    // a peer with no supplier anywhere constrains nothing
  }

  if depends_on.is_empty() {
    Hoistable::Yes
  } else {
    Hoistable::Depends { depends_on }
  }
}

/// Propagates NO through the DEPENDS edges: a node that depends on an
/// unhoistable sibling is unhoistable too, transitively. What survives
/// afterwards are pure DEPENDS cycles with no NO member, and those hoist
/// together.
pub(crate) fn propagate_unhoistable(
  tree: &WorkTree,
  parent: WorkNodeId,
  hoist_infos: &mut IndexMap<WorkNodeId, Hoistable>,
  output_reason: bool,
) {
  let mut dependants: IndexMap<StackString, IndexSet<StackString>> =
    IndexMap::new();
  for (&node, info) in hoist_infos.iter() {
    if let Hoistable::Depends { depends_on } = info {
      for &dep in depends_on {
        dependants
          .entry(tree.node(dep).name.clone())
          .or_default()
          .insert(tree.node(node).name.clone());
      }
    }
  }
  let mut queue: Vec<WorkNodeId> = hoist_infos
    .iter()
    .filter(|(_, info)| matches!(info, Hoistable::No { .. }))
    .map(|(&node, _)| node)
    .collect();
  while let Some(blocked) = queue.pop() {
    let Some(dependant_names) = dependants.get(&tree.node(blocked).name)
    else {
      continue;
    };
    for dependant_name in dependant_names {
      let Some(&dependant) =
        tree.node(parent).dependencies.get(dependant_name)
      else {
        continue;
      };
      let Some(info) = hoist_infos.get_mut(&dependant) else {
        continue;
      };
      if matches!(info, Hoistable::Depends { .. }) {
        let reason = output_reason.then(|| {
          format!(
            "- peer dependency {} from parent {} was not hoisted",
            pretty_print_locator(&tree.node(blocked).locator),
            pretty_print_locator(&tree.node(parent).locator)
          )
        });
        *info = Hoistable::No { reason };
        queue.push(dependant);
      }
    }
  }
}
