// Copyright 2018-2026 the Deno authors. MIT license.

use std::collections::HashMap;

use super::tree::WorkNodeId;
use super::tree::WorkTree;
use crate::HoistedNode;
use crate::HoistedNodeId;
use crate::HoistedTree;

/// Exports the work tree into the immutable output arena.
///
/// A map of the work nodes on the current path realizes cycles: a node seen
/// again on the path is linked to its already-built output node instead of
/// being re-expanded, and a self edge collapses onto the parent output node.
pub(crate) fn shrink_tree(tree: &WorkTree) -> HoistedTree {
  fn add_node(
    tree: &WorkTree,
    out: &mut HoistedTree,
    on_path: &mut HashMap<WorkNodeId, HoistedNodeId>,
    node: WorkNodeId,
    work_parent: WorkNodeId,
    out_parent: HoistedNodeId,
  ) {
    let node_ref = tree.node(node);
    let seen = on_path.get(&node).copied();
    let result = if node == work_parent {
      out_parent
    } else if let Some(existing) = seen {
      existing
    } else {
      out.add_node(HoistedNode {
        name: node_ref.name.clone(),
        ident_name: node_ref.locator.ident_name().into(),
        references: node_ref.references.clone(),
        dependencies: Vec::new(),
      })
    };
    out.node_mut(out_parent).dependencies.push(result);
    if seen.is_none() {
      on_path.insert(node, result);
      for (name, &dep) in &node_ref.dependencies {
        if !node_ref.peer_names.contains(name) {
          add_node(tree, out, on_path, dep, node, result);
        }
      }
      on_path.remove(&node);
    }
  }

  let root = tree.root();
  let root_ref = tree.node(root);
  let mut out = HoistedTree::new(HoistedNode {
    name: root_ref.name.clone(),
    ident_name: root_ref.locator.ident_name().into(),
    references: root_ref.references.clone(),
    dependencies: Vec::new(),
  });
  let mut on_path = HashMap::from([(root, out.root())]);
  for (name, &dep) in &root_ref.dependencies {
    if !root_ref.peer_names.contains(name) {
      let out_root = out.root();
      add_node(tree, &mut out, &mut on_path, dep, root, out_root);
    }
  }
  out
}
