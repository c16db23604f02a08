// Copyright 2018-2026 the Deno authors. MIT license.

//! Non-normative diagnostics: pretty printers, the work tree dump and the
//! broken-promise self-check.

use std::collections::HashSet;

use deno_semver::StackString;
use indexmap::IndexMap;

use super::tree::WorkNodeId;
use super::tree::WorkTree;
use crate::PackageLocator;

/// Renders a `<name>@<reference>` key for diagnostics: the workspace root
/// reference renders as `.`, a virtual reference renders with a `v:` marker
/// and the virtual segment stripped.
pub(crate) fn pretty_print_key(key: &str) -> String {
  let Some(idx) = key.get(1..).and_then(|rest| rest.find('@')) else {
    return key.to_string();
  };
  let name = &key[..idx + 1];
  let reference = &key[idx + 2..];
  if reference == "workspace:." {
    return ".".to_string();
  }
  let version = match reference.find('#') {
    Some(hash_idx) => &reference[hash_idx + 1..],
    None => reference,
  };
  if reference.starts_with("virtual") {
    format!("v:{}@{}", name, version)
  } else {
    format!("{}@{}", name, version)
  }
}

pub(crate) fn pretty_print_locator(locator: &PackageLocator) -> String {
  pretty_print_key(locator.as_str())
}

/// Verifies the require promise and the peer dependency promise over the
/// whole work tree. Returns one line per violation, empty when the tree is
/// sound.
///
/// Resolution is nearest-wins: a node's own dependency entry shadows
/// anything an ancestor provides under the same name. Every node is checked
/// once, under the first path that reaches it.
pub(crate) fn self_check(tree: &WorkTree) -> String {
  fn check_node(
    tree: &WorkTree,
    node: WorkNodeId,
    parent_deps: &IndexMap<StackString, WorkNodeId>,
    path: &mut Vec<WorkNodeId>,
    seen: &mut HashSet<WorkNodeId>,
    log: &mut Vec<String>,
  ) {
    if !seen.insert(node) {
      return;
    }
    path.push(node);
    let node_ref = tree.node(node);
    let mut dependencies = parent_deps.clone();
    for (name, &dep) in &node_ref.dependencies {
      dependencies.insert(name.clone(), dep);
    }
    let pretty_path = |path: &[WorkNodeId]| {
      path
        .iter()
        .map(|id| pretty_print_locator(&tree.node(*id).locator))
        .collect::<Vec<_>>()
        .join("→")
    };
    for (name, &orig) in &node_ref.original_dependencies {
      if node_ref.peer_names.contains(name) {
        let own_view = node_ref.dependencies.get(name).copied();
        let parent_view = parent_deps.get(name).copied();
        if let (Some(own), Some(parents)) = (own_view, parent_view) {
          if tree.node(own).ident != tree.node(parents).ident {
            log.push(format!(
              "{} - broken peer promise for {}: sees {}, but the parent \
               provides {}",
              pretty_path(path),
              name,
              tree.node(own).ident,
              tree.node(parents).ident
            ));
          }
        }
      } else {
        match dependencies.get(name).copied() {
          None => log.push(format!(
            "{} - broken require promise: no required dependency {} found",
            pretty_path(path),
            pretty_print_locator(&tree.node(orig).locator)
          )),
          Some(dep) => {
            if tree.node(dep).ident != tree.node(orig).ident {
              log.push(format!(
                "{} - broken require promise for {}: expected {}, but \
                 found: {}",
                pretty_path(path),
                name,
                tree.node(orig).ident,
                tree.node(dep).ident
              ));
            }
          }
        }
      }
    }
    for (name, &dep) in &node_ref.dependencies {
      if !node_ref.peer_names.contains(name) {
        check_node(tree, dep, &dependencies, path, seen, log);
      }
    }
    path.pop();
  }

  let mut log = Vec::new();
  check_node(
    tree,
    tree.root(),
    &Default::default(),
    &mut Vec::new(),
    &mut HashSet::new(),
    &mut log,
  );
  log.join("\n")
}

/// Indented dump of the work tree with per-name reasons. Cycles are cut on
/// the current path.
pub(crate) fn dump_tree(tree: &WorkTree) -> String {
  fn dump(
    tree: &WorkTree,
    node: WorkNodeId,
    depth: usize,
    path: &mut HashSet<WorkNodeId>,
    out: &mut String,
  ) {
    if !path.insert(node) {
      return;
    }
    let node_ref = tree.node(node);
    for (name, &dep) in &node_ref.dependencies {
      if node_ref.peer_names.contains(name) {
        continue;
      }
      out.push_str(&"  ".repeat(depth));
      out.push_str(&pretty_print_locator(&tree.node(dep).locator));
      if let Some(reason) = node_ref.reasons.get(name) {
        out.push_str(" (");
        out.push_str(reason);
        out.push(')');
      }
      out.push('\n');
      dump(tree, dep, depth + 1, path, out);
    }
    path.remove(&node);
  }

  let mut out = String::new();
  out.push_str(&pretty_print_locator(&tree.node(tree.root()).locator));
  out.push('\n');
  let mut path = HashSet::new();
  dump(tree, tree.root(), 1, &mut path, &mut out);
  out
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::super::test_tree::TestTreeBuilder;
  use super::super::tree::WorkTree;
  use super::*;

  #[test]
  fn pretty_printing() {
    assert_eq!(pretty_print_key(".@workspace:."), ".");
    assert_eq!(pretty_print_key("package-a@1.0.0"), "package-a@1.0.0");
    assert_eq!(
      pretty_print_key("@scope/package-a@1.0.0"),
      "@scope/package-a@1.0.0"
    );
    assert_eq!(
      pretty_print_key("package-a@virtual:1234#npm:1.0.0"),
      "v:package-a@npm:1.0.0"
    );
  }

  #[test]
  fn self_check_passes_on_imported_tree() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-a@1");
    builder.add_dependency("package-a@1", "package-b@1");
    builder.add_dependency("package-b@1", "package-a@1");

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    assert_eq!(self_check(&tree), "");
  }

  #[test]
  fn self_check_reports_missing_dependency() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-a@1");
    builder.add_dependency("package-a@1", "package-b@1");

    let mut tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    let a = tree.node(tree.root()).dependencies["package-a"];
    tree.node_mut(a).dependencies.shift_remove("package-b");
    assert_eq!(
      self_check(&tree),
      ".→package-a@1 - broken require promise: no required dependency \
       package-b@1 found"
    );
  }

  #[test]
  fn self_check_reports_broken_peer_promise() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-host@2");
    builder.add_dependency(".", "package-w@1");
    builder.add_dependency("package-w@1", "package-host@1");
    builder.add_dependency("package-w@1", "package-plugin@1");
    builder.add_peer_dependency("package-plugin@1", "package-host@1");

    let mut tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    // rip host@1 out of w without hoisting it anywhere, so the plugin now
    // disagrees with what w resolves for the host
    let w = tree.node(tree.root()).dependencies["package-w"];
    tree.node_mut(w).dependencies.shift_remove("package-host");
    assert_eq!(
      self_check(&tree),
      ".→package-w@1 - broken require promise for package-host: expected \
       package-host@1, but found: package-host@2\n\
       .→package-w@1→package-plugin@1 - broken peer promise for \
       package-host: sees package-host@1, but the parent provides \
       package-host@2"
    );
  }

  #[test]
  fn dump_renders_nested_tree() {
    let mut builder = TestTreeBuilder::default();
    builder.add_dependency(".", "package-a@1");
    builder.add_dependency("package-a@1", "package-b@1");

    let tree =
      WorkTree::from_package_graph(&builder.build(), &Default::default());
    assert_eq!(dump_tree(&tree), ".\n  package-a@1\n    package-b@1\n");
  }
}
