// Copyright 2018-2026 the Deno authors. MIT license.

//! Test helpers: a descriptor-based input builder and a renderer for
//! hoisted trees, so the algorithm tests can state expectations as plain
//! indented lines.

use indexmap::IndexMap;

use super::DebugLevel;
use super::HoistOptions;
use super::hoist;
use crate::HoistedNodeId;
use crate::HoistedTree;
use crate::PackageGraph;
use crate::PackageId;
use crate::PackageInfo;

/// Builds input graphs from `name@reference` descriptors. The root is
/// always `.` with the `workspace:.` reference; an aliased dependency is
/// written `alias=name@reference`. Equal descriptors denote the same
/// package instance, so diamonds and cycles come out naturally.
#[derive(Debug, Default)]
pub(crate) struct TestTreeBuilder {
  dependencies: Vec<(String, String, bool)>,
  priorities: IndexMap<String, u32>,
}

impl TestTreeBuilder {
  pub fn add_dependency(&mut self, parent: &str, child: &str) {
    self
      .dependencies
      .push((parent.to_string(), child.to_string(), false));
  }

  /// Adds the dependency edge and marks the child's name as a peer of the
  /// parent, mirroring how an input tree carries already-resolved peers.
  pub fn add_peer_dependency(&mut self, parent: &str, child: &str) {
    self
      .dependencies
      .push((parent.to_string(), child.to_string(), true));
  }

  pub fn set_hoist_priority(&mut self, descriptor: &str, priority: u32) {
    self.priorities.insert(descriptor.to_string(), priority);
  }

  pub fn build(&self) -> PackageGraph {
    let mut graph = PackageGraph::new(PackageInfo::new(".", "workspace:."));
    let mut ids: IndexMap<String, PackageId> =
      IndexMap::from([(".".to_string(), graph.root())]);
    for (parent, child, _) in &self.dependencies {
      for descriptor in [parent, child] {
        if !ids.contains_key(descriptor.as_str()) {
          let mut info = parse_descriptor(descriptor);
          if let Some(&priority) = self.priorities.get(descriptor.as_str()) {
            info.hoist_priority = priority;
          }
          let id = graph.add_package(info);
          ids.insert(descriptor.clone(), id);
        }
      }
    }
    for (parent, child, is_peer) in &self.dependencies {
      let parent_id = ids[parent.as_str()];
      let child_id = ids[child.as_str()];
      graph.add_dependency(parent_id, child_id);
      if *is_peer {
        let child_name = graph.package(child_id).name.clone();
        graph.package_mut(parent_id).peer_names.insert(child_name);
      }
    }
    graph
  }
}

fn parse_descriptor(descriptor: &str) -> PackageInfo {
  if descriptor == "." {
    return PackageInfo::new(".", "workspace:.");
  }
  let (alias, rest) = match descriptor.split_once('=') {
    Some((alias, rest)) => (Some(alias), rest),
    None => (None, descriptor),
  };
  let at = rest[1..].find('@').map(|idx| idx + 1).unwrap_or(rest.len());
  let mut info =
    PackageInfo::new(&rest[..at], rest.get(at + 1..).unwrap_or(""));
  if let Some(alias) = alias {
    info.name = alias.into();
  }
  info
}

pub(crate) fn test_options() -> HoistOptions {
  HoistOptions {
    // validate the hoisting contracts after every single step
    check: true,
    debug_level: Some(DebugLevel::None),
    hoisting_limits: Default::default(),
  }
}

pub(crate) fn hoist_and_print(builder: &TestTreeBuilder) -> Vec<String> {
  hoist_and_print_with(builder, &test_options())
}

pub(crate) fn hoist_and_print_with(
  builder: &TestTreeBuilder,
  options: &HoistOptions,
) -> Vec<String> {
  let tree = hoist(&builder.build(), options).unwrap();
  print_hoisted(&tree)
}

/// Renders the hoisted tree as indented lines, children sorted by label,
/// references sorted and comma-joined, aliased nodes shown as
/// `alias=name@refs` and cycle edges marked with a trailing `*`.
pub(crate) fn print_hoisted(tree: &HoistedTree) -> Vec<String> {
  fn label(tree: &HoistedTree, id: HoistedNodeId) -> String {
    let node = tree.node(id);
    let mut references: Vec<&str> =
      node.references.iter().map(|reference| reference.as_str()).collect();
    references.sort_unstable();
    let name = if node.name == node.ident_name {
      node.name.to_string()
    } else {
      format!("{}={}", node.name, node.ident_name)
    };
    format!("{}@{}", name, references.join(","))
  }

  fn visit(
    tree: &HoistedTree,
    id: HoistedNodeId,
    depth: usize,
    path: &mut Vec<HoistedNodeId>,
    out: &mut Vec<String>,
  ) {
    let mut children = tree.node(id).dependencies.clone();
    children.sort_by_key(|child| label(tree, *child));
    for child in children {
      let mut line = "  ".repeat(depth);
      line.push_str(&label(tree, child));
      if path.contains(&child) {
        line.push('*');
        out.push(line);
        continue;
      }
      out.push(line);
      path.push(child);
      visit(tree, child, depth + 1, path, out);
      path.pop();
    }
  }

  let mut out = vec![".".to_string()];
  let mut path = vec![tree.root()];
  visit(tree, tree.root(), 1, &mut path, &mut out);
  out
}
