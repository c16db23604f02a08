// Copyright 2018-2026 the Deno authors. MIT license.

//! Package hoisting for flat `node_modules`-style directory layouts.
//!
//! Takes a directed, possibly cyclic graph of packages and produces an
//! equivalent hoisted tree in which identical package instances are lifted
//! toward the root, so that a single installed copy per name can serve every
//! dependent. Two contracts are preserved across the transformation:
//!
//! 1. Every originally declared dependency still resolves to an instance
//!    with the same identity (the require promise).
//! 2. A package that peer-depends on a name shares the instance of that name
//!    with its direct parent (the peer dependency promise).
//!
//! The entry point is [`hoist`]; the input is built with [`PackageGraph`].

#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

use deno_semver::StackString;
use indexmap::IndexSet;
use serde::Deserialize;
use serde::Serialize;

mod hoisting;

pub use hoisting::DebugLevel;
pub use hoisting::HoistError;
pub use hoisting::HoistOptions;
pub use hoisting::hoist;

/// Builds the `<name>@<reference>` key with a single allocation.
fn build_key(ident_name: &str, reference: &str) -> StackString {
  capacity_builder::StringBuilder::<StackString>::build(|builder| {
    builder.append(ident_name);
    builder.append('@');
    builder.append(reference);
  })
  .unwrap()
}

/// Real package name of a `<name>@<reference>` key: everything before the
/// first `@` found *after* position 0. Scoped package names start with `@`,
/// so the very first character never terminates the name.
fn ident_name_of(key: &str) -> &str {
  match key.get(1..).and_then(|rest| rest.find('@')) {
    Some(idx) => &key[..idx + 1],
    None => key,
  }
}

/// Raw `<ident_name>@<reference>` string, unique per package instance
/// including its virtualization.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PackageLocator(StackString);

impl PackageLocator {
  pub fn new(ident_name: &str, reference: &str) -> Self {
    Self(build_key(ident_name, reference))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The real package name part of this locator.
  pub fn ident_name(&self) -> &str {
    ident_name_of(&self.0)
  }

  /// The reference part of this locator.
  pub fn reference(&self) -> &str {
    match self.0.get(1..).and_then(|rest| rest.find('@')) {
      Some(idx) => &self.0[idx + 2..],
      None => "",
    }
  }
}

impl std::fmt::Display for PackageLocator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Like [`PackageLocator`], but with any virtual segment (text up to and
/// including the first `#`) stripped from the reference. Two nodes with
/// equal idents denote the same resolved package version, even when wrapped
/// in different virtual instances.
#[derive(
  Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PackageIdent(StackString);

impl PackageIdent {
  pub fn new(ident_name: &str, reference: &str) -> Self {
    let reference = match reference.find('#') {
      Some(idx) => &reference[idx + 1..],
      None => reference,
    };
    Self(build_key(ident_name, reference))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for PackageIdent {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A unique handle to a package in a [`PackageGraph`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct PackageId(u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
  /// Alias under which a parent depends on this package. Usually the real
  /// package name, but aliased dependencies may differ.
  pub name: StackString,
  /// The real package name.
  pub ident_name: StackString,
  /// Version or source string. May carry a virtual prefix terminated by `#`.
  pub reference: StackString,
  /// Names of dependencies this package insists are provided by its parent.
  pub peer_names: IndexSet<StackString>,
  /// Raises the preference of this package's version when competing
  /// versions contend for the same hoist slot. Defaults to 0.
  pub hoist_priority: u32,
}

impl PackageInfo {
  pub fn new(name: &str, reference: &str) -> Self {
    Self {
      name: name.into(),
      ident_name: name.into(),
      reference: reference.into(),
      peer_names: Default::default(),
      hoist_priority: 0,
    }
  }

  pub fn locator(&self) -> PackageLocator {
    PackageLocator::new(&self.ident_name, &self.reference)
  }

  pub fn ident(&self) -> PackageIdent {
    PackageIdent::new(&self.ident_name, &self.reference)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PackageGraphNode {
  info: PackageInfo,
  dependencies: IndexSet<PackageId>,
}

/// The input to [`hoist`]: an arena of packages connected by dependency
/// edges. Edges are plain handles, so cycles are representable directly.
///
/// The root package's reference is conventionally `workspace:.` so that
/// diagnostics render it as `.`, but nothing depends on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageGraph {
  nodes: Vec<PackageGraphNode>,
}

impl PackageGraph {
  /// Creates a graph containing only the root package.
  pub fn new(root: PackageInfo) -> Self {
    Self {
      nodes: vec![PackageGraphNode {
        info: root,
        dependencies: Default::default(),
      }],
    }
  }

  pub fn root(&self) -> PackageId {
    PackageId(0)
  }

  pub fn add_package(&mut self, info: PackageInfo) -> PackageId {
    let id = PackageId(self.nodes.len() as u32);
    self.nodes.push(PackageGraphNode {
      info,
      dependencies: Default::default(),
    });
    id
  }

  pub fn add_dependency(&mut self, parent: PackageId, dependency: PackageId) {
    self.nodes[parent.0 as usize].dependencies.insert(dependency);
  }

  pub fn package(&self, id: PackageId) -> &PackageInfo {
    &self.nodes[id.0 as usize].info
  }

  pub fn package_mut(&mut self, id: PackageId) -> &mut PackageInfo {
    &mut self.nodes[id.0 as usize].info
  }

  pub fn dependencies(
    &self,
    id: PackageId,
  ) -> impl Iterator<Item = PackageId> + '_ {
    self.nodes[id.0 as usize].dependencies.iter().copied()
  }
}

/// A unique handle to a node in a [`HoistedTree`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
pub struct HoistedNodeId(u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoistedNode {
  pub name: StackString,
  pub ident_name: StackString,
  /// Reference strings of every equal-identity instance that was merged
  /// into this node during hoisting.
  pub references: IndexSet<StackString>,
  pub dependencies: Vec<HoistedNodeId>,
}

/// The output of [`hoist`]: an arena of hoisted nodes. Cycles of the input
/// graph are preserved structurally, so consumers traversing the tree must
/// carry a visited set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoistedTree {
  nodes: Vec<HoistedNode>,
}

impl HoistedTree {
  pub(crate) fn new(root: HoistedNode) -> Self {
    Self { nodes: vec![root] }
  }

  pub fn root(&self) -> HoistedNodeId {
    HoistedNodeId(0)
  }

  pub fn node(&self, id: HoistedNodeId) -> &HoistedNode {
    &self.nodes[id.0 as usize]
  }

  pub(crate) fn node_mut(&mut self, id: HoistedNodeId) -> &mut HoistedNode {
    &mut self.nodes[id.0 as usize]
  }

  pub(crate) fn add_node(&mut self, node: HoistedNode) -> HoistedNodeId {
    let id = HoistedNodeId(self.nodes.len() as u32);
    self.nodes.push(node);
    id
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use super::*;

  #[test]
  fn locator_ident_name() {
    let locator = PackageLocator::new("package-a", "1.0.0");
    assert_eq!(locator.as_str(), "package-a@1.0.0");
    assert_eq!(locator.ident_name(), "package-a");
    assert_eq!(locator.reference(), "1.0.0");

    // scoped names keep the leading `@`
    let locator = PackageLocator::new("@scope/package-a", "1.0.0");
    assert_eq!(locator.as_str(), "@scope/package-a@1.0.0");
    assert_eq!(locator.ident_name(), "@scope/package-a");
    assert_eq!(locator.reference(), "1.0.0");
  }

  #[test]
  fn ident_strips_virtual_segment() {
    let ident = PackageIdent::new("package-a", "virtual:abcd#npm:1.0.0");
    assert_eq!(ident.as_str(), "package-a@npm:1.0.0");
    assert_eq!(
      ident,
      PackageIdent::new("package-a", "npm:1.0.0"),
      "virtual instances of the same version share an ident"
    );
    assert_ne!(
      PackageLocator::new("package-a", "virtual:abcd#npm:1.0.0").as_str(),
      PackageLocator::new("package-a", "npm:1.0.0").as_str(),
    );
  }

  #[test]
  fn graph_building() {
    let mut graph = PackageGraph::new(PackageInfo::new(".", "workspace:."));
    let a = graph.add_package(PackageInfo::new("package-a", "1.0.0"));
    let b = graph.add_package(PackageInfo::new("package-b", "1.0.0"));
    graph.add_dependency(graph.root(), a);
    graph.add_dependency(a, b);
    // cycles are fine
    graph.add_dependency(b, a);
    assert_eq!(
      graph.dependencies(graph.root()).collect::<Vec<_>>(),
      vec![a]
    );
    assert_eq!(graph.dependencies(b).collect::<Vec<_>>(), vec![a]);
    assert_eq!(graph.package(a).locator().as_str(), "package-a@1.0.0");
  }
}
