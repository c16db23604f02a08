// Copyright 2018-2026 the Deno authors. MIT license.

//! The hoisting engine. [`hoist`] is the only entry point; everything else
//! in this module tree operates on the mutable work tree it builds.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Instant;

use deno_semver::StackString;
use log::debug;
use thiserror::Error;

use crate::HoistedTree;
use crate::PackageGraph;
use crate::PackageLocator;

mod debug_output;
mod graph;
mod planner;
mod popularity;
mod shrink;
#[cfg(test)]
pub(crate) mod test_tree;
mod tree;

use debug_output::dump_tree;
use debug_output::self_check;
use graph::Hoister;
use shrink::shrink_tree;
use tree::WorkTree;

/// How much diagnostic work the engine performs. Levels are cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
  None,
  /// Log the total hoist wall time.
  Perf,
  /// Additionally self-check the hoisted tree and fail on broken promises.
  Check,
  /// Additionally collect per-name "why not hoisted" reasons and log a dump
  /// of the hoisted tree.
  Reasons,
  /// Additionally self-check the tree after every hoisting step. Very slow.
  Intensive,
}

impl DebugLevel {
  /// Reads the debug level from the `NM_DEBUG_LEVEL` environment variable.
  pub fn from_env() -> Self {
    match std::env::var("NM_DEBUG_LEVEL")
      .ok()
      .and_then(|value| value.parse::<i32>().ok())
    {
      Some(level) if level >= 9 => Self::Intensive,
      Some(level) if level >= 2 => Self::Reasons,
      Some(1) => Self::Check,
      Some(0) => Self::Perf,
      _ => Self::None,
    }
  }
}

#[derive(Debug, Default, Clone)]
pub struct HoistOptions {
  /// Run the self-consistency check after every hoisting step instead of
  /// only at the end. Expensive; useful when bisecting a broken hoist.
  pub check: bool,
  /// When `None`, the level is read from `NM_DEBUG_LEVEL` at entry.
  pub debug_level: Option<DebugLevel>,
  /// For a package with the given locator, the named dependencies are hoist
  /// borders: they stay in place, and their own dependency subtrees hoist
  /// into them instead of crossing them.
  pub hoisting_limits: HashMap<PackageLocator, HashSet<StackString>>,
}

#[derive(Debug, Clone, Error, deno_error::JsError)]
pub enum HoistError {
  /// The hoisted tree no longer satisfies the require promise or the peer
  /// dependency promise somewhere. Always indicates a bug in the engine,
  /// never a property of the input.
  #[class(generic)]
  #[error("broken hoisting contracts {stage}:\n{log}\n{tree_dump}")]
  BrokenContracts {
    stage: String,
    log: String,
    tree_dump: String,
  },
}

/// Hoists the dependency graph into an equivalent tree where identical
/// package instances are shared as high up as possible.
///
/// The input graph is not mutated. Calling this twice on the same input
/// produces structurally equal outputs.
pub fn hoist(
  graph: &PackageGraph,
  options: &HoistOptions,
) -> Result<HoistedTree, HoistError> {
  let start = Instant::now();
  let debug_level =
    options.debug_level.unwrap_or_else(DebugLevel::from_env);
  let check = options.check || debug_level >= DebugLevel::Intensive;
  let output_reason = debug_level >= DebugLevel::Reasons;

  let mut tree = WorkTree::from_package_graph(graph, &options.hoisting_limits);
  Hoister::new(&mut tree, check, output_reason).hoist_to_root()?;

  if debug_level >= DebugLevel::Check {
    let log = self_check(&tree);
    if !log.is_empty() {
      return Err(HoistError::BrokenContracts {
        stage: "after hoisting finished".to_string(),
        log,
        tree_dump: dump_tree(&tree),
      });
    }
  }
  if debug_level >= DebugLevel::Reasons {
    debug!("hoisted tree:\n{}", dump_tree(&tree));
  }
  if debug_level >= DebugLevel::Perf {
    debug!("hoist time: {}ms", start.elapsed().as_millis());
  }

  Ok(shrink_tree(&tree))
}
