//! Git operations module
//!
//! Resolves the repository root, runs `git worktree list` and parses its output.

#[allow(dead_code)]
mod lister;
mod repo;
#[allow(dead_code)]
mod worktree;

pub use lister::*;
pub use repo::*;
pub use worktree::*;
