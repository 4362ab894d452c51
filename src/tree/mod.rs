//! Worktree tree view module
//!
//! Maps parsed worktrees to display nodes and serves them to a host tree view.

mod node;
mod provider;

pub use node::*;
pub use provider::*;
