//! Worktree lister
//!
//! Runs `git worktree list` for a repository root through a pluggable
//! [`CommandRunner`] and hands the output to the parser.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use super::worktree::{parse_worktree_list, WorktreeListing};

/// Default name of the git executable
pub const DEFAULT_GIT_PROGRAM: &str = "git";

/// Arguments passed to git, no extra flags
pub const WORKTREE_LIST_ARGS: [&str; 2] = ["worktree", "list"];

/// Errors that can occur while listing worktrees
#[derive(Error, Debug)]
pub enum ListError {
    #[error("No workspace folder found: {0}")]
    NoWorkspace(String),
    #[error("Failed to run `{program} worktree list`: {reason}")]
    Execution { program: String, reason: String },
}

impl ListError {
    fn execution(program: &str, reason: impl Into<String>) -> Self {
        ListError::Execution {
            program: program.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for lister operations
pub type ListResult<T> = Result<T, ListError>;

/// Captured result of a finished external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Capability to run an external program to completion
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> impl Future<Output = std::io::Result<CommandOutput>> + Send;
}

/// Runs programs as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: &Path,
    ) -> std::io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output.into())
    }
}

/// Lists the worktrees of one repository
///
/// Holds the repository root resolved at startup together with the command
/// runner used to reach git.
#[derive(Debug)]
pub struct WorktreeLister<R> {
    repo_root: PathBuf,
    git_program: String,
    runner: R,
}

impl<R: CommandRunner> WorktreeLister<R> {
    /// Create a lister for `repo_root` using the default git program
    pub fn new(repo_root: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            repo_root: repo_root.into(),
            git_program: DEFAULT_GIT_PROGRAM.to_string(),
            runner,
        }
    }

    /// Set the git executable to invoke
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn git_program(&self) -> &str {
        &self.git_program
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `git worktree list` and return its standard output
    pub async fn fetch_raw(&self) -> ListResult<String> {
        debug!(
            "Running {} {} in {}",
            self.git_program,
            WORKTREE_LIST_ARGS.join(" "),
            self.repo_root.display()
        );

        let output = self
            .runner
            .run(&self.git_program, &WORKTREE_LIST_ARGS, &self.repo_root)
            .await
            .map_err(|e| ListError::execution(&self.git_program, e.to_string()))?;

        if !output.success {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let status = match output.code {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            };
            let reason = if stderr.is_empty() {
                status
            } else {
                format!("{}: {}", status, stderr)
            };
            return Err(ListError::execution(&self.git_program, reason));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| ListError::execution(&self.git_program, "output is not valid UTF-8"))
    }

    /// Fetch and parse the worktree listing
    pub async fn fetch(&self) -> ListResult<WorktreeListing> {
        let raw = self.fetch_raw().await?;
        let listing = parse_worktree_list(&raw);
        debug!(
            "Parsed {} worktrees (common prefix {:?})",
            listing.len(),
            listing.common_prefix()
        );
        Ok(listing)
    }
}
