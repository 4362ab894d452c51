//! Worktree tree-data provider
//!
//! Serves the flat list of worktree nodes to a host tree view and notifies
//! subscribers when a manual refresh completes or any fetch fails.

use std::future::Future;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use super::DisplayNode;
use crate::config::DisplayConfig;
use crate::git::{CommandRunner, ListError, WorktreeLister};

/// Errors that can occur while producing tree content
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    List(#[from] ListError),
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Events broadcast to tree subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// The tree content changed and should be redrawn
    Changed { node_count: usize },
    /// A fetch could not list the worktrees
    FetchFailed { message: String },
}

/// Capability a host tree view consumes
pub trait TreeDataProvider: Send + Sync {
    /// Children of `parent`, or the root entries when `parent` is `None`
    fn produce_children(
        &self,
        parent: Option<&str>,
    ) -> impl Future<Output = ProviderResult<Vec<DisplayNode>>> + Send;

    /// Re-fetch the tree and notify subscribers
    fn refresh(&self) -> impl Future<Output = ProviderResult<usize>> + Send;

    /// Receive change notifications
    fn subscribe(&self) -> broadcast::Receiver<TreeEvent>;
}

/// Provides one leaf node per worktree of a repository
///
/// Fetches are serialised: a fetch requested while another is running waits
/// for it to finish, in arrival order.
pub struct WorktreeTreeProvider<R> {
    lister: WorktreeLister<R>,
    display: DisplayConfig,
    fetch_lock: Mutex<()>,
    event_tx: broadcast::Sender<TreeEvent>,
}

impl<R: CommandRunner> WorktreeTreeProvider<R> {
    /// Create a provider around a lister
    pub fn new(lister: WorktreeLister<R>, display: DisplayConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            lister,
            display,
            fetch_lock: Mutex::new(()),
            event_tx,
        }
    }

    pub fn lister(&self) -> &WorktreeLister<R> {
        &self.lister
    }

    async fn fetch_nodes(&self) -> ProviderResult<Vec<DisplayNode>> {
        let _guard = self.fetch_lock.lock().await;

        let listing = match self.lister.fetch().await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Failed to list worktrees in {}: {}", self.lister.repo_root().display(), e);
                let _ = self.event_tx.send(TreeEvent::FetchFailed {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        Ok(listing
            .records()
            .iter()
            .map(|record| DisplayNode::from_record(record, &self.display))
            .collect())
    }
}

impl<R: CommandRunner> TreeDataProvider for WorktreeTreeProvider<R> {
    async fn produce_children(&self, parent: Option<&str>) -> ProviderResult<Vec<DisplayNode>> {
        if let Some(parent) = parent {
            debug!("Node {} has no children", parent);
            return Ok(Vec::new());
        }

        let nodes = self.fetch_nodes().await?;
        debug!("Produced {} root nodes", nodes.len());
        Ok(nodes)
    }

    async fn refresh(&self) -> ProviderResult<usize> {
        info!("Refreshing worktrees");

        let node_count = self.fetch_nodes().await?.len();
        let _ = self.event_tx.send(TreeEvent::Changed { node_count });
        Ok(node_count)
    }

    fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::FakeRunner;
    use crate::git::CommandOutput;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn provider(runner: FakeRunner) -> WorktreeTreeProvider<FakeRunner> {
        WorktreeTreeProvider::new(
            WorktreeLister::new("/home/u/proj", runner),
            DisplayConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_root_children() {
        let provider = provider(FakeRunner::stdout(
            "/home/u/proj abc123 [main]\n/home/u/proj-wt1 def456 [feature-x]\n",
        ));
        let nodes = provider.produce_children(None).await.unwrap();

        let labels: Vec<(&str, &str)> = nodes
            .iter()
            .map(|n| (n.label.as_str(), n.description.as_str()))
            .collect();
        assert_eq!(labels, vec![("", "main"), ("-wt1", "feature-x")]);
    }

    #[tokio::test]
    async fn test_child_of_node_is_empty_without_fetch() {
        let provider = provider(FakeRunner::stdout("/repo abc [main]\n"));
        let nodes = provider.produce_children(Some("/repo")).await.unwrap();
        assert!(nodes.is_empty());
        assert_eq!(provider.lister().runner().call_count(), 0);
    }

    #[tokio::test]
    async fn test_each_request_refetches() {
        let provider = provider(FakeRunner::stdout("/repo abc [main]\n"));
        provider.produce_children(None).await.unwrap();
        provider.produce_children(None).await.unwrap();
        assert_eq!(provider.lister().runner().call_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_broadcasts_change() {
        let provider = provider(FakeRunner::stdout("/r/a abc [a]\n/r/b def [b]\n"));
        let mut rx = provider.subscribe();

        let count = provider.refresh().await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(rx.recv().await.unwrap(), TreeEvent::Changed { node_count: 2 });
    }

    #[tokio::test]
    async fn test_refresh_failure_broadcasts_error() {
        let provider = provider(FakeRunner::failing(128, "fatal: not a git repository"));
        let mut rx = provider.subscribe();

        let result = provider.refresh().await;
        assert!(matches!(
            result,
            Err(ProviderError::List(ListError::Execution { .. }))
        ));

        match rx.recv().await.unwrap() {
            TreeEvent::FetchFailed { message } => {
                assert!(message.contains("not a git repository"));
            }
            other => panic!("Expected FetchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_children_failure_is_returned() {
        let provider = provider(FakeRunner::missing());
        let result = provider.produce_children(None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_children_failure_broadcasts_error() {
        let provider = provider(FakeRunner::failing(128, "fatal: not a git repository"));
        let mut rx = provider.subscribe();

        assert!(provider.produce_children(None).await.is_err());
        match rx.try_recv() {
            Ok(TreeEvent::FetchFailed { message }) => {
                assert!(message.contains("not a git repository"));
            }
            other => panic!("Expected FetchFailed, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_refresh_failure_broadcasts_once() {
        let provider = provider(FakeRunner::missing());
        let mut rx = provider.subscribe();

        assert!(provider.refresh().await.is_err());
        assert!(matches!(rx.try_recv(), Ok(TreeEvent::FetchFailed { .. })));
        assert!(rx.try_recv().is_err());
    }

    /// Runner that records how many invocations overlap
    #[derive(Default)]
    struct SlowRunner {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl CommandRunner for Arc<SlowRunner> {
        async fn run(
            &self,
            _program: &str,
            _args: &[&str],
            _cwd: &Path,
        ) -> std::io::Result<CommandOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(CommandOutput {
                code: Some(0),
                success: true,
                stdout: b"/repo abc [main]\n".to_vec(),
                stderr: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_are_queued() {
        let runner = Arc::new(SlowRunner::default());
        let provider = Arc::new(WorktreeTreeProvider::new(
            WorktreeLister::new("/repo", Arc::clone(&runner)),
            DisplayConfig::default(),
        ));
        let mut rx = provider.subscribe();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let provider = Arc::clone(&provider);
                tokio::spawn(async move { provider.refresh().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(runner.max_in_flight.load(Ordering::SeqCst), 1);
        for _ in 0..3 {
            assert_eq!(rx.recv().await.unwrap(), TreeEvent::Changed { node_count: 1 });
        }
    }
}
