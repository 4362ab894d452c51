//! WebSocket server implementation
//!
//! Provides a WebSocket server that listens on a configurable port and serves
//! the worktree tree to IDE host connections.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handler::ConnectionHandler;
use super::protocol::ServerMessage;
use crate::tree::{TreeDataProvider, TreeEvent};

/// Configuration for the WebSocket server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self { bind, port }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// WebSocket server for handling IDE host connections
pub struct WebSocketServer<P> {
    config: ServerConfig,
    provider: Arc<P>,
    workspace: String,
    server_id: Uuid,
    shutdown_tx: broadcast::Sender<()>,
}

impl<P: TreeDataProvider + 'static> WebSocketServer<P> {
    /// Create a new WebSocket server serving `provider` for `workspace`
    pub fn new(config: ServerConfig, provider: Arc<P>, workspace: impl Into<String>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            provider,
            workspace: workspace.into(),
            server_id: Uuid::new_v4(),
            shutdown_tx,
        }
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured address and run the server
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown.
    ///
    /// Each connection is handled concurrently on its own task.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        info!(
            "WebSocket server {} listening on ws://{}/ws",
            self.server_id,
            listener.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let handler = ConnectionHandler::new(Arc::clone(&self.provider));
                            let events = self.provider.subscribe();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let welcome = ServerMessage::welcome(self.server_id.to_string(), self.workspace.clone());

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, handler, welcome, events, shutdown_rx).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handle a single WebSocket connection
async fn handle_connection<P: TreeDataProvider>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: ConnectionHandler<P>,
    welcome: ServerMessage,
    mut events: broadcast::Receiver<TreeEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let connection_id = handler.connection_id();
    info!("New connection {} from {}", connection_id, peer_addr);

    // Upgrade to WebSocket
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    ws_sender.send(Message::Text(welcome.to_json()?)).await?;
    debug!("Sent welcome message to {}", peer_addr);

    loop {
        tokio::select! {
            // Receive messages from client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Received message from {}: {}", peer_addr, text);

                        if let Some(response) = handler.handle(&text).await {
                            ws_sender.send(Message::Text(response.to_json()?)).await?;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Received binary message from {} ({} bytes), ignoring", peer_addr, data.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sender.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} requested close", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Connection closed by {}", peer_addr);
                        break;
                    }
                }
            }
            // Forward tree events
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let message = ServerMessage::from(event);
                        ws_sender.send(Message::Text(message.to_json()?)).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Connection {} lagged by {} tree events", connection_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            // Handle shutdown signal
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, closing connection to {}", peer_addr);
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("Connection {} from {} closed", connection_id, peer_addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::git::testing::FakeRunner;
    use crate::git::WorktreeLister;
    use crate::server::protocol::{ClientMessage, ErrorCode};
    use crate::tree::WorktreeTreeProvider;
    use tokio_tungstenite::connect_async;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::new("127.0.0.1".to_string(), 9000);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000");
    }

    async fn start(
        runner: FakeRunner,
    ) -> (Arc<WebSocketServer<WorktreeTreeProvider<FakeRunner>>>, SocketAddr) {
        let provider = WorktreeTreeProvider::new(
            WorktreeLister::new("/srv/repo", runner),
            DisplayConfig::default(),
        );
        let server = Arc::new(WebSocketServer::new(
            ServerConfig::new("127.0.0.1".to_string(), 0),
            Arc::new(provider),
            "/srv/repo",
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = Arc::clone(&server);
        tokio::spawn(async move { serving.serve(listener).await });

        (server, addr)
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("Expected text message, got {:?}", other),
            }
        }
    }

    fn text(message: ClientMessage) -> Message {
        Message::Text(serde_json::to_string(&message).unwrap())
    }

    #[tokio::test]
    async fn test_session_children_and_refresh() {
        let (server, addr) = start(FakeRunner::stdout(
            "/srv/repo abc [main]\n/srv/repo/wt def [dev]\n",
        ))
        .await;
        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

        match next_message(&mut ws).await {
            ServerMessage::Welcome { workspace, version, .. } => {
                assert_eq!(workspace, "/srv/repo");
                assert_eq!(version, 1);
            }
            other => panic!("Expected Welcome, got {:?}", other),
        }

        ws.send(text(ClientMessage::get_root())).await.unwrap();
        match next_message(&mut ws).await {
            ServerMessage::Children { nodes, .. } => assert_eq!(nodes.len(), 2),
            other => panic!("Expected Children, got {:?}", other),
        }

        ws.send(text(ClientMessage::Refresh)).await.unwrap();
        assert_eq!(
            next_message(&mut ws).await,
            ServerMessage::TreeChanged { node_count: 2 }
        );

        ws.send(text(ClientMessage::ping(7))).await.unwrap();
        assert_eq!(next_message(&mut ws).await, ServerMessage::Pong { seq: 7 });

        server.shutdown();
    }

    #[tokio::test]
    async fn test_refresh_failure_reaches_every_connection() {
        let (server, addr) = start(FakeRunner::failing(1, "fatal: boom")).await;
        let (mut first, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let (mut second, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        next_message(&mut first).await;
        next_message(&mut second).await;

        first.send(text(ClientMessage::Refresh)).await.unwrap();

        for ws in [&mut first, &mut second] {
            match next_message(ws).await {
                ServerMessage::Error { code, message } => {
                    assert_eq!(code, Some(ErrorCode::ExecutionFailed));
                    assert!(message.contains("fatal: boom"));
                }
                other => panic!("Expected Error, got {:?}", other),
            }
        }

        server.shutdown();
    }

    #[tokio::test]
    async fn test_children_failure_reaches_other_connections() {
        let (server, addr) = start(FakeRunner::failing(128, "fatal: not a git repository")).await;
        let (mut requester, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let (mut watcher, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        next_message(&mut requester).await;
        next_message(&mut watcher).await;

        requester.send(text(ClientMessage::get_root())).await.unwrap();

        for ws in [&mut requester, &mut watcher] {
            match next_message(ws).await {
                ServerMessage::Error { code, message } => {
                    assert_eq!(code, Some(ErrorCode::ExecutionFailed));
                    assert!(message.contains("not a git repository"));
                }
                other => panic!("Expected Error, got {:?}", other),
            }
        }

        server.shutdown();
    }
}
