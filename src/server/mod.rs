//! Host bridge module
//!
//! Serves the worktree tree to IDE hosts over WebSocket and routes their
//! requests to the tree provider.

mod handler;
#[allow(dead_code)]
mod protocol;
mod websocket;

#[allow(unused_imports)]
pub use handler::*;
#[allow(unused_imports)]
pub use protocol::*;
pub use websocket::*;
