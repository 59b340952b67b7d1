//! Nodes shipped with the runtime.
//!
//! | Identifier | Address   | Routes                                              |
//! |------------|-----------|-----------------------------------------------------|
//! | `ping`     | `ping`    | `ping` (public)                                     |
//! | `storage`  | `storage` | `get`, `size` (public), `put`, `remove`, `clear`    |

pub mod ping;
pub mod storage;

pub use ping::PingNode;
pub use storage::StorageNode;

use crate::handler::CoreHandler;
use crate::registry::NodeRegistry;
use std::sync::Arc;

/// Registry holding every built-in node.
pub fn builtin() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry
        .register(ping::ADDRESS, |_ctx| {
            Ok(Arc::new(PingNode::new()) as Arc<dyn CoreHandler>)
        })
        .register(storage::ADDRESS, |ctx| {
            let map = ctx.storage(storage::ADDRESS);
            Ok(Arc::new(StorageNode::new(map)) as Arc<dyn CoreHandler>)
        });
    registry
}
