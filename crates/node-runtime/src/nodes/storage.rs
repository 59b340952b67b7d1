//! # Storage Node
//!
//! Key-value access over the bus, backed by an [`AsyncKeyValueStore`].
//!
//! | Action   | Access     | Fields           | Reply                         |
//! |----------|------------|------------------|-------------------------------|
//! | `get`    | Public     | `key`            | `{key, value}` or MISSING     |
//! | `size`   | Public     |                  | `{size}`                      |
//! | `put`    | Authorized | `key`, `value`   | ACCEPTED or CONFLICT          |
//! | `remove` | Admin      | `key`            | `{key, value}` or MISSING     |
//! | `clear`  | Admin      |                  | ACCEPTED                      |

use crate::errors::NodeError;
use crate::handler::{dispatch, route, CoreHandler, RouteFn};
use crate::request::Request;
use crate::storage::AsyncKeyValueStore;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{Access, Payload, Protocol};
use std::sync::Arc;
use tracing::debug;

/// Bus address and registry identifier.
pub const ADDRESS: &str = "storage";

const ID_KEY: &str = "key";
const ID_VALUE: &str = "value";
const ID_SIZE: &str = "size";

/// Key-value node.
pub struct StorageNode {
    protocol: Protocol<RouteFn>,
}

impl StorageNode {
    /// Create a node serving `store`.
    pub fn new(store: Arc<dyn AsyncKeyValueStore>) -> Self {
        let mut protocol = Protocol::new();

        let get = Arc::clone(&store);
        protocol.use_route(
            "get",
            route(move |request: Request| {
                let store = Arc::clone(&get);
                async move {
                    let key = request.text(ID_KEY)?;
                    let value = store.get(key).await?;
                    request.write(entry(key, value));
                    Ok(())
                }
            }),
            Access::Public,
        );

        let size = Arc::clone(&store);
        protocol.use_route(
            "size",
            route(move |request: Request| {
                let store = Arc::clone(&size);
                async move {
                    let mut payload = Payload::new();
                    payload.insert(ID_SIZE.into(), store.size().await?.into());
                    request.write(payload);
                    Ok(())
                }
            }),
            Access::Public,
        );

        let put = Arc::clone(&store);
        protocol.route(
            "put",
            route(move |request: Request| {
                let store = Arc::clone(&put);
                async move {
                    let key = request.text(ID_KEY)?;
                    let value = request
                        .field(ID_VALUE)
                        .cloned()
                        .ok_or_else(|| NodeError::InvalidField(ID_VALUE.into()))?;
                    store.put_if_absent(key, value).await?;
                    debug!(store = %store.name(), key = %key, sender = %request.sender(), "Value stored");
                    request.accept();
                    Ok(())
                }
            }),
        );

        let remove = Arc::clone(&store);
        protocol.use_route(
            "remove",
            route(move |request: Request| {
                let store = Arc::clone(&remove);
                async move {
                    let key = request.text(ID_KEY)?;
                    let value = store.remove(key).await?;
                    request.write(entry(key, value));
                    Ok(())
                }
            }),
            Access::Admin,
        );

        let clear = store;
        protocol.use_route(
            "clear",
            route(move |request: Request| {
                let store = Arc::clone(&clear);
                async move {
                    store.clear().await?;
                    request.accept();
                    Ok(())
                }
            }),
            Access::Admin,
        );

        Self { protocol }
    }
}

fn entry(key: &str, value: Value) -> Payload {
    let mut payload = Payload::new();
    payload.insert(ID_KEY.into(), key.into());
    payload.insert(ID_VALUE.into(), value);
    payload
}

#[async_trait]
impl CoreHandler for StorageNode {
    fn address(&self) -> &str {
        ADDRESS
    }

    async fn handle(&self, request: Request) -> Result<(), NodeError> {
        dispatch(&self.protocol, request).await
    }
}
