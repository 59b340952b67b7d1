//! # Node Runtime
//!
//! Request handling and deployment for Chorus nodes.
//!
//! ## Request Path
//!
//! ```text
//! MessageBus ──> Consumer ──> worker ──> CoreContext::authorize(token) ──> Access
//!                                 │
//!                                 ▼
//!                 CoreHandler::handle(Request) ──> Protocol::get(access, action)
//!                                 │
//!                                 ▼
//!                 Request::{accept, write, error, ...} ──> Reply
//! ```
//!
//! ## Startup Path
//!
//! ```text
//! Configuration ──> Launcher::new ──> Launcher::start(block)
//!                                        └─> NodeRegistry ──> Deployment (sequential)
//! ```
//!
//! The `chorus` binary wires the built-in [`nodes`] into a [`Launcher`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod context;
pub mod deployment;
pub mod errors;
pub mod generator;
pub mod handler;
pub mod launcher;
pub mod nodes;
pub mod registry;
pub mod request;
pub mod storage;

pub use config::{ConfigError, Configuration, LauncherSettings, SystemSettings};
pub use context::{ContextListeners, CoreContext};
pub use deployment::Deployment;
pub use errors::NodeError;
pub use generator::{AuthenticationDependency, AuthenticationGenerator, GeneratorError};
pub use handler::{dispatch, process, route, CoreHandler, RouteFn};
pub use launcher::{LaunchError, Launcher};
pub use registry::{NodeFactory, NodeRegistry, NodeState};
pub use request::{ReplyOutcome, Request};
pub use storage::{AsyncKeyValueStore, SharedMap, StorageError};
