//! # Perfect Storm Consul Executor
//!
//! Reconciles a Consul deployment over a pool of managed nodes: elects a
//! server node, fans client agents out to the rest of the pool, keeps the
//! Consul service catalog synchronised with the declared group services,
//! and federates with remote pools over WAN.
//!
//! Sub-managers run sequentially on every reconcile, in this order:
//! server, clients, services, federation.

pub mod catalog;
pub mod clients;
pub mod context;
pub mod federation;
pub mod reconciler;
pub mod recipes;
pub mod server;
pub mod services;

pub use catalog::{ConsulCatalog, MANAGED_TAG};
pub use context::ConsulContext;
pub use reconciler::ConsulReconciler;
