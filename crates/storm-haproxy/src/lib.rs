//! # Perfect Storm Load Balancer Executor
//!
//! Manages one HAProxy instance per exposed application service and keeps
//! its backend membership equal to the service's endpoints through
//! HAProxy's runtime socket, using slot-based dynamic membership over a
//! pre-declared server template (no configuration reloads).

pub mod error;
pub mod haproxy;
pub mod manager;
pub mod reconciler;
pub mod recipes;

pub use error::{HaproxyError, Result};
pub use haproxy::{HaproxyClient, SlotTable, BACKEND, MAX_SLOTS, RUNTIME_PORT};
pub use reconciler::LoadBalancerReconciler;
