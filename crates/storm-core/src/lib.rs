//! # Perfect Storm Resource Model
//!
//! Common resource types shared by every Perfect Storm executor: nodes,
//! groups, applications, recipes and triggers, plus the MongoDB-style query
//! documents the API server evaluates.
//!
//! Executors hold only transient in-memory projections of these resources;
//! the API store owns all durable state, and resources are shared by
//! identity (`cloud_id` / `uuid`), never by reference.

pub mod application;
pub mod error;
pub mod group;
pub mod query;
pub mod recipe;
pub mod resource;
pub mod trigger;
pub mod validation;

// Re-export main types for convenience
pub use application::{Application, Link, ServiceRef, UserApplication};
pub use error::{Result, StormError};
pub use group::{Group, ServiceDef};
pub use query::{Cond, Query};
pub use recipe::Recipe;
pub use resource::{Engine, Member, Node, ResourceStatus};
pub use trigger::{NewTrigger, Trigger, TriggerStatus};
