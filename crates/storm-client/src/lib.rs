//! # Perfect Storm API Client
//!
//! Typed access to the remote resource store: groups, applications,
//! recipes, triggers and nodes, plus a shortcuts facade for resolving
//! members to their hosting nodes.
//!
//! Queries are MongoDB-style documents passed verbatim to the API server
//! (see `storm_core::Query`); nothing is evaluated locally.

pub mod client;
pub mod error;

pub use client::{ApiClient, Collection, Groups, Shortcuts, Triggers};
pub use error::{ApiError, Result};
