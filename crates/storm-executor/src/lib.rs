//! # Perfect Storm Executor Substrate
//!
//! The generic convergence machinery shared by every out-of-process
//! executor:
//!
//! - **Trigger driver**: create a trigger, poll it to a terminal status,
//!   surface the result or failure reason.
//! - **Polling executor**: setup, then poll-for-change / reconcile forever,
//!   with the membership-snapshot change detector.
//! - **Monitor executor**: the same loop driven by differential
//!   `(added, updated, deleted)` change feeds.
//! - **Handler host**: the consuming side of the trigger contract.
//!
//! Reconcilers are idempotent and tolerate partial state from previous
//! ticks; transient failures are retried on the next tick while validation
//! failures abort the process.

pub mod error;
pub mod handler;
pub mod monitor;
pub mod options;
pub mod poll;
pub mod trigger;

pub use error::{ExecutorError, Result};
pub use handler::{HandlerHost, TriggerHandler};
pub use monitor::{ApplicationsMonitor, Monitor, ResourceDiff};
pub use options::{init_logging, ExecutorOpts, DEFAULT_SERVER};
pub use poll::{run_reconciler, GroupWatch, Reconciler};
pub use trigger::{TriggerDriver, DEFAULT_WAIT_INTERVAL};
