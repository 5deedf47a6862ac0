//! # reconciler
//!
//! Incremental channel sync: fetch only the parts of a requested time range that are not
//! already covered by stored messages, persist them idempotently, record the new coverage
//! and return the complete message set for the range.
//!
//! - [`RangeReconciler`] – per-channel reconcile, multi-channel sync
//! - [`ReconcilerConfig`] – fetch timeout and concurrency bounds
//! - [`CancelHandle`] / [`CancelToken`] – stop starting new gap fetches

mod cancel;
mod config;
mod locks;
mod outcome;
mod reconciler;

pub use cancel::{CancelHandle, CancelToken};
pub use config::ReconcilerConfig;
pub use outcome::{GapFailure, ReconcileOutcome, SyncedChannel};
pub use reconciler::RangeReconciler;
