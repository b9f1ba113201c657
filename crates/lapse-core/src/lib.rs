//! lapse-core library.
//!
//! Lifecycle and retention engine for request/project work items: the item
//! model, the retention sweep, the lifecycle controller, and the scheduler
//! that drives sweeps on a fixed cadence.
//!
//! # Conventions
//!
//! - **Errors**: Engine operations return [`error::LifecycleError`]; glue code
//!   uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Time**: Nothing reads the wall clock directly; pass a [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod lock;
pub mod model;
pub mod retention;
pub mod scheduler;
pub mod store;
pub mod views;
