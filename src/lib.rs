//! Core library for the fleet-fuel-tools command line application.
//!
//! The library turns monthly fuel exports (one spreadsheet per
//! organizational unit) into a reconciled, auditable table. IO adapters live
//! under [`io`], the record types in [`model`], each pipeline stage in its
//! own module ([`loader`], [`classify`], [`consolidate`], [`reconcile`],
//! [`anomaly`], [`aggregate`]), and the orchestration in [`pipeline`].

pub mod aggregate;
pub mod anomaly;
pub mod cache;
pub mod classify;
pub mod config;
pub mod consolidate;
pub mod coverage;
pub mod error;
pub mod io;
pub mod loader;
pub mod model;
pub mod money;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use error::{Result, ToolError};
pub use normalize::normalize;
pub use money::parse_amount;
