//! Returns intake engine
//!
//! Reconciles physically received return packages against their declared shipment lines.
//! An operator scans a carrier tracking number, then one LPN per unit; every unit is
//! checked against the order it was returned for and committed to a shared store that
//! several scanning devices write to at once.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod events;
pub mod intake;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::{ErrorKind, IntakeError};
pub use repositories::{InboundStore, StoreError};
pub use services::ScanSession;
