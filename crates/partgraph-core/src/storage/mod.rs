//! # Storage
//!
//! Disk-backed stores. The design graph itself lives in memory for the
//! duration of a run; what persists across runs is the part catalog.

pub mod catalog;

pub use catalog::CatalogStore;
