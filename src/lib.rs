//! Oscar award / movie metadata title reconciliation - shared modules for all binaries.

pub mod config;
pub mod curation;
pub mod dataset;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod safety;
pub mod scoring;
