//! Storage module
//!
//! Provides the persistence codec for the entity graph.

pub mod data_file;

pub use data_file::{DataFile, LoadedData};
