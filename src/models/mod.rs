//! Data models for pgscope.
//!
//! This module re-exports the value types shared by the query and db layers.

pub mod query;

pub use query::QueryParam;
