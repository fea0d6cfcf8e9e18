//! # Storage Backends
//!
//! Disk-backed implementations of [`crate::graph::GraphFacade`].

mod redb_graph;

pub use redb_graph::RedbGraph;
