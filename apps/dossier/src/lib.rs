//! # dossier
//!
//! Application layer over `dossier-core`: configuration loading and the
//! HTTP API. The binary adds the CLI on top.

pub mod api;
pub mod config;
