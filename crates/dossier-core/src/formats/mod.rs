//! # Formats
//!
//! Byte-level file formats of the engine. File I/O itself lives in the app.

mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, graph_from_bytes, graph_to_bytes,
};
