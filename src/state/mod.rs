//! Persistence capability.
//!
//! This module provides the blob store the engine uses to read and write
//! pipeline catalogs, interface definitions and settings.

pub mod store;

pub use store::{read_json, write_json, BlobStore, FileBlobStore, MemoryBlobStore};
