//! Request building.
//!
//! This module turns user-selected interface items into resolved,
//! serialized queue entries:
//!
//! - [`TaskRequestBuilder`] - merges catalog, item overrides and option cases
//! - [`QueueEntry`] - one unit of work with a repeat count
//!
//! # Example
//!
//! ```
//! use pipequeue::config::{PipelineDictionary, TaskDefinition, TaskInterfaceItem};
//! use pipequeue::steps::TaskRequestBuilder;
//! use std::collections::BTreeMap;
//!
//! let mut catalog = PipelineDictionary::new();
//! catalog.insert("Start".to_string(), TaskDefinition::default());
//!
//! let builder = TaskRequestBuilder::new(catalog, BTreeMap::new());
//! let entry = builder.build(&TaskInterfaceItem::new("Daily", "Start"));
//!
//! assert_eq!(entry.repeat, 1);
//! assert!(entry.params.contains("Start"));
//! ```

pub mod request;

pub use request::{reachable_subset, QueueEntry, TaskRequestBuilder, EMPTY_PARAMS};
