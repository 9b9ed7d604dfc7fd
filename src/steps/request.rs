//! Resolved queue entries.
//!
//! A [`QueueEntry`] combines the catalog with an interface item's own
//! overrides and its selected option cases, producing a serialized
//! parameter blob the backend can execute.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::loader::ProjectData;
use crate::config::merger::merge_all;
use crate::config::schema::{PipelineDictionary, SelectableOption, TaskInterfaceItem};

/// Blob substituted when parameters can't be serialized.
pub const EMPTY_PARAMS: &str = "{}";

/// One resolved unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    /// Display name.
    pub name: String,

    /// Entry-point task name.
    pub entry: String,

    /// Number of backend steps to run (at least 1).
    pub repeat: u32,

    /// Serialized pipeline dictionary for this entry.
    pub params: String,
}

/// Builds queue entries from interface items.
#[derive(Debug, Clone, Default)]
pub struct TaskRequestBuilder {
    catalog: PipelineDictionary,
    options: BTreeMap<String, SelectableOption>,
}

impl TaskRequestBuilder {
    /// Create a builder over a catalog and an option catalogue.
    pub fn new(catalog: PipelineDictionary, options: BTreeMap<String, SelectableOption>) -> Self {
        Self { catalog, options }
    }

    /// Create a builder from loaded project data.
    pub fn from_project(project: &ProjectData) -> Self {
        Self::new(project.catalog.clone(), project.interface.option.clone())
    }

    /// The catalog every entry starts from.
    pub fn catalog(&self) -> &PipelineDictionary {
        &self.catalog
    }

    /// Merge the catalog, the item's overrides and its selected cases.
    ///
    /// Selections whose option or case doesn't exist are skipped with a
    /// warning. The catalog itself is never modified.
    pub fn resolve(&self, item: &TaskInterfaceItem) -> PipelineDictionary {
        let mut fragments = vec![&item.pipeline_override];

        for selected in &item.option {
            let Some(option) = self.options.get(&selected.name) else {
                warn!(
                    "Task '{}' selects unknown option '{}'",
                    item.name, selected.name
                );
                continue;
            };
            match option.resolve_case(selected) {
                Some(case) => {
                    debug!(
                        "Task '{}' applies option '{}' case '{}'",
                        item.name, selected.name, case.name
                    );
                    fragments.push(&case.pipeline_override);
                }
                None => warn!(
                    "Task '{}' selects missing case {:?} of option '{}'",
                    item.name, selected.index, selected.name
                ),
            }
        }

        merge_all(&self.catalog, fragments)
    }

    /// Build the queue entry for one interface item.
    pub fn build(&self, item: &TaskInterfaceItem) -> QueueEntry {
        let resolved = self.resolve(item);
        if !resolved.contains_key(&item.entry) {
            warn!(
                "Entry task '{}' of '{}' is not in the pipeline",
                item.entry, item.name
            );
        }

        let subset = reachable_subset(&resolved, &item.entry);

        QueueEntry {
            name: item.name.clone(),
            entry: item.entry.clone(),
            repeat: item.effective_repeat(),
            params: serialize_params(&subset),
        }
    }

    /// Build entries for several items, preserving order.
    pub fn build_all<'a, I>(&self, items: I) -> Vec<QueueEntry>
    where
        I: IntoIterator<Item = &'a TaskInterfaceItem>,
    {
        items.into_iter().map(|item| self.build(item)).collect()
    }
}

/// Tasks reachable from `entry`, including `entry`.
///
/// Follows link fields and `roi` values that name a task. Names of tasks
/// that don't exist are ignored.
pub fn reachable_subset(dictionary: &PipelineDictionary, entry: &str) -> PipelineDictionary {
    let mut subset = PipelineDictionary::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pending: VecDeque<&str> = VecDeque::from([entry]);

    while let Some(name) = pending.pop_front() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(definition) = dictionary.get(name) {
            pending.extend(definition.links());
            pending.extend(definition.roi_task());
            subset.insert(name.to_string(), definition.clone());
        }
    }

    subset
}

/// Serialize parameters, substituting `{}` on failure.
fn serialize_params<T: Serialize>(params: &T) -> String {
    serde_json::to_string_pretty(params).unwrap_or_else(|e| {
        warn!("Failed to serialize task parameters: {}", e);
        EMPTY_PARAMS.to_string()
    })
}
