//! Loading catalogs, interface definitions and settings.
//!
//! Everything is read through the persistence capability. Blob layout:
//!
//! - `config` - [`EngineSettings`]
//! - `interface` - [`InterfaceDefinition`]
//! - `pipeline/*` - pipeline fragments, concatenated into the catalog

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::schema::{EngineSettings, InterfaceDefinition, PipelineDictionary};
use crate::error::{PipequeueError, Result};
use crate::state::{read_json, write_json, BlobStore};

/// Blob holding engine settings.
pub const SETTINGS_BLOB: &str = "config";

/// Blob holding the interface definition.
pub const INTERFACE_BLOB: &str = "interface";

/// Directory holding pipeline fragments.
pub const PIPELINE_DIR: &str = "pipeline";

/// Everything the engine needs from persistence.
#[derive(Debug, Clone, Default)]
pub struct ProjectData {
    pub settings: EngineSettings,
    pub interface: InterfaceDefinition,
    pub catalog: PipelineDictionary,
}

/// Load engine settings, falling back to defaults when absent.
pub fn load_settings(store: &dyn BlobStore) -> Result<EngineSettings> {
    Ok(read_json(store, SETTINGS_BLOB)?.unwrap_or_default())
}

/// Persist engine settings.
pub fn save_settings(store: &dyn BlobStore, settings: &EngineSettings) -> Result<()> {
    write_json(store, SETTINGS_BLOB, settings)
}

/// Load the interface definition, falling back to an empty one.
pub fn load_interface(store: &dyn BlobStore) -> Result<InterfaceDefinition> {
    let interface: InterfaceDefinition = read_json(store, INTERFACE_BLOB)?.unwrap_or_default();

    let mut undefined: Vec<_> = interface.undefined_options().into_iter().collect();
    undefined.sort_unstable();
    for name in undefined {
        warn!("Interface references undefined option '{}'", name);
    }

    Ok(interface)
}

/// Persist the interface definition.
pub fn save_interface(store: &dyn BlobStore, interface: &InterfaceDefinition) -> Result<()> {
    write_json(store, INTERFACE_BLOB, interface)
}

/// Load and concatenate every pipeline fragment.
///
/// Fragments are read in sorted name order.
///
/// # Errors
///
/// Returns `DuplicateTask` if two fragments define the same task, and
/// `ConfigParse` if a fragment is malformed.
pub fn load_catalog(store: &dyn BlobStore) -> Result<PipelineDictionary> {
    let mut catalog = PipelineDictionary::new();
    let mut sources: HashMap<String, String> = HashMap::new();

    for blob in store.list(PIPELINE_DIR)? {
        let Some(fragment) = read_json::<PipelineDictionary>(store, &blob)? else {
            continue;
        };
        debug!("Loaded {} tasks from '{}'", fragment.len(), blob);

        for (name, definition) in fragment {
            if let Some(first) = sources.get(&name) {
                return Err(PipequeueError::DuplicateTask {
                    name,
                    first: first.clone(),
                    second: blob.clone(),
                });
            }
            sources.insert(name.clone(), blob.clone());
            catalog.insert(name, definition);
        }
    }

    Ok(catalog)
}

/// Persist one pipeline fragment under `pipeline/<name>`.
pub fn save_pipeline(store: &dyn BlobStore, name: &str, fragment: &PipelineDictionary) -> Result<()> {
    write_json(store, &format!("{}/{}", PIPELINE_DIR, name), fragment)
}

/// Load settings, interface and catalog together.
pub fn load_project(store: &dyn BlobStore) -> Result<ProjectData> {
    Ok(ProjectData {
        settings: load_settings(store)?,
        interface: load_interface(store)?,
        catalog: load_catalog(store)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{TargetKind, TaskInterfaceItem};
    use crate::state::MemoryBlobStore;

    #[test]
    fn missing_blobs_fall_back_to_defaults() {
        let store = MemoryBlobStore::new();
        let project = load_project(&store).unwrap();

        assert_eq!(project.settings, EngineSettings::default());
        assert!(project.interface.task.is_empty());
        assert!(project.catalog.is_empty());
    }

    #[test]
    fn catalog_concatenates_fragments() {
        let store = MemoryBlobStore::new()
            .with_blob("pipeline/a", r#"{"A": {"action": "Click"}}"#)
            .with_blob("pipeline/b", r#"{"B": {"next": "A"}}"#);

        let catalog = load_catalog(&store).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["B"].links(), vec!["A"]);
    }

    #[test]
    fn duplicate_tasks_across_fragments_are_rejected() {
        let store = MemoryBlobStore::new()
            .with_blob("pipeline/a", r#"{"Start": {}}"#)
            .with_blob("pipeline/b", r#"{"Start": {}}"#);

        let err = load_catalog(&store).unwrap_err();
        match err {
            PipequeueError::DuplicateTask {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "Start");
                assert_eq!(first, "pipeline/a");
                assert_eq!(second, "pipeline/b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_fragment_is_a_parse_error() {
        let store = MemoryBlobStore::new().with_blob("pipeline/bad", r#"{"A": {"roi": {"x": 1}}}"#);
        let err = load_catalog(&store).unwrap_err();
        assert!(matches!(err, PipequeueError::ConfigParse { .. }));
    }

    #[test]
    fn settings_round_trip() {
        let store = MemoryBlobStore::new();
        let mut settings = EngineSettings::default();
        settings.connection.target = TargetKind::Desktop;
        settings.connection.desktop.hwnd = 42;

        save_settings(&store, &settings).unwrap();
        assert_eq!(load_settings(&store).unwrap(), settings);
    }

    #[test]
    fn interface_and_pipeline_round_trip() {
        let store = MemoryBlobStore::new();
        let mut interface = InterfaceDefinition::default();
        interface.task.push(TaskInterfaceItem::new("Daily", "DailyStart"));
        save_interface(&store, &interface).unwrap();

        let mut fragment = PipelineDictionary::new();
        fragment.insert("DailyStart".into(), Default::default());
        save_pipeline(&store, "daily", &fragment).unwrap();

        let project = load_project(&store).unwrap();
        assert_eq!(project.interface, interface);
        assert!(project.catalog.contains_key("DailyStart"));
    }
}
