//! Integration tests for loading projects and building queue entries.

use pipequeue::config::{
    load_project, merge_pipelines, ParamValue, PipelineDictionary, TaskDefinition,
};
use pipequeue::state::{FileBlobStore, MemoryBlobStore};
use pipequeue::steps::{TaskRequestBuilder, EMPTY_PARAMS};
use pipequeue::PipequeueError;
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "A": {"recognition": "TemplateMatch", "roi": [0, 0, 100, 100], "next": "A2"},
    "A2": {"action": "Click"},
    "B": {"action": "Swipe"}
}"#;

const INTERFACE: &str = r#"{
    "task": [
        {"name": "Farm", "entry": "A", "check": true, "repeatable": true, "repeat_count": 3,
         "option": [{"name": "Opt", "index": 0}]},
        {"name": "Swipe", "entry": "B"}
    ],
    "option": {
        "Opt": {
            "cases": [
                {"name": "Left", "pipeline_override": {"A": {"roi": [10, 20, 30, 40]}}},
                {"name": "Right", "pipeline_override": {"A": {"roi": [50, 20, 30, 40]}}}
            ]
        }
    }
}"#;

fn project_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("pipeline")).unwrap();
    fs::write(temp.path().join("pipeline/main.json"), CATALOG).unwrap();
    fs::write(temp.path().join("interface.json"), INTERFACE).unwrap();
    temp
}

#[test]
fn selected_case_overrides_roi_and_excludes_unrelated_tasks() {
    let temp = project_dir();
    let project = load_project(&FileBlobStore::new(temp.path())).unwrap();
    let builder = TaskRequestBuilder::from_project(&project);

    let item = project.interface.find_item("Farm").unwrap();
    let entry = builder.build(item);

    assert_eq!(entry.entry, "A");
    assert_eq!(entry.repeat, 3);

    let params: PipelineDictionary = serde_json::from_str(&entry.params).unwrap();
    let keys: Vec<_> = params.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["A", "A2"]);
    assert_eq!(params["A"].roi, Some(ParamValue::IntList(vec![10, 20, 30, 40])));
    assert_eq!(params["A"].recognition.as_deref(), Some("TemplateMatch"));
}

#[test]
fn non_repeatable_item_runs_once() {
    let temp = project_dir();
    let project = load_project(&FileBlobStore::new(temp.path())).unwrap();
    let builder = TaskRequestBuilder::from_project(&project);

    let entry = builder.build(project.interface.find_item("Swipe").unwrap());
    assert_eq!(entry.repeat, 1);
}

#[test]
fn catalog_is_not_changed_by_building() {
    let temp = project_dir();
    let project = load_project(&FileBlobStore::new(temp.path())).unwrap();
    let builder = TaskRequestBuilder::from_project(&project);

    builder.build_all(project.interface.task.iter());
    assert_eq!(builder.catalog(), &project.catalog);
}

#[test]
fn duplicate_tasks_across_fragments_are_rejected() {
    let store = MemoryBlobStore::new()
        .with_blob("pipeline/a", r#"{"Start": {}}"#)
        .with_blob("pipeline/b", r#"{"Start": {"action": "Click"}}"#);

    let err = load_project(&store).unwrap_err();
    assert!(matches!(err, PipequeueError::DuplicateTask { ref name, .. } if name == "Start"));
}

#[test]
fn malformed_interface_is_a_parse_error() {
    let store = MemoryBlobStore::new().with_blob("interface", "{not json");
    let err = load_project(&store).unwrap_err();
    assert!(matches!(err, PipequeueError::ConfigParse { ref name, .. } if name == "interface"));
}

#[test]
fn merge_precedence_holds_for_every_override_key() {
    let mut base = PipelineDictionary::new();
    base.insert(
        "A".into(),
        TaskDefinition {
            action: Some("Click".into()),
            ..Default::default()
        },
    );
    let mut overlay = PipelineDictionary::new();
    overlay.insert(
        "A".into(),
        TaskDefinition {
            action: Some("Swipe".into()),
            ..Default::default()
        },
    );

    let merged = merge_pipelines(&base, &overlay);
    assert_eq!(merged["A"].action.as_deref(), Some("Swipe"));
    assert_eq!(merge_pipelines(&merged, &overlay), merged);
}

#[test]
fn missing_entry_task_still_enqueues() {
    let builder = TaskRequestBuilder::default();
    let item = pipequeue::config::TaskInterfaceItem::new("Ghost", "Nowhere");
    let entry = builder.build(&item);
    assert_eq!(entry.params, EMPTY_PARAMS);
}
