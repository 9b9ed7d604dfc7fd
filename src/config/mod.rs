//! Pipeline configuration.
//!
//! This module handles:
//! - Data model for tasks, interface items and settings ([`schema`])
//! - Override merging of pipeline dictionaries ([`merger`])
//! - Counter expressions inside parameter strings ([`expression`])
//! - Loading everything through the persistence capability ([`loader`])

pub mod expression;
pub mod loader;
pub mod merger;
pub mod schema;

pub use expression::{CounterTable, ExpressionEvaluator};
pub use loader::{
    load_catalog, load_interface, load_project, load_settings, save_interface, save_pipeline,
    save_settings, ProjectData,
};
pub use merger::{merge_all, merge_pipelines, merge_task};
pub use schema::{
    AdbDeviceConfig, ConnectionSettings, DesktopWindowConfig, EngineSettings,
    InterfaceDefinition, OptionCase, ParamValue, PipelineDictionary, SelectableOption,
    SelectedOption, TargetConfig, TargetKind, TaskDefinition, TaskInterfaceItem,
};
