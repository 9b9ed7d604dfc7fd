//! Override merge for pipeline dictionaries.
//!
//! Interface items and option cases ship partial pipeline dictionaries that
//! are layered over the catalog. This module implements the merge semantics.
//!
//! # Merge Rules
//!
//! - Tasks present in only one side are carried through unchanged
//! - Tasks present in both are combined field by field
//! - A field set in the override replaces the base field
//! - Lists and nested maps are replaced entirely (not merged)
//! - Unset fields (and `null` extra params) leave the base untouched

use super::schema::{PipelineDictionary, TaskDefinition};

/// Merge one task definition over another.
///
/// Every field the override sets wins; the rest comes from `base`.
pub fn merge_task(base: &TaskDefinition, overlay: &TaskDefinition) -> TaskDefinition {
    let mut params = base.params.clone();
    for (key, value) in &overlay.params {
        if !value.is_null() {
            params.insert(key.clone(), value.clone());
        }
    }

    TaskDefinition {
        recognition: overlay.recognition.clone().or_else(|| base.recognition.clone()),
        action: overlay.action.clone().or_else(|| base.action.clone()),
        roi: overlay.roi.clone().or_else(|| base.roi.clone()),
        next: overlay.next.clone().or_else(|| base.next.clone()),
        timeout_next: overlay
            .timeout_next
            .clone()
            .or_else(|| base.timeout_next.clone()),
        runout_next: overlay
            .runout_next
            .clone()
            .or_else(|| base.runout_next.clone()),
        interrupt: overlay.interrupt.clone().or_else(|| base.interrupt.clone()),
        on_error: overlay.on_error.clone().or_else(|| base.on_error.clone()),
        params,
    }
}

/// Merge an override dictionary over a base dictionary.
///
/// # Arguments
///
/// * `base` - The base dictionary
/// * `overrides` - The override fragment (takes precedence)
///
/// # Returns
///
/// A new dictionary; neither input is modified.
pub fn merge_pipelines(
    base: &PipelineDictionary,
    overrides: &PipelineDictionary,
) -> PipelineDictionary {
    let mut result = base.clone();

    for (name, overlay) in overrides {
        let merged = match base.get(name) {
            Some(existing) => merge_task(existing, overlay),
            None => overlay.clone(),
        };
        result.insert(name.clone(), merged);
    }

    result
}

/// Merge several fragments in order (later overrides earlier).
///
/// # Arguments
///
/// * `base` - The starting dictionary
/// * `fragments` - Override fragments in declaration order
pub fn merge_all<'a, I>(base: &PipelineDictionary, fragments: I) -> PipelineDictionary
where
    I: IntoIterator<Item = &'a PipelineDictionary>,
{
    fragments
        .into_iter()
        .fold(base.clone(), |acc, fragment| merge_pipelines(&acc, fragment))
}
