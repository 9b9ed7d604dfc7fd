//! Data model for pipelines, interface items and engine settings.
//!
//! This module contains all the struct definitions that map to the JSON
//! blobs the engine reads through the persistence capability.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Mapping from task name to task definition.
///
/// A `BTreeMap` keeps serialized parameter blobs byte-stable across runs.
pub type PipelineDictionary = BTreeMap<String, TaskDefinition>;

/// A loosely-typed task parameter.
///
/// Pipeline files use the same key for a single value or a list, so every
/// shape gets an explicit variant and serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// A single string, e.g. a task name or a template path.
    Scalar(String),
    /// A flat integer list, e.g. a region `[x, y, w, h]`.
    IntList(Vec<i64>),
    /// A list of strings, e.g. next-task links.
    StringList(Vec<String>),
    /// A list of integer lists, e.g. several colour bounds.
    NestedIntList(Vec<Vec<i64>>),
}

impl ParamValue {
    /// Build a string list from anything string-like.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringList(items.into_iter().map(Into::into).collect())
    }

    /// String items carried by this value.
    ///
    /// Integer variants carry no strings.
    pub fn as_strings(&self) -> Vec<&str> {
        match self {
            Self::Scalar(s) => vec![s.as_str()],
            Self::StringList(items) => items.iter().map(String::as_str).collect(),
            Self::IntList(_) | Self::NestedIntList(_) => Vec::new(),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(s) => serializer.serialize_str(s),
            Self::IntList(items) if items.len() == 1 => serializer.serialize_i64(items[0]),
            Self::IntList(items) => items.serialize(serializer),
            Self::StringList(items) if items.len() == 1 => serializer.serialize_str(&items[0]),
            Self::StringList(items) => items.serialize(serializer),
            Self::NestedIntList(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        ParamValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<serde_json::Value> for ParamValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(s) => Ok(Self::Scalar(s)),
            Value::Number(n) => n
                .as_i64()
                .map(|i| Self::IntList(vec![i]))
                .ok_or_else(|| format!("expected an integer, got {}", n)),
            Value::Array(items) if items.is_empty() => Ok(Self::StringList(Vec::new())),
            Value::Array(items) => {
                if items.iter().all(Value::is_string) {
                    Ok(Self::StringList(
                        items
                            .into_iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect(),
                    ))
                } else if items.iter().all(Value::is_i64) {
                    Ok(Self::IntList(items.iter().filter_map(Value::as_i64).collect()))
                } else if items.iter().all(Value::is_array) {
                    items
                        .iter()
                        .map(|inner| {
                            inner
                                .as_array()
                                .into_iter()
                                .flatten()
                                .map(|v| {
                                    v.as_i64()
                                        .ok_or_else(|| format!("expected an integer, got {}", v))
                                })
                                .collect::<Result<Vec<_>, _>>()
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(Self::NestedIntList)
                } else {
                    Err("mixed value types in list".to_string())
                }
            }
            other => Err(format!("unsupported parameter value: {}", other)),
        }
    }
}

/// A named pipeline step.
///
/// Known keys get typed fields; everything else lands in `params` so a
/// round trip never drops data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefinition {
    /// Recognition algorithm (e.g. `TemplateMatch`, `OCR`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition: Option<String>,

    /// Action performed on a hit (e.g. `Click`, `Swipe`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Region of interest: a rectangle or the name of another task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<ParamValue>,

    /// Tasks tried after this one succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<ParamValue>,

    /// Tasks tried when recognition times out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_next: Option<ParamValue>,

    /// Tasks tried when the run budget is exhausted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runout_next: Option<ParamValue>,

    /// Tasks tried when none of `next` hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<ParamValue>,

    /// Tasks tried when the step errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ParamValue>,

    /// Any other key, kept verbatim.
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl TaskDefinition {
    /// All task names this definition links to, in field order.
    pub fn links(&self) -> Vec<&str> {
        [
            &self.next,
            &self.timeout_next,
            &self.runout_next,
            &self.interrupt,
            &self.on_error,
        ]
        .into_iter()
        .flatten()
        .flat_map(ParamValue::as_strings)
        .collect()
    }

    /// Task whose hit region this task uses, when `roi` names one.
    pub fn roi_task(&self) -> Option<&str> {
        match &self.roi {
            Some(ParamValue::Scalar(name)) => Some(name),
            _ => None,
        }
    }
}

/// A user's choice for one selectable option.
///
/// Interface files write either a bare option name or `{name, index}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedOption {
    /// Option name (key into [`InterfaceDefinition::option`]).
    pub name: String,

    /// Selected case; `None` picks the option's default case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl SelectedOption {
    /// Select a specific case of an option.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }
}

impl<'de> Deserialize<'de> for SelectedOption {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Full {
                name: String,
                #[serde(default)]
                index: Option<usize>,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Name(name) => Self { name, index: None },
            Repr::Full { name, index } => Self { name, index },
        })
    }
}

/// One case of a selectable option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionCase {
    /// Case name shown to the user.
    pub name: String,

    /// Further options this case exposes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub option: Vec<String>,

    /// Override fragment contributed when this case is selected.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub pipeline_override: PipelineDictionary,
}

/// A named switch with an ordered list of cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectableOption {
    /// Cases in declaration order.
    pub cases: Vec<OptionCase>,

    /// Name of the case used when a selection carries no index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_case: Option<String>,
}

impl SelectableOption {
    /// Resolve the case a selection refers to.
    pub fn resolve_case(&self, selected: &SelectedOption) -> Option<&OptionCase> {
        match selected.index {
            Some(index) => self.cases.get(index),
            None => match &self.default_case {
                Some(name) => self.cases.iter().find(|c| &c.name == name),
                None => self.cases.first(),
            },
        }
    }
}

/// One selectable entry of the task list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInterfaceItem {
    /// Display name.
    pub name: String,

    /// Entry-point task in the pipeline catalog.
    pub entry: String,

    /// Selected by default.
    #[serde(skip_serializing_if = "is_false")]
    pub check: bool,

    /// Whether `repeat_count` applies.
    #[serde(skip_serializing_if = "is_false")]
    pub repeatable: bool,

    /// Configured repetitions for repeatable items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,

    /// Selected option cases, applied in list order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub option: Vec<SelectedOption>,

    /// Fixed override fragment for this item.
    #[serde(alias = "param", skip_serializing_if = "BTreeMap::is_empty")]
    pub pipeline_override: PipelineDictionary,
}

impl TaskInterfaceItem {
    /// Create an item that runs `entry` once.
    pub fn new(name: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry: entry.into(),
            ..Default::default()
        }
    }

    /// Number of times this item runs when queued.
    pub fn effective_repeat(&self) -> u32 {
        if self.repeatable {
            self.repeat_count.unwrap_or(1).max(1)
        } else {
            1
        }
    }
}

/// The interface blob: selectable tasks plus the option catalogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceDefinition {
    /// Project display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Selectable tasks in display order.
    pub task: Vec<TaskInterfaceItem>,

    /// Option catalogue keyed by option name.
    pub option: BTreeMap<String, SelectableOption>,
}

impl InterfaceDefinition {
    /// Items checked by default, in display order.
    pub fn checked_items(&self) -> Vec<&TaskInterfaceItem> {
        self.task.iter().filter(|t| t.check).collect()
    }

    /// Look up an item by display name.
    pub fn find_item(&self, name: &str) -> Option<&TaskInterfaceItem> {
        self.task.iter().find(|t| t.name == name)
    }

    /// Option names referenced by items or cases but not defined.
    pub fn undefined_options(&self) -> HashSet<&str> {
        let referenced = self
            .task
            .iter()
            .flat_map(|t| t.option.iter().map(|o| o.name.as_str()))
            .chain(
                self.option
                    .values()
                    .flat_map(|o| o.cases.iter())
                    .flat_map(|c| c.option.iter().map(String::as_str)),
            );
        referenced
            .filter(|name| !self.option.contains_key(*name))
            .collect()
    }
}

/// Kind of automation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// An Android device or emulator reached through adb.
    #[default]
    Adb,
    /// A desktop window.
    Desktop,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Adb => write!(f, "emulator"),
            TargetKind::Desktop => write!(f, "window"),
        }
    }
}

/// Screen capture method for adb targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdbScreencapMethod {
    EncodeToFile,
    #[default]
    RawWithGzip,
    RawByNetcat,
    Encode,
    MinicapDirect,
    MinicapStream,
    EmulatorExtras,
}

/// Input method for adb targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdbInputMethod {
    AdbShell,
    MinitouchAndAdbKey,
    #[default]
    Maatouch,
    EmulatorExtras,
}

/// Screen capture method for desktop windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Win32ScreencapMethod {
    Gdi,
    #[default]
    FramePool,
    DxgiDesktopDup,
}

/// Input method for desktop windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Win32InputMethod {
    #[default]
    Seize,
    SendMessage,
}

/// Whether the controller links to the target on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkOption {
    #[default]
    Start,
    None,
}

/// Whether controller creation fails loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatusOption {
    #[default]
    ThrowIfNotSucceeded,
    None,
}

/// Settings for an adb device target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbDeviceConfig {
    /// Path to the adb executable.
    pub adb_path: String,
    /// Device serial or `host:port`.
    pub serial: String,
    pub screencap: AdbScreencapMethod,
    pub input: AdbInputMethod,
    /// Extra controller configuration (JSON text).
    pub config: String,
}

impl Default for AdbDeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            serial: "127.0.0.1:5555".to_string(),
            screencap: AdbScreencapMethod::default(),
            input: AdbInputMethod::default(),
            config: "{}".to_string(),
        }
    }
}

/// Settings for a desktop window target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopWindowConfig {
    /// Native window handle.
    pub hwnd: u64,
    pub input: Win32InputMethod,
    pub screencap: Win32ScreencapMethod,
    pub link: LinkOption,
    pub check: CheckStatusOption,
}

/// A fully specified target handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    Adb(AdbDeviceConfig),
    Desktop(DesktopWindowConfig),
}

impl TargetConfig {
    /// Kind of target this configuration addresses.
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetConfig::Adb(_) => TargetKind::Adb,
            TargetConfig::Desktop(_) => TargetKind::Desktop,
        }
    }
}

/// Connection settings for the automation backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Which target kind is active.
    pub target: TargetKind,

    /// Whether the user has connected a target.
    #[serde(skip_serializing_if = "is_false")]
    pub connected: bool,

    pub adb: AdbDeviceConfig,
    pub desktop: DesktopWindowConfig,
}

impl ConnectionSettings {
    /// Target configuration for the active kind.
    pub fn target_config(&self) -> TargetConfig {
        match self.target {
            TargetKind::Adb => TargetConfig::Adb(self.adb.clone()),
            TargetKind::Desktop => TargetConfig::Desktop(self.desktop.clone()),
        }
    }
}

/// Root of the `config` blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub connection: ConnectionSettings,

    /// Resource bundle paths, loaded in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<PathBuf>,
}

fn is_false(v: &bool) -> bool {
    !v
}
