use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WorkflowError;

/// Default `final_workflow_outputs_dir`.
pub const DEFAULT_OUTPUTS_DIR: &str = "results";

/// Default log root for workflow and call logs.
pub const DEFAULT_LOG_DIR: &str = "logging";

fn default_outputs_dir() -> String {
    DEFAULT_OUTPUTS_DIR.to_string()
}

fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

/// Workflow engine options shared by every unit of a stage.
///
/// The three directory keys are typed because unit construction reads and
/// rewrites them; every other key passes through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Root under which the engine copies final outputs.
    #[serde(default = "default_outputs_dir")]
    pub final_workflow_outputs_dir: String,
    /// Workflow log directory.
    #[serde(default = "default_log_dir")]
    pub final_workflow_log_dir: String,
    /// Call log directory.
    #[serde(default = "default_log_dir")]
    pub final_call_logs_dir: String,
    /// Remaining engine options.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        let mut extra = Map::new();
        extra.insert("delete_intermediate_output_files".into(), Value::Bool(true));
        extra.insert("use_relative_output_paths".into(), Value::Bool(true));
        Self {
            final_workflow_outputs_dir: default_outputs_dir(),
            final_workflow_log_dir: default_log_dir(),
            final_call_logs_dir: default_log_dir(),
            extra,
        }
    }
}

impl WorkflowOptions {
    /// Read options from a JSON file, or fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WorkflowError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| WorkflowError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if !value.is_object() {
            return Err(WorkflowError::TemplateNotObject {
                path: path.to_path_buf(),
            });
        }
        serde_json::from_value(value).map_err(|source| WorkflowError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Output root as a path.
    pub fn outputs_dir(&self) -> &Path {
        Path::new(&self.final_workflow_outputs_dir)
    }

    /// Copy whose log directories are scoped under `subdir`.
    pub fn scoped(&self, subdir: &str) -> Self {
        let mut scoped = self.clone();
        scoped.final_workflow_log_dir = join(&self.final_workflow_log_dir, subdir);
        scoped.final_call_logs_dir = join(&self.final_call_logs_dir, subdir);
        scoped
    }

    /// Set or remove (`None`) a pass-through key.
    ///
    /// The typed directory keys cannot be removed; `None` resets them to their
    /// defaults.
    pub fn update(&mut self, key: &str, value: Option<Value>) {
        let text = || match &value {
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        };
        match key {
            "final_workflow_outputs_dir" => {
                self.final_workflow_outputs_dir = text().unwrap_or_else(default_outputs_dir)
            }
            "final_workflow_log_dir" => {
                self.final_workflow_log_dir = text().unwrap_or_else(default_log_dir)
            }
            "final_call_logs_dir" => self.final_call_logs_dir = text().unwrap_or_else(default_log_dir),
            _ => match value {
                Some(value) => {
                    self.extra.insert(key.to_string(), value);
                }
                None => {
                    self.extra.remove(key);
                }
            },
        }
    }

    /// Options as a single sorted JSON object.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn join(root: &str, subdir: &str) -> String {
    let joined: PathBuf = Path::new(root).join(subdir);
    joined.to_string_lossy().into_owned()
}
