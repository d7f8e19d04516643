use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    Environment, Field, InputTemplate, SubstitutionContract, WorkflowError, WorkflowOptions,
};

/// Replaced by the workflow definition path.
pub const WORKFLOW_PLACEHOLDER: &str = "<<WORKFLOW>>";
/// Replaced by the unit's inputs JSON path.
pub const INPUT_JSON_PLACEHOLDER: &str = "<<INPUT_JSON>>";
/// Replaced by the unit's options JSON path.
pub const OPTIONS_JSON_PLACEHOLDER: &str = "<<OPTIONS_JSON>>";

/// Engine invocation used when none is configured.
pub const DEFAULT_CROMWELL_INVOCATION: &str =
    "java -jar cromwell.jar run <<WORKFLOW>> --inputs <<INPUT_JSON>> --options <<OPTIONS_JSON>>";

/// Engine command line with the three path placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationTemplate(String);

impl InvocationTemplate {
    /// Validate that all three placeholders are present.
    pub fn new(template: impl Into<String>) -> Result<Self, WorkflowError> {
        let template = template.into();
        for placeholder in [
            WORKFLOW_PLACEHOLDER,
            INPUT_JSON_PLACEHOLDER,
            OPTIONS_JSON_PLACEHOLDER,
        ] {
            if !template.contains(placeholder) {
                return Err(WorkflowError::Config(format!(
                    "invocation template is missing {placeholder}: {template}"
                )));
            }
        }
        Ok(Self(template))
    }

    /// Substitute the three paths.
    pub fn resolve(&self, workflow: &Path, inputs: &Path, options: &Path) -> String {
        self.0
            .replace(WORKFLOW_PLACEHOLDER, &workflow.display().to_string())
            .replace(INPUT_JSON_PLACEHOLDER, &inputs.display().to_string())
            .replace(OPTIONS_JSON_PLACEHOLDER, &options.display().to_string())
    }

    /// Raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationTemplate {
    fn default() -> Self {
        Self(DEFAULT_CROMWELL_INVOCATION.to_string())
    }
}

/// Workflow name from a definition path: its file stem.
pub fn workflow_name(workflow_path: &Path) -> String {
    workflow_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Deterministic artifact locations of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    /// `{dir}/{workflow}_inputs/{unit}.{workflow}_inputs.json`
    pub inputs: PathBuf,
    /// `{dir}/{workflow}_options/{unit}.{workflow}_options.json`
    pub options: PathBuf,
    /// `{dir}/{unit}.{workflow}_run.sh`
    pub run_script: PathBuf,
}

impl InstancePaths {
    /// Paths for `unit_id` of `workflow` under `output_dir`.
    pub fn new(output_dir: &Path, workflow: &str, unit_id: &str) -> Self {
        Self {
            inputs: output_dir
                .join(format!("{workflow}_inputs"))
                .join(format!("{unit_id}.{workflow}_inputs.json")),
            options: output_dir
                .join(format!("{workflow}_options"))
                .join(format!("{unit_id}.{workflow}_options.json")),
            run_script: output_dir.join(format!("{unit_id}.{workflow}_run.sh")),
        }
    }
}

/// One unit's fully resolved job: inputs, options and engine invocation.
#[derive(Debug, Clone)]
pub struct WorkflowInstance {
    unit_id: String,
    workflow_name: String,
    contract: SubstitutionContract,
    environment: Environment,
    inputs: Map<String, Value>,
    options: WorkflowOptions,
    runtime_parameters: Vec<String>,
    paths: InstancePaths,
    invocation: String,
}

impl WorkflowInstance {
    /// Build a unit from shared templates. Inputs and options are copies.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_id: impl Into<String>,
        workflow_path: &Path,
        invocation: &InvocationTemplate,
        output_dir: &Path,
        contract: SubstitutionContract,
        environment: Environment,
        inputs: &InputTemplate,
        options: &WorkflowOptions,
        runtime_parameters: &[String],
    ) -> Self {
        let unit_id = unit_id.into();
        let workflow_name = workflow_name(workflow_path);
        let paths = InstancePaths::new(output_dir, &workflow_name, &unit_id);
        let invocation = invocation.resolve(workflow_path, &paths.inputs, &paths.options);
        Self {
            unit_id,
            workflow_name,
            contract,
            environment,
            inputs: inputs.values().clone(),
            options: options.clone(),
            runtime_parameters: runtime_parameters.to_vec(),
            paths,
            invocation,
        }
    }

    /// Unit identifier used in file names.
    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Workflow name (definition file stem).
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Artifact locations.
    pub fn paths(&self) -> &InstancePaths {
        &self.paths
    }

    /// Resolved engine command line.
    pub fn invocation(&self) -> &str {
        &self.invocation
    }

    /// Current inputs.
    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    /// Current options.
    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Set (`Some`) or remove (`None`) a raw input key.
    pub fn update_input(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.inputs.insert(key.to_string(), value);
            }
            None => {
                self.inputs.remove(key);
            }
        }
    }

    /// Set (`Some`) or remove (`None`) an options key.
    pub fn update_option(&mut self, key: &str, value: Option<Value>) {
        self.options.update(key, value);
    }

    /// Set a declared field under its environment-specific key.
    pub fn set(&mut self, field: &Field, value: impl Into<Value>) {
        let key = self.contract.key(field, self.environment);
        self.update_input(&key, Some(value.into()));
    }

    /// Remove a declared field.
    pub fn clear(&mut self, field: &Field) {
        let key = self.contract.key(field, self.environment);
        self.update_input(&key, None);
    }

    /// Value of a declared field.
    pub fn get(&self, field: &Field) -> Option<&Value> {
        self.inputs.get(&self.contract.key(field, self.environment))
    }

    /// Mutable value of a declared field.
    pub fn get_mut(&mut self, field: &Field) -> Option<&mut Value> {
        let key = self.contract.key(field, self.environment);
        self.inputs.get_mut(&key)
    }

    /// Scope log directories under `subdir` so units never share log paths.
    pub fn scope_logs(&mut self, subdir: &str) {
        self.options = self.options.scoped(subdir);
    }

    /// Inputs JSON as written to disk.
    pub fn render_inputs(&self) -> Result<String, serde_json::Error> {
        to_pretty_json(&self.inputs)
    }

    /// Options JSON as written to disk.
    pub fn render_options(&self) -> Result<String, serde_json::Error> {
        to_pretty_json(&self.options.to_value()?)
    }

    /// Per-unit run script: shebang, parameters, blank line, invocation.
    pub fn render_run_script(&self) -> String {
        let mut script = String::from("#!/bin/bash\n");
        for line in &self.runtime_parameters {
            script.push_str(line);
            script.push('\n');
        }
        script.push('\n');
        script.push_str(&self.invocation);
        script
    }

    /// Write the inputs JSON, replacing any previous file.
    pub fn save_inputs(&self) -> Result<&Path, WorkflowError> {
        let rendered = self.render_inputs().map_err(|source| WorkflowError::Json {
            path: self.paths.inputs.clone(),
            source,
        })?;
        write_file(&self.paths.inputs, &rendered)?;
        Ok(&self.paths.inputs)
    }

    /// Write the options JSON, replacing any previous file.
    pub fn save_options(&self) -> Result<&Path, WorkflowError> {
        let rendered = self.render_options().map_err(|source| WorkflowError::Json {
            path: self.paths.options.clone(),
            source,
        })?;
        write_file(&self.paths.options, &rendered)?;
        Ok(&self.paths.options)
    }

    /// Write the per-unit run script, replacing any previous file.
    pub fn save_run_script(&self) -> Result<&Path, WorkflowError> {
        write_file(&self.paths.run_script, &self.render_run_script())?;
        Ok(&self.paths.run_script)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), WorkflowError> {
    debug!(path = %path.display(), "writing");
    fs::write(path, contents).map_err(|source| WorkflowError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON with a four-space indent; `Map` keeps keys sorted.
pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
