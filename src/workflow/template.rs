use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::{Environment, WorkflowError};

/// A stage's input template: a JSON object whose keys pass through to every
/// unit unless the stage substitutes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTemplate {
    source: PathBuf,
    values: Map<String, Value>,
}

impl InputTemplate {
    /// Read a template file. The document must be a JSON object.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|source| WorkflowError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(path, value)
    }

    /// Wrap an already parsed document.
    pub fn from_value<P: AsRef<Path>>(source: P, value: Value) -> Result<Self, WorkflowError> {
        match value {
            Value::Object(values) => Ok(Self {
                source: source.as_ref().to_path_buf(),
                values,
            }),
            _ => Err(WorkflowError::TemplateNotObject {
                path: source.as_ref().to_path_buf(),
            }),
        }
    }

    /// Template for `stage`, with environment runtime inputs merged over it.
    ///
    /// `explicit` wins over `{template_dir}/input_templates/{stage}.inputs_template.json`.
    /// Runtime inputs live at `{template_dir}/templates/{hpc|aws|gcp}/{stage}.runtime_inputs.json`
    /// and are optional.
    pub fn for_stage(
        stage: &str,
        explicit: Option<&Path>,
        template_dir: &Path,
        environment: Environment,
    ) -> Result<Self, WorkflowError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => template_dir
                .join("input_templates")
                .join(format!("{stage}.inputs_template.json")),
        };
        let mut template = Self::from_path(&path)?;

        let runtime = template_dir
            .join("templates")
            .join(environment.runtime_folder())
            .join(format!("{stage}.runtime_inputs.json"));
        if runtime.is_file() {
            debug!(path = %runtime.display(), "merging runtime inputs");
            template.merge(Self::from_path(&runtime)?);
        }
        Ok(template)
    }

    /// Overlay `other`'s keys onto this template.
    pub fn merge(&mut self, other: InputTemplate) {
        self.values.extend(other.values);
    }

    /// Where the template was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Raw key/value map.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// True when `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String value under `key`, or a configuration error naming the key.
    pub fn require_str(&self, key: &str) -> Result<&str, WorkflowError> {
        match self.values.get(key) {
            Some(Value::String(text)) => Ok(text),
            Some(_) => Err(WorkflowError::Config(format!(
                "template key '{key}' in {} must be a string",
                self.source.display()
            ))),
            None => Err(self.missing(key)),
        }
    }

    pub(crate) fn missing(&self, key: &str) -> WorkflowError {
        WorkflowError::MissingTemplateKey {
            key: key.to_string(),
            template: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_objects() {
        let err = InputTemplate::from_value("t.json", json!([1, 2])).unwrap_err();
        assert!(matches!(err, WorkflowError::TemplateNotObject { .. }));
    }

    #[test]
    fn runtime_inputs_override_template() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("input_templates");
        let runtime = dir.path().join("templates").join("hpc");
        fs::create_dir_all(&inputs).unwrap();
        fs::create_dir_all(&runtime).unwrap();
        fs::write(
            inputs.join("mapping.inputs_template.json"),
            r#"{"Mapping.reference": "hg38.fa", "Mapping.threads": 4}"#,
        )
        .unwrap();
        fs::write(
            runtime.join("mapping.runtime_inputs.json"),
            r#"{"Mapping.threads": 16}"#,
        )
        .unwrap();

        let template =
            InputTemplate::for_stage("mapping", None, dir.path(), Environment::Swarm).unwrap();
        assert_eq!(template.get("Mapping.threads"), Some(&json!(16)));
        assert_eq!(template.require_str("Mapping.reference").unwrap(), "hg38.fa");

        let gcp = InputTemplate::for_stage("mapping", None, dir.path(), Environment::Gcp).unwrap();
        assert_eq!(gcp.get("Mapping.threads"), Some(&json!(4)));
    }

    #[test]
    fn missing_key_names_the_template() {
        let template = InputTemplate::from_value("h.json", json!({})).unwrap();
        let err = template.require_str("Harmonize.project").unwrap_err();
        assert!(err.to_string().contains("Harmonize.project"));
    }
}
