use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::stages::WorkflowStage;
use super::{
    ArtifactExistenceChecker, Environment, FilesystemChecker, InputTemplate, InvocationTemplate,
    Mode, ScriptPolicy, WorkflowError, WorkflowInstance, WorkflowOptions,
};

/// Settings shared by every stage of one `prepare` run.
#[derive(Debug)]
pub struct BatchSettings {
    /// Project name.
    pub project: String,
    /// Run identifier.
    pub run_id: String,
    /// Root for every emitted artifact.
    pub output_dir: PathBuf,
    /// Directory holding `{stage}.wdl` definitions.
    pub workflows_dir: PathBuf,
    /// Target environment.
    pub environment: Environment,
    /// Engine mode.
    pub mode: Mode,
    /// Engine command line.
    pub invocation: InvocationTemplate,
    /// Options template.
    pub options: WorkflowOptions,
    /// Scheduler directives and setup lines.
    pub runtime_parameters: Vec<String>,
    /// Resume probe.
    pub checker: Box<dyn ArtifactExistenceChecker>,
}

impl BatchSettings {
    /// Settings with defaults for everything but project and run.
    pub fn new(project: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            run_id: run_id.into(),
            output_dir: PathBuf::from("."),
            workflows_dir: PathBuf::from("workflows"),
            environment: Environment::Local,
            mode: Mode::Run,
            invocation: InvocationTemplate::default(),
            options: WorkflowOptions::default(),
            runtime_parameters: Vec::new(),
            checker: Box::new(FilesystemChecker),
        }
    }

    /// Set the output directory.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the workflow definition directory.
    pub fn with_workflows_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.workflows_dir = dir.into();
        self
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the engine mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the engine command line.
    pub fn with_invocation(mut self, invocation: InvocationTemplate) -> Self {
        self.invocation = invocation;
        self
    }

    /// Set the options template.
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the runtime parameter lines.
    pub fn with_runtime_parameters(mut self, parameters: Vec<String>) -> Self {
        self.runtime_parameters = parameters;
        self
    }

    /// Replace the resume probe.
    pub fn with_checker<C: ArtifactExistenceChecker + 'static>(mut self, checker: C) -> Self {
        self.checker = Box::new(checker);
        self
    }

    /// Definition path of `workflow`.
    pub fn workflow_path(&self, workflow: &str) -> PathBuf {
        self.workflows_dir.join(format!("{workflow}.wdl"))
    }
}

/// What a stage sees while configuring its units.
#[derive(Debug)]
pub struct StageContext<'a> {
    settings: &'a BatchSettings,
    template: &'a InputTemplate,
    workflow_name: &'a str,
}

impl<'a> StageContext<'a> {
    /// Shared settings.
    pub fn settings(&self) -> &'a BatchSettings {
        self.settings
    }

    /// The stage's input template.
    pub fn template(&self) -> &'a InputTemplate {
        self.template
    }

    /// Target environment.
    pub fn environment(&self) -> Environment {
        self.settings.environment
    }

    /// Engine mode.
    pub fn mode(&self) -> Mode {
        self.settings.mode
    }

    /// Workflow name of the stage being built.
    pub fn workflow_name(&self) -> &'a str {
        self.workflow_name
    }

    /// `{output_dir}/{workflow}_inputs`.
    pub fn inputs_dir(&self) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}_inputs", self.workflow_name))
    }

    /// Path of `relative` under the engine's final outputs directory.
    pub fn output_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.settings.options.outputs_dir().join(relative)
    }

    /// Resume probe. Always false where outputs are not locally visible.
    pub fn artifact_exists(&self, path: &Path) -> bool {
        if !self.settings.environment.probes_outputs() {
            return false;
        }
        let found = self.settings.checker.exists(path);
        debug!(path = %path.display(), found, "resume probe");
        found
    }
}

/// Files emitted for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Workflow name.
    pub workflow: String,
    /// Unit identifiers in build order.
    pub units: Vec<String>,
    /// Inputs JSON per unit.
    pub input_files: Vec<PathBuf>,
    /// Options JSON per unit.
    pub options_files: Vec<PathBuf>,
    /// Per-unit run scripts (per-unit environments only).
    pub run_scripts: Vec<PathBuf>,
    /// Shared script (aggregated environments only).
    pub batch_script: Option<PathBuf>,
}

/// Shared per-stage script. Truncated on creation, then appended to.
#[derive(Debug)]
struct BatchScript {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl BatchScript {
    fn create(path: PathBuf, header: &[String]) -> Result<Self, WorkflowError> {
        let file = File::create(&path).map_err(|source| WorkflowError::Io {
            path: path.clone(),
            source,
        })?;
        let mut script = Self {
            path,
            writer: BufWriter::new(file),
        };
        for line in header {
            script.append(line)?;
        }
        Ok(script)
    }

    fn append(&mut self, line: &str) -> Result<(), WorkflowError> {
        writeln!(self.writer, "{line}").map_err(|source| WorkflowError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn finish(mut self) -> Result<PathBuf, WorkflowError> {
        self.writer.flush().map_err(|source| WorkflowError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(self.path)
    }
}

/// Turns one stage's work units into workflow instances on disk.
#[derive(Debug)]
pub struct BatchBuilder<'a> {
    settings: &'a BatchSettings,
}

impl<'a> BatchBuilder<'a> {
    /// Builder over shared settings.
    pub fn new(settings: &'a BatchSettings) -> Self {
        Self { settings }
    }

    /// Emit every unit of `stage`.
    ///
    /// Re-running with the same units and templates overwrites the same files
    /// with identical content; the aggregated script is truncated first.
    pub fn build<S: WorkflowStage + ?Sized>(
        &self,
        stage: &S,
        template: &InputTemplate,
    ) -> Result<BatchSummary, WorkflowError> {
        let settings = self.settings;
        let environment = settings.environment;
        let workflow_name = stage.name();
        let workflow_path = settings.workflow_path(workflow_name);

        stage.contract().validate(template, environment)?;

        let ctx = StageContext {
            settings,
            template,
            workflow_name,
        };
        for dir in [
            settings.output_dir.clone(),
            ctx.inputs_dir(),
            settings.output_dir.join(format!("{workflow_name}_options")),
        ] {
            fs::create_dir_all(&dir).map_err(|source| WorkflowError::Io { path: dir, source })?;
        }

        let runtime_parameters = stage.runtime_parameters(&settings.runtime_parameters, &ctx);
        let mut batch_script = match environment.script_policy() {
            ScriptPolicy::PerUnit => None,
            ScriptPolicy::Aggregated { extension } => {
                let path = settings.output_dir.join(format!(
                    "{}_{}_{}.{}",
                    settings.project, settings.run_id, workflow_name, extension
                ));
                Some(BatchScript::create(path, &runtime_parameters)?)
            }
        };

        stage.prepare(&ctx)?;

        let units = stage.work_units(&ctx);
        info!(
            workflow = workflow_name,
            units = units.len(),
            environment = %environment,
            "building workflow batch"
        );

        let mut summary = BatchSummary {
            workflow: workflow_name.to_string(),
            ..BatchSummary::default()
        };
        for unit in &units {
            let unit_id = stage.instance_id(unit, &ctx);
            let mut instance = WorkflowInstance::new(
                unit_id.clone(),
                &workflow_path,
                &settings.invocation,
                &settings.output_dir,
                *stage.contract(),
                environment,
                template,
                &settings.options,
                &runtime_parameters,
            );
            stage.configure(&mut instance, unit, &ctx)?;
            instance.scope_logs(&stage.log_subdir(unit));

            summary.input_files.push(instance.save_inputs()?.to_path_buf());
            summary.options_files.push(instance.save_options()?.to_path_buf());
            match batch_script.as_mut() {
                Some(script) => script.append(instance.invocation())?,
                None => summary
                    .run_scripts
                    .push(instance.save_run_script()?.to_path_buf()),
            }
            debug!(workflow = workflow_name, unit = %unit_id, "unit written");
            summary.units.push(unit_id);
        }

        summary.batch_script = batch_script.map(BatchScript::finish).transpose()?;
        info!(
            workflow = workflow_name,
            units = summary.units.len(),
            "workflow batch written"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::stages::PremapQcStage;
    use serde_json::json;

    fn template() -> InputTemplate {
        InputTemplate::from_value("premap_qc.json", json!({"PremapQC.runFastp": true})).unwrap()
    }

    #[test]
    fn per_unit_environment_writes_run_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BatchSettings::new("proj", "run1").with_output_dir(dir.path());
        let stage = PremapQcStage::new(["S1", "S2"]);
        let summary = BatchBuilder::new(&settings).build(&stage, &template()).unwrap();

        assert_eq!(summary.units, vec!["S1", "S2"]);
        assert_eq!(summary.run_scripts.len(), 2);
        assert!(summary.batch_script.is_none());
        assert!(dir.path().join("S1.premap_qc_run.sh").is_file());
    }

    #[test]
    fn aggregated_environment_writes_one_script() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BatchSettings::new("proj", "run1")
            .with_output_dir(dir.path())
            .with_environment(Environment::Swarm)
            .with_runtime_parameters(vec!["#SWARM --threads-per-process 8".into()]);
        let stage = PremapQcStage::new(["S1", "S2"]);
        let builder = BatchBuilder::new(&settings);
        builder.build(&stage, &template()).unwrap();
        let summary = builder.build(&stage, &template()).unwrap();

        let script_path = summary.batch_script.unwrap();
        assert_eq!(script_path, dir.path().join("proj_run1_premap_qc.swarm"));
        let script = fs::read_to_string(script_path).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines.len(), 3, "re-run must truncate: {script}");
        assert_eq!(lines[0], "#SWARM --threads-per-process 8");
        assert!(summary.run_scripts.is_empty());
    }
}
