//! Configuration of one `prepare` run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};
use clap::ValueEnum;
use rand::Rng;

use crate::intervals::DEFAULT_NUCLEOTIDES_PER_BIN;
use crate::workflow::{
    BatchSettings, Environment, FilesystemChecker, InvocationTemplate, Mode, NoArtifacts,
    RuntimeModel, WorkflowError, WorkflowOptions, DEFAULT_CROMWELL_INVOCATION,
};

/// Length of the random suffix of generated run IDs.
pub const RUN_ID_SUFFIX_LEN: usize = 8;

/// Strelka2 GLnexus config, relative to the template root.
pub const DEFAULT_STRELKA_GLNEXUS_CONFIG: &str = "config/strelka2_glnexus.yml";

/// Pipeline stages `prepare` can emit, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum StageKind {
    /// Read QC.
    #[value(name = "premap_qc")]
    PremapQc,
    /// Alignment and mapping QC.
    #[value(name = "mapping")]
    Mapping,
    /// Per-sample variant calling.
    #[value(name = "variant_calling")]
    VariantCalling,
    /// Joint genotyping per caller.
    #[value(name = "joint_genotype")]
    JointGenotype,
    /// Caller harmonization.
    #[value(name = "harmonize")]
    Harmonize,
}

impl StageKind {
    /// Every stage in pipeline order.
    pub const ALL: [StageKind; 5] = [
        StageKind::PremapQc,
        StageKind::Mapping,
        StageKind::VariantCalling,
        StageKind::JointGenotype,
        StageKind::Harmonize,
    ];

    /// Workflow name.
    pub fn name(self) -> &'static str {
        match self {
            StageKind::PremapQc => "premap_qc",
            StageKind::Mapping => "mapping",
            StageKind::VariantCalling => "variant_calling",
            StageKind::JointGenotype => "joint_genotype",
            StageKind::Harmonize => "harmonize",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run ID for `date`: `{year}{month}{day}_{RUN_ID_SUFFIX_LEN uppercase letters}`.
pub fn run_id_for<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    let suffix: String = (0..RUN_ID_SUFFIX_LEN)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect();
    format!("{}{}{}_{}", date.year(), date.month(), date.day(), suffix)
}

/// Run ID for today.
pub fn generate_run_id() -> String {
    run_id_for(Local::now().date_naive(), &mut rand::thread_rng())
}

/// Everything one `prepare` invocation needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project name.
    pub project: String,
    /// Run identifier.
    pub run_id: String,
    /// Stages to emit.
    pub stages: Vec<StageKind>,
    /// Fastq file-of-files.
    pub fastq_list: PathBuf,
    /// Sample manifest.
    pub manifest: PathBuf,
    /// Explicit sample IDs.
    pub sample_ids: Vec<String>,
    /// File of sample IDs.
    pub sample_list: Option<PathBuf>,
    /// Per-stage input template overrides.
    pub input_templates: BTreeMap<StageKind, PathBuf>,
    /// Root of `input_templates/` and `templates/`.
    pub template_dir: PathBuf,
    /// Directory holding `{stage}.wdl`.
    pub workflows_dir: PathBuf,
    /// Harmonize bin labels file.
    pub bin_interval_names: Option<PathBuf>,
    /// Bedfile to bin for harmonize when no names file is given.
    pub interval_bed: Option<PathBuf>,
    /// Target bin size for `interval_bed`.
    pub nucleotides_per_bin: i64,
    /// GLnexus config used for strelka2; see [`PipelineConfig::strelka_glnexus_config`].
    pub strelka_glnexus_config: Option<String>,
    /// Options JSON; defaults when absent.
    pub options_json: Option<PathBuf>,
    /// Scheduler lines for every script.
    pub runtime_parameters: Vec<String>,
    /// Target environment.
    pub environment: Environment,
    /// Engine mode.
    pub mode: Mode,
    /// Engine invocation template.
    pub invocation: String,
    /// Joint genotype runtime model.
    pub runtime: RuntimeModel,
    /// Root for emitted artifacts.
    pub output_dir: PathBuf,
    /// Probe for already produced outputs.
    pub resume: bool,
}

impl PipelineConfig {
    /// Configuration with defaults for everything but the required inputs.
    pub fn new(
        project: impl Into<String>,
        fastq_list: impl Into<PathBuf>,
        manifest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project: project.into(),
            run_id: generate_run_id(),
            stages: StageKind::ALL.to_vec(),
            fastq_list: fastq_list.into(),
            manifest: manifest.into(),
            sample_ids: Vec::new(),
            sample_list: None,
            input_templates: BTreeMap::new(),
            template_dir: PathBuf::from("templates"),
            workflows_dir: PathBuf::from("workflows"),
            bin_interval_names: None,
            interval_bed: None,
            nucleotides_per_bin: DEFAULT_NUCLEOTIDES_PER_BIN,
            strelka_glnexus_config: None,
            options_json: None,
            runtime_parameters: Vec::new(),
            environment: Environment::Local,
            mode: Mode::Run,
            invocation: DEFAULT_CROMWELL_INVOCATION.to_string(),
            runtime: RuntimeModel::default(),
            output_dir: PathBuf::from("./"),
            resume: true,
        }
    }

    /// Use a fixed run ID.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Restrict the stages to emit.
    pub fn with_stages(mut self, stages: Vec<StageKind>) -> Self {
        self.stages = stages;
        self
    }

    /// Set explicit sample IDs.
    pub fn with_sample_ids(mut self, sample_ids: Vec<String>) -> Self {
        self.sample_ids = sample_ids;
        self
    }

    /// Set the sample list file.
    pub fn with_sample_list(mut self, path: Option<PathBuf>) -> Self {
        self.sample_list = path;
        self
    }

    /// Override the input template of one stage.
    pub fn with_input_template(mut self, stage: StageKind, path: impl Into<PathBuf>) -> Self {
        self.input_templates.insert(stage, path.into());
        self
    }

    /// Set the template root.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Set the workflow definition directory.
    pub fn with_workflows_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflows_dir = dir.into();
        self
    }

    /// Harmonize over the bin labels listed in `path`.
    pub fn with_bin_interval_names(mut self, path: Option<PathBuf>) -> Self {
        self.bin_interval_names = path;
        self
    }

    /// Harmonize over bins computed from `path`.
    pub fn with_interval_bed(mut self, path: Option<PathBuf>, nucleotides_per_bin: i64) -> Self {
        self.interval_bed = path;
        self.nucleotides_per_bin = nucleotides_per_bin;
        self
    }

    /// Set the strelka2 GLnexus config; `None` falls back to the template root.
    pub fn with_strelka_glnexus_config(mut self, config: Option<String>) -> Self {
        self.strelka_glnexus_config = config;
        self
    }

    /// Set the options JSON.
    pub fn with_options_json(mut self, path: Option<PathBuf>) -> Self {
        self.options_json = path;
        self
    }

    /// Set scheduler lines.
    pub fn with_runtime_parameters(mut self, parameters: Vec<String>) -> Self {
        self.runtime_parameters = parameters;
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

    /// Set the engine invocation template.
    pub fn with_invocation(mut self, invocation: impl Into<String>) -> Self {
        self.invocation = invocation.into();
        self
    }

    /// Set the joint genotype runtime model.
    pub fn with_runtime_model(mut self, runtime: RuntimeModel) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enable or disable resume probes.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Selected stages, deduplicated, in pipeline order.
    pub fn ordered_stages(&self) -> Vec<StageKind> {
        let mut stages = self.stages.clone();
        stages.sort();
        stages.dedup();
        stages
    }

    /// Input template override for `stage`.
    pub fn input_template(&self, stage: StageKind) -> Option<&Path> {
        self.input_templates.get(&stage).map(PathBuf::as_path)
    }

    /// GLnexus config for strelka2: the explicit one, else
    /// `{template_dir}/config/strelka2_glnexus.yml`.
    pub fn strelka_glnexus_config(&self) -> String {
        match &self.strelka_glnexus_config {
            Some(config) => config.clone(),
            None => self
                .template_dir
                .join(DEFAULT_STRELKA_GLNEXUS_CONFIG)
                .display()
                .to_string(),
        }
    }

    /// Resolve options, invocation and probe into batch settings.
    pub fn batch_settings(&self) -> Result<BatchSettings, WorkflowError> {
        let settings = BatchSettings::new(&self.project, &self.run_id)
            .with_output_dir(&self.output_dir)
            .with_workflows_dir(&self.workflows_dir)
            .with_environment(self.environment)
            .with_mode(self.mode)
            .with_invocation(InvocationTemplate::new(self.invocation.as_str())?)
            .with_options(WorkflowOptions::load(self.options_json.as_deref())?)
            .with_runtime_parameters(self.runtime_parameters.clone());
        Ok(if self.resume {
            settings.with_checker(FilesystemChecker)
        } else {
            settings.with_checker(NoArtifacts)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    #[test]
    fn run_id_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let run_id = run_id_for(date, &mut rng);
        assert!(Regex::new(r"^202437_[A-Z]{8}$").unwrap().is_match(&run_id), "{run_id}");
        assert!(Regex::new(r"^\d+_[A-Z]{8}$").unwrap().is_match(&generate_run_id()));
    }

    #[test]
    fn stages_are_ordered_and_unique() {
        let config = PipelineConfig::new("p", "f.txt", "m.tsv").with_stages(vec![
            StageKind::Harmonize,
            StageKind::PremapQc,
            StageKind::Harmonize,
        ]);
        assert_eq!(
            config.ordered_stages(),
            vec![StageKind::PremapQc, StageKind::Harmonize]
        );
    }

    #[test]
    fn strelka_glnexus_config_defaults_under_template_root() {
        let config = PipelineConfig::new("p", "f.txt", "m.tsv").with_template_dir("/opt/gencompass");
        assert_eq!(
            config.strelka_glnexus_config(),
            "/opt/gencompass/config/strelka2_glnexus.yml"
        );

        let config = config.with_strelka_glnexus_config(Some("/site/strelka.yml".into()));
        assert_eq!(config.strelka_glnexus_config(), "/site/strelka.yml");
    }

    #[test]
    fn invalid_invocation_is_rejected() {
        let config = PipelineConfig::new("p", "f.txt", "m.tsv").with_invocation("cromwell run");
        assert!(matches!(config.batch_settings(), Err(WorkflowError::Config(_))));
    }
}
