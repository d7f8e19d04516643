use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gencompass::config::{generate_run_id, PipelineConfig, StageKind};
use gencompass::intervals::{self, IntervalBinner, DEFAULT_NUCLEOTIDES_PER_BIN};
use gencompass::workflow::{
    Environment, Mode, RuntimeModel, DEFAULT_CROMWELL_INVOCATION, DEFAULT_RUNTIME_BASE_MINUTES,
    DEFAULT_RUNTIME_MULTIPLIER,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "gencompass",
    version,
    about = "Prepare WGS workflow batches for an external workflow engine"
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write inputs, options and run scripts for the selected workflows.
    Prepare(PrepareArgs),
    /// Bin a bedfile and write one bed per bin plus a file-of-files.
    BinIntervals {
        /// Interval bedfile.
        bedfile: PathBuf,
        /// Directory for the per-bin beds.
        #[arg(short, long, default_value = "./")]
        output_directory: PathBuf,
        /// Target nucleotides per bin.
        #[arg(long, default_value_t = DEFAULT_NUCLEOTIDES_PER_BIN, allow_negative_numbers = true)]
        nucleotides_per_bin: i64,
    },
    /// Print the bin labels of a bedfile, one per line.
    IntervalNames {
        /// Interval bedfile.
        bedfile: PathBuf,
        /// Target nucleotides per bin.
        #[arg(long, default_value_t = DEFAULT_NUCLEOTIDES_PER_BIN, allow_negative_numbers = true)]
        nucleotides_per_bin: i64,
        /// Write labels here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Project name.
    #[arg(long)]
    project: String,
    /// Run ID; generated from today's date when absent.
    #[arg(long)]
    run_id: Option<String>,
    /// Workflows to prepare (default: all).
    #[arg(long, num_args = 1.., value_enum)]
    workflows: Vec<StageKind>,
    /// Fastq file-of-files.
    #[arg(long)]
    fastq_list: PathBuf,
    /// Sample manifest (.tsv, .txt, .csv, .xlsx, .xls).
    #[arg(long)]
    manifest: PathBuf,
    /// Sample IDs to include.
    #[arg(long, num_args = 0..)]
    sample_ids: Vec<String>,
    /// File of sample IDs to include.
    #[arg(long)]
    sample_list: Option<PathBuf>,
    /// Premap QC input template.
    #[arg(long)]
    premap_qc_inputs_template: Option<PathBuf>,
    /// Mapping input template.
    #[arg(long)]
    mapping_inputs_template: Option<PathBuf>,
    /// Variant calling input template.
    #[arg(long)]
    variant_calling_inputs_template: Option<PathBuf>,
    /// Joint genotype input template.
    #[arg(long)]
    joint_genotype_inputs_template: Option<PathBuf>,
    /// Harmonize input template.
    #[arg(long)]
    harmonize_inputs_template: Option<PathBuf>,
    /// Bin labels for harmonize, one per line.
    #[arg(long)]
    bin_interval_names: Option<PathBuf>,
    /// Bedfile to bin for harmonize when no labels file is given.
    #[arg(long, conflicts_with = "bin_interval_names")]
    interval_bed: Option<PathBuf>,
    /// Target nucleotides per bin for --interval-bed.
    #[arg(long, default_value_t = DEFAULT_NUCLEOTIDES_PER_BIN, allow_negative_numbers = true)]
    nucleotides_per_bin: i64,
    /// GLnexus config for strelka2 joint genotyping
    /// (default: <template-dir>/config/strelka2_glnexus.yml).
    #[arg(long)]
    joint_genotype_strelka_glnexus_config: Option<String>,
    /// Workflow options JSON.
    #[arg(long)]
    options_json: Option<PathBuf>,
    /// Scheduler directives and setup lines for every script.
    #[arg(long, num_args = 0..)]
    runtime_parameters: Vec<String>,
    /// Execution environment.
    #[arg(long, value_enum, default_value_t = Environment::Local)]
    environment: Environment,
    /// Workflow engine mode.
    #[arg(long, value_enum, default_value_t = Mode::Run)]
    mode: Mode,
    /// Engine invocation with <<WORKFLOW>>, <<INPUT_JSON>> and <<OPTIONS_JSON>>.
    #[arg(long, default_value = DEFAULT_CROMWELL_INVOCATION)]
    cromwell_invocation: String,
    /// Template root with input_templates/ and templates/.
    #[arg(long, env = "GENCOMPASS_TEMPLATE_DIR", default_value = "./templates")]
    template_dir: PathBuf,
    /// Directory holding the workflow definitions.
    #[arg(long, default_value = "./workflows")]
    workflows_dir: PathBuf,
    /// Joint genotype minutes per sample.
    #[arg(long, default_value_t = DEFAULT_RUNTIME_MULTIPLIER)]
    jg_runtime_multiplier: u64,
    /// Joint genotype base minutes.
    #[arg(long, default_value_t = DEFAULT_RUNTIME_BASE_MINUTES)]
    jg_runtime_base: u64,
    /// Output directory.
    #[arg(short, long, default_value = "./")]
    output_directory: PathBuf,
    /// Do not skip sub-steps whose outputs already exist.
    #[arg(long)]
    no_resume: bool,
}

impl PrepareArgs {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.project, self.fastq_list, self.manifest)
            .with_run_id(self.run_id.unwrap_or_else(generate_run_id))
            .with_sample_ids(self.sample_ids)
            .with_sample_list(self.sample_list)
            .with_template_dir(self.template_dir)
            .with_workflows_dir(self.workflows_dir)
            .with_bin_interval_names(self.bin_interval_names)
            .with_interval_bed(self.interval_bed, self.nucleotides_per_bin)
            .with_strelka_glnexus_config(self.joint_genotype_strelka_glnexus_config)
            .with_options_json(self.options_json)
            .with_runtime_parameters(self.runtime_parameters)
            .with_environment(self.environment)
            .with_mode(self.mode)
            .with_invocation(self.cromwell_invocation)
            .with_runtime_model(RuntimeModel {
                multiplier: self.jg_runtime_multiplier,
                base_minutes: self.jg_runtime_base,
            })
            .with_output_dir(self.output_directory)
            .with_resume(!self.no_resume);

        if !self.workflows.is_empty() {
            config = config.with_stages(self.workflows);
        }
        for (stage, template) in [
            (StageKind::PremapQc, self.premap_qc_inputs_template),
            (StageKind::Mapping, self.mapping_inputs_template),
            (StageKind::VariantCalling, self.variant_calling_inputs_template),
            (StageKind::JointGenotype, self.joint_genotype_inputs_template),
            (StageKind::Harmonize, self.harmonize_inputs_template),
        ] {
            if let Some(template) = template {
                config = config.with_input_template(stage, template);
            }
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Prepare(args) => run_prepare(args)?,
        Commands::BinIntervals {
            bedfile,
            output_directory,
            nucleotides_per_bin,
        } => run_bin_intervals(bedfile, output_directory, nucleotides_per_bin)?,
        Commands::IntervalNames {
            bedfile,
            nucleotides_per_bin,
            output,
        } => run_interval_names(bedfile, nucleotides_per_bin, output)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    let config = args.into_config();
    let summaries = gencompass::pipeline::prepare(&config).with_context(|| {
        format!(
            "failed to prepare workflows for project {} run {}",
            config.project, config.run_id
        )
    })?;

    for summary in &summaries {
        match &summary.batch_script {
            Some(script) => info!(
                workflow = %summary.workflow,
                units = summary.units.len(),
                script = %script.display(),
                "batch script ready"
            ),
            None => info!(
                workflow = %summary.workflow,
                units = summary.units.len(),
                "run scripts ready"
            ),
        }
    }
    println!("{}", config.run_id);
    Ok(())
}

fn run_bin_intervals(bedfile: PathBuf, output_dir: PathBuf, nucleotides_per_bin: i64) -> Result<()> {
    let binner = IntervalBinner::new(nucleotides_per_bin);
    let chromosomes = intervals::bin_bedfile(&bedfile, &binner)
        .with_context(|| format!("failed to bin {}", bedfile.display()))?;
    let written = intervals::write_interval_bins(&chromosomes, &output_dir)
        .with_context(|| format!("failed to write bins to {}", output_dir.display()))?;
    info!(bins = written.len(), output = %output_dir.display(), "interval bins written");
    Ok(())
}

fn run_interval_names(
    bedfile: PathBuf,
    nucleotides_per_bin: i64,
    output: Option<PathBuf>,
) -> Result<()> {
    let labels = intervals::interval_names(&bedfile, nucleotides_per_bin)
        .with_context(|| format!("failed to compute bin names for {}", bedfile.display()))?;
    let mut text = String::new();
    for label in &labels {
        text.push_str(&label.to_string());
        text.push('\n');
    }

    match output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .context("failed to write bin names to stdout")?,
    }
    Ok(())
}
