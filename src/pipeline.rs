//! End-to-end `prepare`: manifest and fastq in, workflow batches out.

use tracing::info;

use crate::config::{PipelineConfig, StageKind};
use crate::intervals::IntervalBinner;
use crate::manifest::{resolve_sample_ids, FastqTable, Manifest};
use crate::workflow::stages::{
    HarmonizeStage, JointGenotypeStage, MappingStage, PremapQcStage, VariantCallingStage,
};
use crate::workflow::{BatchBuilder, BatchSummary, InputTemplate, WorkflowError};
use crate::PipelineError;

/// Emit every selected stage of `config`, in pipeline order.
pub fn prepare(config: &PipelineConfig) -> Result<Vec<BatchSummary>, PipelineError> {
    let manifest = Manifest::from_path(&config.manifest)?;
    let fastq = FastqTable::from_path(&config.fastq_list, &manifest)?;
    let samples = resolve_sample_ids(
        &config.sample_ids,
        config.sample_list.as_deref(),
        &manifest,
        &fastq,
    )?;

    let settings = config.batch_settings()?;
    let builder = BatchBuilder::new(&settings);
    info!(
        project = %config.project,
        run_id = %config.run_id,
        samples = samples.len(),
        "preparing workflows"
    );

    let mut summaries = Vec::new();
    for stage in config.ordered_stages() {
        let template = InputTemplate::for_stage(
            stage.name(),
            config.input_template(stage),
            &config.template_dir,
            config.environment,
        )?;
        let summary = match stage {
            StageKind::PremapQc => builder.build(&PremapQcStage::new(&samples), &template)?,
            StageKind::Mapping => builder.build(&MappingStage::new(&samples, &fastq), &template)?,
            StageKind::VariantCalling => {
                builder.build(&VariantCallingStage::new(&samples), &template)?
            }
            StageKind::JointGenotype => {
                let stage = JointGenotypeStage::new(&samples, config.strelka_glnexus_config())
                    .with_runtime_model(config.runtime);
                builder.build(&stage, &template)?
            }
            StageKind::Harmonize => builder.build(&harmonize_stage(config)?, &template)?,
        };
        summaries.push(summary);
    }
    Ok(summaries)
}

fn harmonize_stage(config: &PipelineConfig) -> Result<HarmonizeStage, WorkflowError> {
    if let Some(names) = &config.bin_interval_names {
        return HarmonizeStage::from_names_file(names);
    }
    if let Some(bedfile) = &config.interval_bed {
        return HarmonizeStage::from_bedfile(bedfile, &IntervalBinner::new(config.nucleotides_per_bin));
    }
    Ok(HarmonizeStage::concat())
}
