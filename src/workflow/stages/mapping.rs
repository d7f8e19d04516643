use std::path::PathBuf;

use serde_json::Value;

use super::{path_value, unexpected_unit, WorkUnit, WorkflowStage};
use crate::manifest::FastqTable;
use crate::workflow::{
    Environment, Field, StageContext, SubstitutionContract, WorkflowError, WorkflowInstance,
};

const SAMPLE_ID: Field = Field::substituted("sampleID");
const SAMPLE_FASTQ_FILES: Field = Field::substituted("sampleFastqFiles");
const MAPPED_BAM: Field = Field::substituted("mappedBAM");
const RUN_BAM_METRICS: Field = Field::substituted("runBamMetrics");
const RUN_COLLECT_MULTIPLE_METRICS: Field = Field::substituted("runCollectMultipleMetrics");
const RUN_KRAKEN: Field = Field::substituted("runKraken");
const RUN_SAMTOOLS_COVERAGE: Field = Field::substituted("runSamtoolsCoverage");
const RUN_SOMALIER: Field = Field::substituted("runSomalier");
const RUN_VERIFY_BAM_ID: Field = Field::substituted("runVerifyBamID");

static CONTRACT: SubstitutionContract = SubstitutionContract::new(
    "Mapping",
    &[
        SAMPLE_ID,
        SAMPLE_FASTQ_FILES,
        MAPPED_BAM,
        RUN_BAM_METRICS,
        RUN_COLLECT_MULTIPLE_METRICS,
        RUN_KRAKEN,
        RUN_SAMTOOLS_COVERAGE,
        RUN_SOMALIER,
        RUN_VERIFY_BAM_ID,
    ],
);

/// Alignment, BQSR and mapping QC per sample, fed by premap QC's fastp output.
#[derive(Debug, Clone)]
pub struct MappingStage<'a> {
    samples: Vec<String>,
    fastq: &'a FastqTable,
}

impl<'a> MappingStage<'a> {
    /// Stage over `samples`, taking fastq files from `fastq`.
    pub fn new<I, S>(samples: I, fastq: &'a FastqTable) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            samples: samples.into_iter().map(Into::into).collect(),
            fastq,
        }
    }

    fn fastp_outputs(&self, sample: &str, ctx: &StageContext<'_>) -> Vec<Value> {
        self.fastq
            .for_sample(sample)
            .map(|entry| {
                let file = format!("{}_{}_fastp.fastq.gz", entry.lane_id(), entry.paired_end());
                path_value(&ctx.output_path(format!("premap_qc/fastp/{sample}")).join(file))
            })
            .collect()
    }
}

// QC sub-steps and the artifact each leaves behind.
fn qc_artifacts(sample: &str) -> [(Field, PathBuf); 6] {
    [
        (
            RUN_BAM_METRICS,
            PathBuf::from(format!("mapping_qc/bammetrics/{sample}.bammetrics.txt")),
        ),
        (
            RUN_COLLECT_MULTIPLE_METRICS,
            PathBuf::from(format!("mapping_qc/collectmultiplemetrics/{sample}")),
        ),
        (RUN_KRAKEN, PathBuf::from(format!("mapping_qc/kraken2/{sample}"))),
        (
            RUN_SAMTOOLS_COVERAGE,
            PathBuf::from(format!(
                "mapping_qc/samtools_coverage/{sample}.samtools_coverage.txt"
            )),
        ),
        (
            RUN_SOMALIER,
            PathBuf::from(format!("mapping_qc/somalier/extract/{sample}.somalier")),
        ),
        (
            RUN_VERIFY_BAM_ID,
            PathBuf::from(format!("mapping_qc/verifybamid/{sample}")),
        ),
    ]
}

impl WorkflowStage for MappingStage<'_> {
    fn name(&self) -> &'static str {
        "mapping"
    }

    fn log_namespace(&self) -> &'static str {
        "mapping"
    }

    fn contract(&self) -> &'static SubstitutionContract {
        &CONTRACT
    }

    fn work_units(&self, _ctx: &StageContext<'_>) -> Vec<WorkUnit> {
        self.samples.iter().cloned().map(WorkUnit::Sample).collect()
    }

    fn configure(
        &self,
        instance: &mut WorkflowInstance,
        unit: &WorkUnit,
        ctx: &StageContext<'_>,
    ) -> Result<(), WorkflowError> {
        let WorkUnit::Sample(sample) = unit else {
            return Err(unexpected_unit(self.name(), unit));
        };

        let fastq_files = self.fastp_outputs(sample, ctx);
        if fastq_files.is_empty() {
            return Err(WorkflowError::InconsistentState(format!(
                "sample {sample} has no fastq files in the fastq list"
            )));
        }
        instance.set(&SAMPLE_FASTQ_FILES, fastq_files);
        instance.set(&SAMPLE_ID, sample.as_str());

        if ctx.environment() == Environment::Aws {
            return Ok(());
        }

        instance.clear(&MAPPED_BAM);
        let bam = ctx.output_path(format!("fq2bam/{sample}/{sample}.bam"));
        if ctx.artifact_exists(&bam) {
            instance.set(&MAPPED_BAM, path_value(&bam));
            instance.clear(&SAMPLE_FASTQ_FILES);
        }
        for (flag, artifact) in qc_artifacts(sample) {
            if ctx.artifact_exists(&ctx.output_path(artifact)) {
                instance.set(&flag, false);
            }
        }
        Ok(())
    }
}
