use super::{unexpected_unit, WorkUnit, WorkflowStage};
use crate::workflow::{Field, StageContext, SubstitutionContract, WorkflowError, WorkflowInstance};

const SAMPLE_ID: Field = Field::substituted("sampleID");
const RUN_FASTP: Field = Field::substituted("runFastp");
const RUN_FASTQC: Field = Field::substituted("runFastQC");
const RUN_FASTQ_SCREEN: Field = Field::substituted("runFastqScreen");

static CONTRACT: SubstitutionContract = SubstitutionContract::new(
    "PremapQC",
    &[SAMPLE_ID, RUN_FASTP, RUN_FASTQC, RUN_FASTQ_SCREEN],
);

// Sub-step flag and the per-sample output directory that proves it ran.
const RESUME_PROBES: [(Field, &str); 3] = [
    (RUN_FASTP, "premap_qc/fastp"),
    (RUN_FASTQC, "premap_qc/fastqc"),
    (RUN_FASTQ_SCREEN, "premap_qc/fastq_screen"),
];

/// Per-sample read QC: fastp, FastQC, FastQ Screen.
#[derive(Debug, Clone, Default)]
pub struct PremapQcStage {
    samples: Vec<String>,
}

impl PremapQcStage {
    /// Stage over `samples`, in the given order.
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            samples: samples.into_iter().map(Into::into).collect(),
        }
    }
}

impl WorkflowStage for PremapQcStage {
    fn name(&self) -> &'static str {
        "premap_qc"
    }

    fn log_namespace(&self) -> &'static str {
        "premap-qc"
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
        instance.set(&SAMPLE_ID, sample.as_str());
        for (flag, dir) in &RESUME_PROBES {
            if ctx.artifact_exists(&ctx.output_path(dir).join(sample)) {
                instance.set(flag, false);
            }
        }
        Ok(())
    }
}
