use super::{path_value, unexpected_unit, WorkUnit, WorkflowStage};
use crate::workflow::{Field, StageContext, SubstitutionContract, WorkflowError, WorkflowInstance};

const SAMPLE_ID: Field = Field::substituted("sampleID");
const SAMPLE_BAM: Field = Field::substituted("sampleBAM");
const SAMPLE_BAI: Field = Field::substituted("sampleBAI");
const SAMPLE_BQSR: Field = Field::substituted("sampleBQSR");

static CONTRACT: SubstitutionContract = SubstitutionContract::new(
    "VariantCalling",
    &[SAMPLE_ID, SAMPLE_BAM, SAMPLE_BAI, SAMPLE_BQSR],
);

/// Per-sample gVCF calling from the mapped BAM.
#[derive(Debug, Clone, Default)]
pub struct VariantCallingStage {
    samples: Vec<String>,
}

impl VariantCallingStage {
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

impl WorkflowStage for VariantCallingStage {
    fn name(&self) -> &'static str {
        "variant_calling"
    }

    fn log_namespace(&self) -> &'static str {
        "variant-calling"
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
        let bam_dir = ctx.output_path(format!("fq2bam/{sample}"));
        instance.set(&SAMPLE_ID, sample.as_str());
        instance.set(&SAMPLE_BAM, path_value(&bam_dir.join(format!("{sample}.bam"))));
        instance.set(&SAMPLE_BAI, path_value(&bam_dir.join(format!("{sample}.bam.bai"))));
        instance.set(
            &SAMPLE_BQSR,
            path_value(&bam_dir.join(format!("{sample}.BQSR-REPORT.txt"))),
        );
        Ok(())
    }
}
