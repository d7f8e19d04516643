//! The five pipeline stages.
//!
//! Each stage names its workflow, declares the input keys it substitutes, and
//! configures one [`WorkflowInstance`] per work unit. The batch builder drives
//! them all the same way.

mod harmonize;
mod joint_genotype;
mod mapping;
mod premap_qc;
mod variant_calling;

pub use harmonize::HarmonizeStage;
pub use joint_genotype::JointGenotypeStage;
pub use mapping::MappingStage;
pub use premap_qc::PremapQcStage;
pub use variant_calling::VariantCallingStage;

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;

use super::{StageContext, SubstitutionContract, WorkflowError, WorkflowInstance};

/// The dimension a stage batches over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkUnit {
    /// One sample.
    Sample(String),
    /// One variant caller.
    Caller(Caller),
    /// One genomic bin label.
    Bin(String),
    /// The whole project, concatenated.
    Concat,
}

impl WorkUnit {
    /// Identifier used in paths and log directories.
    pub fn id(&self) -> &str {
        match self {
            WorkUnit::Sample(id) | WorkUnit::Bin(id) => id,
            WorkUnit::Caller(caller) => caller.as_str(),
            WorkUnit::Concat => "concat",
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Variant callers whose gVCFs are jointly genotyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Caller {
    /// DeepVariant.
    DeepVariant,
    /// GATK HaplotypeCaller.
    HaplotypeCaller,
    /// Strelka2.
    Strelka2,
}

impl Caller {
    /// Every caller, in build order.
    pub const ALL: [Caller; 3] = [Caller::DeepVariant, Caller::HaplotypeCaller, Caller::Strelka2];

    /// Directory and file name used for the caller.
    pub fn as_str(self) -> &'static str {
        match self {
            Caller::DeepVariant => "deepvariant",
            Caller::HaplotypeCaller => "haplotypecaller",
            Caller::Strelka2 => "strelka2",
        }
    }

    /// gVCF of `sample`, relative to the outputs directory.
    pub fn gvcf(self, sample: &str) -> PathBuf {
        let name = self.as_str();
        let file = match self {
            Caller::Strelka2 => format!("{sample}.strelka.genome.vcf.gz"),
            _ => format!("{sample}.{name}.g.vcf.gz"),
        };
        PathBuf::from(name).join(sample).join(file)
    }
}

/// A pipeline stage the batch builder can emit.
pub trait WorkflowStage {
    /// Workflow name; also the definition file stem.
    fn name(&self) -> &'static str;

    /// Log subdirectory namespace, e.g. `premap-qc`.
    fn log_namespace(&self) -> &'static str;

    /// Input keys this stage reads or writes.
    fn contract(&self) -> &'static SubstitutionContract;

    /// Units to build, in order.
    fn work_units(&self, ctx: &StageContext<'_>) -> Vec<WorkUnit>;

    /// Identifier used in the unit's file names.
    fn instance_id(&self, unit: &WorkUnit, _ctx: &StageContext<'_>) -> String {
        unit.id().to_string()
    }

    /// Log directory suffix for `unit`.
    fn log_subdir(&self, unit: &WorkUnit) -> String {
        format!("{}/{}", self.log_namespace(), unit.id())
    }

    /// Scheduler parameters for the stage's scripts.
    fn runtime_parameters(&self, base: &[String], _ctx: &StageContext<'_>) -> Vec<String> {
        base.to_vec()
    }

    /// Stage-wide artifacts written before any unit.
    fn prepare(&self, _ctx: &StageContext<'_>) -> Result<(), WorkflowError> {
        Ok(())
    }

    /// Apply the unit's substitutions and resume decisions.
    fn configure(
        &self,
        instance: &mut WorkflowInstance,
        unit: &WorkUnit,
        ctx: &StageContext<'_>,
    ) -> Result<(), WorkflowError>;
}

pub(crate) fn unexpected_unit(stage: &str, unit: &WorkUnit) -> WorkflowError {
    WorkflowError::InconsistentState(format!("{stage} cannot build unit {unit:?}"))
}

pub(crate) fn path_value(path: &std::path::Path) -> Value {
    Value::String(path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvcf_names() {
        assert_eq!(
            Caller::DeepVariant.gvcf("S1"),
            PathBuf::from("deepvariant/S1/S1.deepvariant.g.vcf.gz")
        );
        assert_eq!(
            Caller::Strelka2.gvcf("S1"),
            PathBuf::from("strelka2/S1/S1.strelka.genome.vcf.gz")
        );
    }

    #[test]
    fn unit_ids() {
        assert_eq!(WorkUnit::Caller(Caller::HaplotypeCaller).id(), "haplotypecaller");
        assert_eq!(WorkUnit::Concat.to_string(), "concat");
    }
}
