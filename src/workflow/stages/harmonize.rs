use std::fs;
use std::path::Path;

use super::{path_value, Caller, WorkUnit, WorkflowStage};
use crate::intervals::{self, IntervalBinner};
use crate::workflow::{Field, StageContext, SubstitutionContract, WorkflowError, WorkflowInstance};

const PROJECT: Field = Field::required("project");
const DEEPVARIANT_VCF: Field = Field::substituted("deepvariantVCF");
const DEEPVARIANT_VCF_INDEX: Field = Field::substituted("deepvariantVCFIndex");
const HAPLOTYPECALLER_VCF: Field = Field::substituted("haplotypecallerVCF");
const HAPLOTYPECALLER_VCF_INDEX: Field = Field::substituted("haplotypecallerVCFIndex");
const STRELKA2_VCF: Field = Field::substituted("strelka2VCF");
const STRELKA2_VCF_INDEX: Field = Field::substituted("strelka2VCFIndex");

static BINNED: SubstitutionContract = SubstitutionContract::new(
    "Harmonize",
    &[
        PROJECT,
        DEEPVARIANT_VCF,
        DEEPVARIANT_VCF_INDEX,
        HAPLOTYPECALLER_VCF,
        HAPLOTYPECALLER_VCF_INDEX,
        STRELKA2_VCF,
        STRELKA2_VCF_INDEX,
    ],
);

/// Concat keys carry the `Harmonize.` prefix outside aws, like every other stage.
static CONCAT: SubstitutionContract = SubstitutionContract::new(
    "Harmonize",
    &[
        DEEPVARIANT_VCF,
        DEEPVARIANT_VCF_INDEX,
        HAPLOTYPECALLER_VCF,
        HAPLOTYPECALLER_VCF_INDEX,
        STRELKA2_VCF,
        STRELKA2_VCF_INDEX,
    ],
);

fn caller_fields(caller: Caller) -> (&'static Field, &'static Field) {
    match caller {
        Caller::DeepVariant => (&DEEPVARIANT_VCF, &DEEPVARIANT_VCF_INDEX),
        Caller::HaplotypeCaller => (&HAPLOTYPECALLER_VCF, &HAPLOTYPECALLER_VCF_INDEX),
        Caller::Strelka2 => (&STRELKA2_VCF, &STRELKA2_VCF_INDEX),
    }
}

/// Merges the three callers' joint genotypes, per genomic bin or once over
/// the concatenated genome.
#[derive(Debug, Clone, Default)]
pub struct HarmonizeStage {
    bins: Option<Vec<String>>,
}

impl HarmonizeStage {
    /// Single unit over the concatenated joint genotype outputs.
    pub fn concat() -> Self {
        Self { bins: None }
    }

    /// One unit per bin label.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bins: Some(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// Bin labels from a names file, one per line.
    pub fn from_names_file<P: AsRef<Path>>(path: P) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| WorkflowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_labels(
            contents.lines().map(str::trim).filter(|line| !line.is_empty()),
        ))
    }

    /// Bin labels computed from an interval bedfile.
    pub fn from_bedfile<P: AsRef<Path>>(
        bedfile: P,
        binner: &IntervalBinner,
    ) -> Result<Self, WorkflowError> {
        let chromosomes = intervals::bin_bedfile(bedfile, binner)?;
        Ok(Self::from_labels(
            chromosomes
                .iter()
                .flat_map(|chromosome| chromosome.labels().map(ToString::to_string)),
        ))
    }

    /// Bin labels, if binned.
    pub fn bins(&self) -> Option<&[String]> {
        self.bins.as_deref()
    }
}

impl WorkflowStage for HarmonizeStage {
    fn name(&self) -> &'static str {
        "harmonize"
    }

    fn log_namespace(&self) -> &'static str {
        "harmonize"
    }

    fn contract(&self) -> &'static SubstitutionContract {
        match self.bins {
            Some(_) => &BINNED,
            None => &CONCAT,
        }
    }

    fn work_units(&self, _ctx: &StageContext<'_>) -> Vec<WorkUnit> {
        match &self.bins {
            Some(bins) => bins.iter().cloned().map(WorkUnit::Bin).collect(),
            None => vec![WorkUnit::Concat],
        }
    }

    fn instance_id(&self, unit: &WorkUnit, ctx: &StageContext<'_>) -> String {
        let settings = ctx.settings();
        match unit {
            WorkUnit::Concat => format!("{}_{}", settings.project, settings.run_id),
            _ => format!("{}_{}_{}", settings.project, settings.run_id, unit.id()),
        }
    }

    fn log_subdir(&self, unit: &WorkUnit) -> String {
        match unit {
            WorkUnit::Concat => self.log_namespace().to_string(),
            _ => format!("{}/{}", self.log_namespace(), unit.id()),
        }
    }

    fn configure(
        &self,
        instance: &mut WorkflowInstance,
        unit: &WorkUnit,
        ctx: &StageContext<'_>,
    ) -> Result<(), WorkflowError> {
        let label = unit.id();
        for caller in Caller::ALL {
            let name = caller.as_str();
            let vcf = ctx.output_path(format!("joint_genotype/{name}/{name}.{label}.bcf.gz"));
            let index = format!("{}.tbi", vcf.display());
            let (vcf_field, index_field) = caller_fields(caller);
            instance.set(vcf_field, path_value(&vcf));
            instance.set(index_field, index);
        }

        if let WorkUnit::Bin(label) = unit {
            let key = self.contract().key(&PROJECT, ctx.environment());
            let project = ctx.template().require_str(&key)?;
            instance.set(&PROJECT, format!("{project}_{label}"));
        }
        Ok(())
    }
}
