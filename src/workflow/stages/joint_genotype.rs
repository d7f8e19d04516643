use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use super::{path_value, unexpected_unit, Caller, WorkUnit, WorkflowStage};
use crate::workflow::{
    Field, Mode, RuntimeModel, StageContext, SubstitutionContract, WorkflowError,
    WorkflowInstance,
};

const CALLER: Field = Field::substituted("caller");
const GLNEXUS_CONFIG: Field = Field::substituted("glnexusConfig");
const VARIANT_FOF: Field = Field::substituted("variantFOF");
const CALLED_VARIANTS: Field = Field::substituted("calledVariants");
const GLNEXUS_RUNTIME_ATTRIBUTES: Field = Field::optional("glnexusRuntimeAttributes");

static CONTRACT: SubstitutionContract = SubstitutionContract::new(
    "JointGenotype",
    &[
        CALLER,
        GLNEXUS_CONFIG,
        VARIANT_FOF,
        CALLED_VARIANTS,
        GLNEXUS_RUNTIME_ATTRIBUTES,
    ],
);

/// GLnexus joint genotyping of every sample's gVCFs, one unit per caller.
#[derive(Debug, Clone)]
pub struct JointGenotypeStage {
    samples: Vec<String>,
    strelka_glnexus_config: String,
    runtime: RuntimeModel,
}

impl JointGenotypeStage {
    /// Stage over `samples`; strelka2 uses the GLnexus YAML at `strelka_glnexus_config`.
    pub fn new<I, S>(samples: I, strelka_glnexus_config: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            samples: samples.into_iter().map(Into::into).collect(),
            strelka_glnexus_config: strelka_glnexus_config.into(),
            runtime: RuntimeModel::default(),
        }
    }

    /// Replace the wall-clock model.
    pub fn with_runtime_model(mut self, runtime: RuntimeModel) -> Self {
        self.runtime = runtime;
        self
    }

    fn glnexus_config(&self, caller: Caller) -> &str {
        match caller {
            Caller::DeepVariant => "DeepVariant",
            Caller::HaplotypeCaller => "gatk",
            Caller::Strelka2 => &self.strelka_glnexus_config,
        }
    }

    /// `{inputs_dir}/{project}.{run_id}.{caller}_vcf_files.txt`
    fn gvcf_list_path(&self, caller: Caller, ctx: &StageContext<'_>) -> PathBuf {
        let settings = ctx.settings();
        ctx.inputs_dir().join(format!(
            "{}.{}.{}_vcf_files.txt",
            settings.project,
            settings.run_id,
            caller.as_str()
        ))
    }

    fn gvcfs(&self, caller: Caller, ctx: &StageContext<'_>) -> Vec<String> {
        self.samples
            .iter()
            .map(|sample| ctx.output_path(caller.gvcf(sample)).display().to_string())
            .collect()
    }
}

impl WorkflowStage for JointGenotypeStage {
    fn name(&self) -> &'static str {
        "joint_genotype"
    }

    fn log_namespace(&self) -> &'static str {
        "joint-genotype"
    }

    fn contract(&self) -> &'static SubstitutionContract {
        &CONTRACT
    }

    fn work_units(&self, _ctx: &StageContext<'_>) -> Vec<WorkUnit> {
        Caller::ALL.into_iter().map(WorkUnit::Caller).collect()
    }

    fn runtime_parameters(&self, base: &[String], ctx: &StageContext<'_>) -> Vec<String> {
        let request = self.runtime.request(self.samples.len());
        info!(samples = self.samples.len(), runtime = %request, "joint genotype runtime request");
        request.apply(base, ctx.environment())
    }

    /// In `run` mode, write one gVCF file-of-files per caller.
    fn prepare(&self, ctx: &StageContext<'_>) -> Result<(), WorkflowError> {
        if self.strelka_glnexus_config.trim().is_empty() {
            return Err(WorkflowError::Config(
                "joint genotyping needs a GLnexus config for strelka2".to_string(),
            ));
        }
        if ctx.mode() != Mode::Run {
            return Ok(());
        }
        for caller in Caller::ALL {
            let path = self.gvcf_list_path(caller, ctx);
            let mut contents = String::new();
            for gvcf in self.gvcfs(caller, ctx) {
                contents.push_str(&gvcf);
                contents.push('\n');
            }
            fs::write(&path, contents).map_err(|source| WorkflowError::Io { path, source })?;
        }
        Ok(())
    }

    fn configure(
        &self,
        instance: &mut WorkflowInstance,
        unit: &WorkUnit,
        ctx: &StageContext<'_>,
    ) -> Result<(), WorkflowError> {
        let WorkUnit::Caller(caller) = unit else {
            return Err(unexpected_unit(self.name(), unit));
        };
        let caller = *caller;
        instance.set(&CALLER, caller.as_str());
        instance.set(&GLNEXUS_CONFIG, self.glnexus_config(caller));

        match ctx.mode() {
            Mode::Run => {
                instance.set(&VARIANT_FOF, path_value(&self.gvcf_list_path(caller, ctx)));
                instance.clear(&CALLED_VARIANTS);
            }
            Mode::Server => {
                instance.set(&CALLED_VARIANTS, self.gvcfs(caller, ctx));
                instance.clear(&VARIANT_FOF);
            }
            Mode::AwsOmics => {
                instance.update_input(
                    CALLED_VARIANTS.name(),
                    Some(Value::from(self.gvcfs(caller, ctx))),
                );
                instance.update_input(VARIANT_FOF.name(), None);
            }
        }

        if let Some(Value::Object(attributes)) = instance.get_mut(&GLNEXUS_RUNTIME_ATTRIBUTES) {
            let request = self.runtime.request(self.samples.len());
            attributes.insert("runtimeMinutes".into(), Value::from(request.total_minutes));
        }
        Ok(())
    }
}
