use std::fmt;

use clap::ValueEnum;

/// Execution environment the generated artifacts target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Environment {
    /// One sbatch-ready `run.sh` per unit.
    Slurm,
    /// One swarm file per stage.
    Swarm,
    /// One `run.sh` per unit, run directly.
    Local,
    /// One aggregated shell script per stage; workflow keys are not namespaced.
    Aws,
    /// One aggregated shell script per stage.
    Gcp,
}

/// How invocation lines are packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPolicy {
    /// `{unit}.{workflow}_run.sh` per unit.
    PerUnit,
    /// One shared file per stage with the given extension.
    Aggregated {
        /// File extension without the dot.
        extension: &'static str,
    },
}

impl Environment {
    /// Script packaging for this environment.
    pub fn script_policy(self) -> ScriptPolicy {
        match self {
            Environment::Slurm | Environment::Local => ScriptPolicy::PerUnit,
            Environment::Swarm => ScriptPolicy::Aggregated { extension: "swarm" },
            Environment::Aws | Environment::Gcp => ScriptPolicy::Aggregated { extension: "sh" },
        }
    }

    /// Whether previously produced outputs are visible on the local filesystem.
    pub fn probes_outputs(self) -> bool {
        matches!(
            self,
            Environment::Slurm | Environment::Swarm | Environment::Local
        )
    }

    /// Whether input keys carry the `Workflow.` prefix.
    pub fn namespaced_keys(self) -> bool {
        !matches!(self, Environment::Aws)
    }

    /// Folder holding environment-specific runtime inputs.
    pub fn runtime_folder(self) -> &'static str {
        match self {
            Environment::Slurm | Environment::Swarm | Environment::Local => "hpc",
            Environment::Aws => "aws",
            Environment::Gcp => "gcp",
        }
    }

    /// Scheduler directive prefix used for resource requests.
    pub fn directive_prefix(self) -> Option<&'static str> {
        match self {
            Environment::Slurm => Some("#SBATCH"),
            Environment::Swarm => Some("#SWARM"),
            _ => None,
        }
    }

    /// Lowercase name as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Slurm => "slurm",
            Environment::Swarm => "swarm",
            Environment::Local => "local",
            Environment::Aws => "aws",
            Environment::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the workflow engine will be driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum Mode {
    /// Single-workflow `run` invocations; file lists are passed by path.
    #[default]
    Run,
    /// Engine server submissions; file lists are inlined into the inputs.
    Server,
    /// AWS HealthOmics submissions; inlined lists under unprefixed keys.
    AwsOmics,
}
