//! Workflow instance and batch construction.
//!
//! A stage turns its work units into one [`WorkflowInstance`] each: a copy of
//! the input template with the stage's declared keys substituted, a copy of the
//! options with unit-scoped log directories, and the engine invocation. The
//! [`BatchBuilder`] writes those to deterministic paths, either as one run
//! script per unit or as lines of one aggregated script per stage.

mod batch;
mod contract;
mod environment;
mod instance;
mod options;
mod resume;
mod runtime;
pub mod stages;
mod template;

pub use batch::{BatchBuilder, BatchSettings, BatchSummary, StageContext};
pub use contract::{Field, FieldKind, SubstitutionContract};
pub use environment::{Environment, Mode, ScriptPolicy};
pub use instance::{
    workflow_name, InstancePaths, InvocationTemplate, WorkflowInstance,
    DEFAULT_CROMWELL_INVOCATION, INPUT_JSON_PLACEHOLDER, OPTIONS_JSON_PLACEHOLDER,
    WORKFLOW_PLACEHOLDER,
};
pub use options::{WorkflowOptions, DEFAULT_LOG_DIR, DEFAULT_OUTPUTS_DIR};
pub use resume::{ArtifactExistenceChecker, FilesystemChecker, KnownArtifacts, NoArtifacts};
pub use runtime::{
    RuntimeModel, RuntimeRequest, DEFAULT_RUNTIME_BASE_MINUTES, DEFAULT_RUNTIME_MULTIPLIER,
};
pub use stages::{Caller, WorkUnit, WorkflowStage};
pub use template::InputTemplate;

use std::path::PathBuf;

use thiserror::Error;

use crate::intervals::BinningError;

/// Errors raised while building workflow batches.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A key the stage requires is absent from its input template.
    #[error("input template {template} is missing required key '{key}'")]
    MissingTemplateKey {
        /// Fully qualified key.
        key: String,
        /// Template that lacks it.
        template: PathBuf,
    },

    /// A template or options document is not a JSON object.
    #[error("{path} must contain a JSON object")]
    TemplateNotObject {
        /// Offending document.
        path: PathBuf,
    },

    /// Unit set disagrees with the manifest or fastq list.
    #[error("inconsistent batch: {0}")]
    InconsistentState(String),

    /// Filesystem failure.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON, or JSON that does not fit the expected shape.
    #[error("json error in {path}: {source}")]
    Json {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Bin labels could not be computed.
    #[error(transparent)]
    Binning(#[from] BinningError),
}
