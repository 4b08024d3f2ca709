use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("No workflow definition registered for type: {0}")]
    UnknownWorkflowType(crate::workflow::WorkflowType),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(crate::workflow::WorkflowId),

    #[error("Workflow {id} is in terminal state {state}")]
    WorkflowTerminal {
        id: crate::workflow::WorkflowId,
        state: crate::workflow::WorkflowState,
    },

    #[error("Invalid stage index {index} for workflow {workflow} ({len} stages)")]
    InvalidStageIndex {
        workflow: crate::workflow::WorkflowId,
        index: usize,
        len: usize,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Monitor start failed: {0}")]
    MonitorStart(String),
}

pub type Result<T> = std::result::Result<T, Error>;
