//! crewflow: workflow orchestration for role-based teams.
//!
//! Workflows are ordered sequences of role-assigned stages instantiated
//! from a static catalog. The engine advances them through a shared
//! state machine, keeps blocked workflows honest against their
//! dependencies, and runs a background monitor that retries timed-out
//! stages in place and fails workflows that blow their overall budget.
//!
//! Typical use:
//!
//! ```no_run
//! use crewflow::{Config, CreateWorkflowRequest, WorkflowEngine, WorkflowType};
//!
//! # async fn run() -> crewflow::Result<()> {
//! let engine = WorkflowEngine::new(&Config::default());
//! let workflow = engine
//!     .create_workflow(CreateWorkflowRequest::new(
//!         WorkflowType::BugFix,
//!         "Fix login crash",
//!         "alice",
//!     ))
//!     .await?;
//! println!("created {}", workflow.id);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod log;
pub mod monitor;
pub mod report;
pub mod store;
pub mod workflow;

pub use catalog::{StageTemplate, WorkflowCatalog, WorkflowDefinition};
pub use config::Config;
pub use engine::{CreateWorkflowRequest, WorkflowEngine};
pub use error::{Error, Result};
pub use monitor::{MonitorState, SweepStats, TimeoutRetryMonitor};
pub use report::{ReportGenerator, ReportRange, WorkflowReport};
pub use store::{InMemoryGateway, ListFilter, StorageGateway, WorkflowStore};
pub use workflow::{
    StageUpdate, Workflow, WorkflowId, WorkflowPriority, WorkflowStage, WorkflowState,
    WorkflowType,
};
