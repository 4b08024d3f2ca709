//! Static registry of workflow templates.
//!
//! The catalog maps workflow types to immutable definitions: the ordered
//! stage templates (name, assigned role, per-stage timeout, expected
//! artifact shape), the overall timeout, and the set of roles involved.
//! It is built once at service start and injected wherever needed; it is
//! read-only afterwards and safe to share across tasks.

use std::collections::HashMap;

use serde_json::json;

use crate::error::{Error, Result};
use crate::workflow::{Role, WorkflowType};

/// Template for one stage of a workflow definition.
#[derive(Debug, Clone)]
pub struct StageTemplate {
    pub name: String,
    pub role: Role,
    pub timeout_minutes: i64,
    /// Expected shape of the stage's output artifacts (field -> type name).
    /// Not enforced by the engine; surfaced to whoever fills the stage.
    pub artifact_shape: serde_json::Value,
}

impl StageTemplate {
    fn new(name: &str, role: Role, timeout_minutes: i64, artifact_shape: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            role,
            timeout_minutes,
            artifact_shape,
        }
    }
}

/// Immutable, catalog-resident definition of a workflow type.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub stages: Vec<StageTemplate>,
    /// Overall budget for the whole workflow.
    pub timeout_minutes: i64,
    pub required_roles: Vec<Role>,
    /// Expected shape of the workflow-level output artifacts.
    pub artifacts_schema: serde_json::Value,
}

/// Registry of workflow definitions keyed by type.
#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    definitions: HashMap<WorkflowType, WorkflowDefinition>,
}

impl WorkflowCatalog {
    /// Create an empty catalog.
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// The standard catalog shipped with the platform.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        catalog.register(WorkflowType::FeatureDevelopment, feature_development());
        catalog.register(WorkflowType::BugFix, bug_fix());
        catalog.register(WorkflowType::DesignTask, design_task());
        catalog
    }

    /// Register (or replace) a definition for a workflow type.
    pub fn register(&mut self, workflow_type: WorkflowType, definition: WorkflowDefinition) {
        self.definitions.insert(workflow_type, definition);
    }

    /// Look up the definition for a workflow type.
    ///
    /// # Errors
    /// Returns `UnknownWorkflowType` if the type has no registered
    /// definition.
    pub fn definition_for(&self, workflow_type: WorkflowType) -> Result<&WorkflowDefinition> {
        self.definitions
            .get(&workflow_type)
            .ok_or(Error::UnknownWorkflowType(workflow_type))
    }

    /// Check whether a type has a registered definition.
    pub fn is_registered(&self, workflow_type: WorkflowType) -> bool {
        self.definitions.contains_key(&workflow_type)
    }

    /// All registered workflow types.
    pub fn registered_types(&self) -> Vec<WorkflowType> {
        self.definitions.keys().copied().collect()
    }
}

fn feature_development() -> WorkflowDefinition {
    WorkflowDefinition {
        stages: vec![
            StageTemplate::new(
                "Requirements Analysis",
                Role::Cto,
                60,
                json!({"requirements_doc": "str", "technical_specs": "dict"}),
            ),
            StageTemplate::new(
                "UX Design",
                Role::UxDesigner,
                120,
                json!({"user_flows": "list", "wireframes": "dict"}),
            ),
            StageTemplate::new(
                "UI Design",
                Role::UiDesigner,
                120,
                json!({"design_specs": "dict", "component_library": "dict"}),
            ),
            StageTemplate::new(
                "Implementation",
                Role::Developer,
                240,
                json!({"code_changes": "dict", "tests": "dict"}),
            ),
            StageTemplate::new(
                "Code Review",
                Role::CodeReviewer,
                60,
                json!({"review_comments": "list", "approved": "bool"}),
            ),
            StageTemplate::new(
                "Testing",
                Role::Tester,
                120,
                json!({"test_results": "dict", "issues_found": "list"}),
            ),
        ],
        timeout_minutes: 720, // 12 hours total
        required_roles: vec![
            Role::Cto,
            Role::UxDesigner,
            Role::UiDesigner,
            Role::Developer,
            Role::CodeReviewer,
            Role::Tester,
        ],
        artifacts_schema: json!({
            "final_code": "dict",
            "documentation": "str",
            "test_coverage": "float"
        }),
    }
}

fn bug_fix() -> WorkflowDefinition {
    WorkflowDefinition {
        stages: vec![
            StageTemplate::new(
                "Bug Analysis",
                Role::Tester,
                30,
                json!({"bug_report": "dict", "reproduction_steps": "list"}),
            ),
            StageTemplate::new(
                "Implementation",
                Role::Developer,
                120,
                json!({"code_changes": "dict", "tests": "dict"}),
            ),
            StageTemplate::new(
                "Code Review",
                Role::CodeReviewer,
                30,
                json!({"review_comments": "list", "approved": "bool"}),
            ),
            StageTemplate::new(
                "Testing",
                Role::Tester,
                60,
                json!({"test_results": "dict", "verification": "bool"}),
            ),
        ],
        timeout_minutes: 240, // 4 hours total
        required_roles: vec![Role::Developer, Role::CodeReviewer, Role::Tester],
        artifacts_schema: json!({
            "fix_code": "dict",
            "test_results": "dict"
        }),
    }
}

fn design_task() -> WorkflowDefinition {
    WorkflowDefinition {
        stages: vec![
            StageTemplate::new(
                "Requirements Analysis",
                Role::UxDesigner,
                60,
                json!({"user_requirements": "dict", "user_stories": "list"}),
            ),
            StageTemplate::new(
                "UX Design",
                Role::UxDesigner,
                120,
                json!({"wireframes": "dict", "user_flows": "list"}),
            ),
            StageTemplate::new(
                "UI Design",
                Role::UiDesigner,
                180,
                json!({"design_specs": "dict", "components": "dict", "assets": "list"}),
            ),
            StageTemplate::new(
                "Design Review",
                Role::Cto,
                60,
                json!({"review_comments": "list", "approved": "bool"}),
            ),
        ],
        timeout_minutes: 420, // 7 hours total
        required_roles: vec![Role::UxDesigner, Role::UiDesigner, Role::Cto],
        artifacts_schema: json!({
            "final_design": "dict",
            "assets": "list",
            "documentation": "str"
        }),
    }
}
