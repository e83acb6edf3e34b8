use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Component, Priority, Submission};

/// Planner failure. Triggers the fallback planner; fatal only when both fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    #[error("planner unreachable: {0}")]
    Unreachable(String),
    #[error("planner returned an unparseable plan: {0}")]
    Unparseable(String),
    #[error("planner timed out after {0}s")]
    Timeout(u64),
    #[error("plan contains no assessable components")]
    EmptyPlan,
}

/// One step as proposed by a planner, before component names are validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftStep {
    pub component: String,
    pub priority: Priority,
    #[serde(default)]
    pub reason: String,
}

/// Untyped planner output; see [`Plan::from_draft`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanDraft {
    pub analysis: String,
    pub steps: Vec<DraftStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub component: Component,
    pub priority: Priority,
    pub reason: String,
}

/// Ordered list of components to assess in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub analysis: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Validate a draft: unknown components are logged and dropped, repeats keep
    /// their first occurrence, and steps are ordered by priority with declaration
    /// order breaking ties.
    pub fn from_draft(draft: PlanDraft) -> Result<Self, PlanningError> {
        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(draft.steps.len());

        for step in draft.steps {
            let component = match step.component.parse::<Component>() {
                Ok(component) => component,
                Err(error) => {
                    warn!(%error, "dropping plan step");
                    continue;
                }
            };
            if !seen.insert(component) {
                continue;
            }
            steps.push(PlanStep {
                component,
                priority: step.priority,
                reason: step.reason,
            });
        }

        if steps.is_empty() {
            return Err(PlanningError::EmptyPlan);
        }

        steps.sort_by_key(|step| step.priority);

        Ok(Self {
            analysis: draft.analysis,
            steps,
        })
    }

    pub fn components(&self) -> Vec<Component> {
        self.steps.iter().map(|step| step.component).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Capability deciding which components are relevant for a submission.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, submission: &Submission) -> Result<PlanDraft, PlanningError>;
}

/// Presence-flag planner. Always plans `use_case` and `messages`, then adds the
/// optional components the submission actually carries.
#[derive(Debug, Clone, Default)]
pub struct RulePlanner;

impl RulePlanner {
    pub fn draft_for(submission: &Submission) -> PlanDraft {
        let mut steps = vec![
            draft_step(Component::UseCase, Priority::High, "use case is always assessed"),
            draft_step(Component::Messages, Priority::High, "sample messages are always assessed"),
        ];
        let mut included = vec![Component::UseCase.label(), Component::Messages.label()];

        if submission.has_website() {
            steps.push(draft_step(Component::Website, Priority::Medium, "website url provided"));
            included.push(Component::Website.label());
        }
        if submission.has_images() {
            steps.push(draft_step(Component::Images, Priority::Medium, "opt-in images provided"));
            included.push(Component::Images.label());
        }
        if submission.has_documents() {
            steps.push(draft_step(
                Component::Documents,
                Priority::Low,
                "supporting documents provided",
            ));
            included.push(Component::Documents.label());
        }

        PlanDraft {
            analysis: format!("rule-based plan covering {}", included.join(", ")),
            steps,
        }
    }
}

fn draft_step(component: Component, priority: Priority, reason: &str) -> DraftStep {
    DraftStep {
        component: component.label().to_string(),
        priority,
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Planner for RulePlanner {
    async fn plan(&self, submission: &Submission) -> Result<PlanDraft, PlanningError> {
        Ok(Self::draft_for(submission))
    }
}
