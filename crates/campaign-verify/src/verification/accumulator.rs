use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::assessors::AssessmentError;
use super::domain::{Component, Issue, Priority, Severity, Verdict};

/// Critical finding copied out of a verdict for the report headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalIssue {
    /// `None` for findings about the submission as a whole.
    pub component: Option<Component>,
    pub description: String,
    pub recommendation: String,
}

/// Prioritized follow-up surfaced in the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub component: Component,
    pub priority: Priority,
    pub description: String,
    pub action: String,
}

/// Per-run merge target for every verdict. Owned by the background task only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub component_scores: BTreeMap<Component, Option<u8>>,
    pub critical_issues: Vec<CriticalIssue>,
    pub recommendations: Vec<RecommendationEntry>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one component's verdict into the state.
    ///
    /// Re-merging a component replaces everything previously recorded for it, so a
    /// retried step never double-counts.
    pub fn merge(&mut self, component: Component, verdict: &Verdict) {
        self.component_scores.insert(component, verdict.score);
        self.critical_issues
            .retain(|issue| issue.component != Some(component));
        self.recommendations
            .retain(|entry| entry.component != component);

        for issue in &verdict.issues {
            if issue.severity == Severity::Critical {
                self.critical_issues.push(CriticalIssue {
                    component: Some(component),
                    description: issue.description.clone(),
                    recommendation: issue.recommendation.clone(),
                });
            }

            self.recommendations.push(RecommendationEntry {
                component,
                priority: issue.severity.priority(),
                description: issue.description.clone(),
                action: issue.recommendation.clone(),
            });
        }

        for recommendation in &verdict.recommendations {
            self.recommendations.push(RecommendationEntry {
                component,
                priority: recommendation.priority,
                description: recommendation.description.clone(),
                action: recommendation.action.clone(),
            });
        }
    }

    /// Record a step whose assessment could not be obtained: zero score plus a
    /// critical issue naming the component.
    pub fn record_failure(&mut self, component: Component, error: &AssessmentError) {
        let verdict = failure_verdict(component, error);
        self.merge(component, &verdict);
    }

    pub fn score_for(&self, component: Component) -> Option<u8> {
        self.component_scores.get(&component).copied().flatten()
    }
}

pub(crate) fn failure_verdict(component: Component, error: &AssessmentError) -> Verdict {
    Verdict {
        score: Some(0),
        compliant: false,
        issues: vec![Issue::new(
            Severity::Critical,
            format!("{component} analysis unavailable: {error}"),
            format!("Re-run verification once the {component} assessment can be completed"),
        )],
        recommendations: Vec::new(),
    }
}
