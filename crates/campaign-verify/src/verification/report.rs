use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accumulator::{CriticalIssue, RecommendationEntry, WorkflowState};
use super::domain::{ApprovalLikelihood, Component, SubmissionId, VerificationId};

/// Identifier wrapper for generated reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

impl ReportId {
    pub fn generate() -> Self {
        Self(format!("rpt-{}", Uuid::new_v4().simple()))
    }
}

/// Relative weight of each component in the overall score.
pub const COMPONENT_WEIGHTS: [(Component, f64); 5] = [
    (Component::UseCase, 0.25),
    (Component::Messages, 0.25),
    (Component::Images, 0.20),
    (Component::Website, 0.20),
    (Component::Documents, 0.10),
];

/// Minimum overall score for a `High` approval likelihood.
pub const HIGH_LIKELIHOOD_THRESHOLD: f64 = 85.0;
/// Minimum overall score for a `Medium` approval likelihood.
pub const MEDIUM_LIKELIHOOD_THRESHOLD: f64 = 65.0;

pub const NO_ASSESSABLE_CONTENT: &str = "no assessable content";

/// Policy dial backing report synthesis. `Default` is the production table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    weights: BTreeMap<Component, f64>,
    high_threshold: f64,
    medium_threshold: f64,
}

impl ScoringPolicy {
    pub fn new(weights: BTreeMap<Component, f64>, high_threshold: f64, medium_threshold: f64) -> Self {
        Self {
            weights,
            high_threshold,
            medium_threshold,
        }
    }

    pub fn weight(&self, component: Component) -> f64 {
        self.weights.get(&component).copied().unwrap_or(0.0)
    }

    pub fn likelihood(&self, score: f64) -> ApprovalLikelihood {
        if score >= self.high_threshold {
            ApprovalLikelihood::High
        } else if score >= self.medium_threshold {
            ApprovalLikelihood::Medium
        } else {
            ApprovalLikelihood::Low
        }
    }
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::new(
            COMPONENT_WEIGHTS.into_iter().collect(),
            HIGH_LIKELIHOOD_THRESHOLD,
            MEDIUM_LIKELIHOOD_THRESHOLD,
        )
    }
}

/// Final, immutable synthesis of a completed verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub id: ReportId,
    pub verification_id: VerificationId,
    pub submission_id: SubmissionId,
    pub overall_score: f64,
    pub approval_likelihood: ApprovalLikelihood,
    pub component_scores: BTreeMap<Component, Option<u8>>,
    pub critical_issues: Vec<CriticalIssue>,
    pub recommendations: Vec<RecommendationEntry>,
    pub generated_at: DateTime<Utc>,
}

impl ComplianceReport {
    /// Overall score rounded for the submission record.
    pub fn rounded_score(&self) -> u8 {
        self.overall_score.round().clamp(0.0, 100.0) as u8
    }
}

/// Stateless synthesizer applying a scoring policy to an accumulator.
#[derive(Debug, Clone, Default)]
pub struct ReportSynthesizer {
    policy: ScoringPolicy,
}

impl ReportSynthesizer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    /// Weighted average over the components that produced a score. Absent components
    /// carry no weight; `None` when nothing was assessable.
    pub fn weighted_score(&self, state: &WorkflowState) -> Option<f64> {
        let (total_score, total_weight) = state
            .component_scores
            .iter()
            .filter_map(|(component, score)| score.map(|score| (*component, score)))
            .fold((0.0_f64, 0.0_f64), |(total, weight), (component, score)| {
                let component_weight = self.policy.weight(component);
                (
                    total + f64::from(score) * component_weight,
                    weight + component_weight,
                )
            });

        if total_weight > 0.0 {
            Some(total_score / total_weight)
        } else {
            None
        }
    }

    pub fn synthesize(
        &self,
        state: &WorkflowState,
        verification_id: &VerificationId,
        submission_id: &SubmissionId,
        generated_at: DateTime<Utc>,
    ) -> ComplianceReport {
        let (overall_score, critical_issues) = match self.weighted_score(state) {
            Some(score) => (score, canonical_critical_issues(&state.critical_issues)),
            None => (
                0.0,
                vec![CriticalIssue {
                    component: None,
                    description: NO_ASSESSABLE_CONTENT.to_string(),
                    recommendation:
                        "Provide a use case, sample messages, or other material that can be assessed"
                            .to_string(),
                }],
            ),
        };

        ComplianceReport {
            id: ReportId::generate(),
            verification_id: verification_id.clone(),
            submission_id: submission_id.clone(),
            overall_score,
            approval_likelihood: self.policy.likelihood(overall_score),
            component_scores: state.component_scores.clone(),
            critical_issues,
            recommendations: canonical_recommendations(&state.recommendations),
            generated_at,
        }
    }
}

// Stable sorts keep per-component insertion order while removing any dependence on
// the order components were merged in.
fn canonical_critical_issues(issues: &[CriticalIssue]) -> Vec<CriticalIssue> {
    let mut ordered = issues.to_vec();
    ordered.sort_by_key(|issue| issue.component);
    ordered
}

fn canonical_recommendations(entries: &[RecommendationEntry]) -> Vec<RecommendationEntry> {
    let mut ordered = entries.to_vec();
    ordered.sort_by_key(|entry| (entry.priority, entry.component));
    ordered
}
