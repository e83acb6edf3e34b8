//! Campaign verification: planning, assessment orchestration, and report synthesis.
//!
//! [`WorkflowEngine::start`] records a PENDING [`Verification`] and hands the run to a
//! background task. The task plans the relevant components, drives one [`Assessor`]
//! per step, folds each verdict into a [`WorkflowState`], and finally writes a
//! [`ComplianceReport`]. Callers poll [`WorkflowEngine::status`] for progress.

pub mod accumulator;
pub mod assessors;
pub mod domain;
pub mod engine;
pub mod memory;
pub mod planner;
pub mod report;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use accumulator::{CriticalIssue, RecommendationEntry, WorkflowState};
pub use assessors::{
    AssessmentError, Assessor, AssessorRegistry, DocumentsAssessor, ImagesAssessor,
    MessagesAssessor, PageFetcher, UseCaseAssessor, WebsiteAssessor,
};
pub use domain::{
    ApprovalLikelihood, BusinessProfile, CampaignUseCase, Component, DocumentCategory,
    ErrorDetail, Issue, OptInImage, Priority, Recommendation, Severity, Submission,
    SubmissionId, SubmissionStatus, SupportingDocument, Verdict, Verification,
    VerificationId, VerificationStatus, WebsiteSnapshot,
};
pub use engine::{EngineSettings, VerificationError, WorkflowEngine};
pub use memory::{InMemoryProgressStore, InMemoryReportStore, InMemorySubmissionStore};
pub use planner::{DraftStep, Plan, PlanDraft, PlanStep, Planner, PlanningError, RulePlanner};
pub use report::{ComplianceReport, ReportSynthesizer, ScoringPolicy};
pub use repository::{ProgressStore, ReportStore, RepositoryError, SubmissionStore};
pub use router::verification_router;
