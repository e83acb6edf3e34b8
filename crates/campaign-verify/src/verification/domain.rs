use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for campaign submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for verification runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationId(pub String);

impl VerificationId {
    pub fn generate() -> Self {
        Self(format!("ver-{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for VerificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of compliance components a submission is assessed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    UseCase,
    Messages,
    Images,
    Website,
    Documents,
}

impl Component {
    pub const fn ordered() -> [Component; 5] {
        [
            Component::UseCase,
            Component::Messages,
            Component::Images,
            Component::Website,
            Component::Documents,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Component::UseCase => "use_case",
            Component::Messages => "messages",
            Component::Images => "images",
            Component::Website => "website",
            Component::Documents => "documents",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raised when a planner names a component outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown compliance component '{0}'")]
pub struct UnknownComponent(pub String);

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "use_case" | "usecase" => Ok(Component::UseCase),
            "messages" | "sample_messages" => Ok(Component::Messages),
            "images" | "opt_in_images" => Ok(Component::Images),
            "website" => Ok(Component::Website),
            "documents" | "supporting_documents" => Ok(Component::Documents),
            _ => Err(UnknownComponent(value.to_string())),
        }
    }
}

/// Severity attached to an assessor finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub const fn priority(self) -> Priority {
        match self {
            Severity::Critical => Priority::High,
            Severity::Major => Priority::Medium,
            Severity::Minor => Priority::Low,
        }
    }
}

/// Ordering hint shared by plan steps and recommendations; `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A single finding raised by an assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

impl Issue {
    pub fn new(
        severity: Severity,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            description: description.into(),
            recommendation: recommendation.into(),
        }
    }
}

/// Suggested change returned alongside a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub description: String,
    pub action: String,
}

/// Structured result of one assessor call. `score == None` marks the component as
/// not applicable to the submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: Option<u8>,
    pub compliant: bool,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
}

impl Verdict {
    pub fn absent() -> Self {
        Self {
            score: None,
            compliant: true,
            issues: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.score.is_none()
    }
}

/// Lifecycle status of the submission as owned by the calling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Verifying,
    Verified,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Verifying => "verifying",
            SubmissionStatus::Verified => "verified",
        }
    }
}

/// Brand identity the campaign is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub legal_name: String,
    pub brand_name: String,
    pub vertical: String,
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// Declared campaign purpose and the consent flow subscribers go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignUseCase {
    pub category: String,
    pub description: String,
    pub message_flow: String,
    #[serde(default)]
    pub help_message: Option<String>,
    #[serde(default)]
    pub opt_out_message: Option<String>,
}

/// Screenshot or photo proving the opt-in experience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptInImage {
    pub name: String,
    pub storage_key: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    BusinessRegistration,
    TaxRegistration,
    PrivacyPolicy,
    Misc,
}

/// Supporting document uploaded with the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub name: String,
    pub category: DocumentCategory,
    pub storage_key: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// Public web presence declared for the brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteSnapshot {
    pub url: String,
    #[serde(default)]
    pub privacy_policy_url: Option<String>,
    #[serde(default)]
    pub terms_url: Option<String>,
}

/// Campaign submission as read by planners and assessors. Never mutated during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub status: SubmissionStatus,
    pub business: BusinessProfile,
    pub use_case: CampaignUseCase,
    #[serde(default)]
    pub sample_messages: Vec<String>,
    #[serde(default)]
    pub opt_in_images: Vec<OptInImage>,
    #[serde(default)]
    pub documents: Vec<SupportingDocument>,
    #[serde(default)]
    pub website: Option<WebsiteSnapshot>,
    #[serde(default)]
    pub compliance_score: Option<u8>,
}

impl Submission {
    pub fn has_images(&self) -> bool {
        !self.opt_in_images.is_empty()
    }

    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }

    pub fn has_website(&self) -> bool {
        self.website
            .as_ref()
            .map(|site| !site.url.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Status of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl VerificationStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            VerificationStatus::Completed | VerificationStatus::Failed
        )
    }

    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Running => "running",
            VerificationStatus::Completed => "completed",
            VerificationStatus::Failed => "failed",
        }
    }
}

pub const PLANNING_STEP: &str = "planning";
pub const REPORTING_STEP: &str = "reporting";

/// Machine-readable failure codes carried on FAILED verifications.
pub mod error_codes {
    pub const CANCELLED_BY_USER: &str = "cancelled_by_user";
    pub const PLANNING_FAILED: &str = "planning_failed";
    pub const PERSISTENCE_FAILED: &str = "persistence_failed";
}

/// UI-facing explanation attached to a failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub issue: String,
    pub suggestion: String,
}

/// Client-visible record of one verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: VerificationId,
    pub submission_id: SubmissionId,
    pub status: VerificationStatus,
    pub progress: u8,
    pub current_step: String,
    pub completed_steps: Vec<Component>,
    pub estimated_completion_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<ErrorDetail>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub prior_submission_status: SubmissionStatus,
}

impl Verification {
    pub fn pending(
        submission: &Submission,
        started_at: DateTime<Utc>,
        estimated_completion_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: VerificationId::generate(),
            submission_id: submission.id.clone(),
            status: VerificationStatus::Pending,
            progress: 0,
            current_step: PLANNING_STEP.to_string(),
            completed_steps: Vec::new(),
            estimated_completion_time,
            error_code: None,
            error_message: None,
            error_details: Vec::new(),
            started_at,
            completed_at: None,
            prior_submission_status: submission.status,
        }
    }

    /// Raise progress, never lowering it.
    pub fn advance(&mut self, progress: u8, current_step: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.current_step = current_step.into();
    }

    /// Append a finished component once.
    pub fn mark_step_completed(&mut self, component: Component) {
        if !self.completed_steps.contains(&component) {
            self.completed_steps.push(component);
        }
    }

    pub fn complete(&mut self, completed_at: DateTime<Utc>) {
        self.status = VerificationStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(completed_at);
    }

    pub fn fail(
        &mut self,
        code: &str,
        message: impl Into<String>,
        details: Vec<ErrorDetail>,
        completed_at: DateTime<Utc>,
    ) {
        self.status = VerificationStatus::Failed;
        self.error_code = Some(code.to_string());
        self.error_message = Some(message.into());
        self.error_details = details;
        self.completed_at = Some(completed_at);
    }
}

/// Approval likelihood bucket derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalLikelihood {
    High,
    Medium,
    Low,
}

impl ApprovalLikelihood {
    pub const fn label(self) -> &'static str {
        match self {
            ApprovalLikelihood::High => "high",
            ApprovalLikelihood::Medium => "medium",
            ApprovalLikelihood::Low => "low",
        }
    }
}
