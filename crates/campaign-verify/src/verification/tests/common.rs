use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::verification::assessors::{AssessmentError, Assessor, AssessorRegistry};
use crate::verification::domain::{
    BusinessProfile, CampaignUseCase, Component, DocumentCategory, Issue, OptInImage, Severity,
    Submission, SubmissionId, SubmissionStatus, SupportingDocument, Verdict, Verification,
    VerificationId, WebsiteSnapshot,
};
use crate::verification::engine::{EngineSettings, WorkflowEngine};
use crate::verification::memory::{
    InMemoryProgressStore, InMemoryReportStore, InMemorySubmissionStore,
};
use crate::verification::planner::{DraftStep, PlanDraft, Planner, PlanningError, RulePlanner};
use crate::verification::report::ComplianceReport;
use crate::verification::repository::{
    ProgressStore, ReportStore, RepositoryError, SubmissionStore,
};

pub(super) type MemoryEngine =
    WorkflowEngine<InMemoryProgressStore, InMemorySubmissionStore, InMemoryReportStore>;

pub(super) fn business() -> BusinessProfile {
    BusinessProfile {
        legal_name: "Harbor Dental Group LLC".to_string(),
        brand_name: "Harbor Dental".to_string(),
        vertical: "healthcare".to_string(),
        contact_email: Some("compliance@harbordental.example".to_string()),
    }
}

pub(super) fn use_case() -> CampaignUseCase {
    CampaignUseCase {
        category: "account_notification".to_string(),
        description: "Appointment reminders and rescheduling notices sent to existing patients of Harbor Dental".to_string(),
        message_flow: "Patients check the box on the intake form to consent to appointment texts".to_string(),
        help_message: Some("Harbor Dental: call 555-0100 for help. Reply STOP to opt out.".to_string()),
        opt_out_message: Some("Harbor Dental: you are unsubscribed and will receive no further messages.".to_string()),
    }
}

/// Submission with use case and messages only.
pub(super) fn minimal_submission() -> Submission {
    Submission {
        id: SubmissionId("sub-1001".to_string()),
        status: SubmissionStatus::Submitted,
        business: business(),
        use_case: use_case(),
        sample_messages: vec![
            "Harbor Dental: your cleaning is tomorrow at 9am. Reply HELP for help, STOP to opt out.".to_string(),
            "Harbor Dental: please confirm your appointment by replying YES.".to_string(),
        ],
        opt_in_images: Vec::new(),
        documents: Vec::new(),
        website: None,
        compliance_score: None,
    }
}

/// Submission carrying material for all five components.
pub(super) fn full_submission() -> Submission {
    Submission {
        id: SubmissionId("sub-2002".to_string()),
        opt_in_images: vec![OptInImage {
            name: "intake-form.png".to_string(),
            storage_key: "uploads/sub-2002/intake-form.png".to_string(),
            extracted_text: Some(
                "[ ] I agree to receive appointment texts. Reply STOP to opt out.".to_string(),
            ),
        }],
        documents: vec![SupportingDocument {
            name: "articles.pdf".to_string(),
            category: DocumentCategory::BusinessRegistration,
            storage_key: "uploads/sub-2002/articles.pdf".to_string(),
            extracted_text: Some("Articles of organization for Harbor Dental Group LLC".to_string()),
        }],
        website: Some(WebsiteSnapshot {
            url: "https://harbordental.example".to_string(),
            privacy_policy_url: Some("https://harbordental.example/privacy".to_string()),
            terms_url: Some("https://harbordental.example/terms".to_string()),
        }),
        ..minimal_submission()
    }
}

pub(super) fn fast_settings() -> EngineSettings {
    EngineSettings {
        assessor_timeout: Duration::from_millis(500),
        planner_timeout: Duration::from_millis(500),
        estimated_duration: Duration::from_secs(60),
    }
}

pub(super) fn scored(score: u8) -> Verdict {
    Verdict {
        score: Some(score),
        compliant: true,
        issues: Vec::new(),
        recommendations: Vec::new(),
    }
}

pub(super) fn critical_verdict(score: u8, description: &str) -> Verdict {
    Verdict {
        score: Some(score),
        compliant: false,
        issues: vec![Issue::new(Severity::Critical, description, "fix it")],
        recommendations: Vec::new(),
    }
}

/// Assessor returning a fixed verdict.
pub(super) struct FixedAssessor {
    pub(super) component: Component,
    pub(super) verdict: Verdict,
}

impl FixedAssessor {
    pub(super) fn arc(component: Component, verdict: Verdict) -> Arc<dyn Assessor> {
        Arc::new(Self { component, verdict })
    }
}

#[async_trait]
impl Assessor for FixedAssessor {
    fn component(&self) -> Component {
        self.component
    }

    async fn assess(&self, _submission: &Submission) -> Result<Verdict, AssessmentError> {
        Ok(self.verdict.clone())
    }
}

/// Assessor that always fails with an upstream error.
pub(super) struct FailingAssessor(pub(super) Component);

#[async_trait]
impl Assessor for FailingAssessor {
    fn component(&self) -> Component {
        self.0
    }

    async fn assess(&self, _submission: &Submission) -> Result<Verdict, AssessmentError> {
        Err(AssessmentError::Upstream("vision model unavailable".to_string()))
    }
}

/// Assessor that sleeps before returning a perfect score.
pub(super) struct SlowAssessor {
    pub(super) component: Component,
    pub(super) delay: Duration,
}

#[async_trait]
impl Assessor for SlowAssessor {
    fn component(&self) -> Component {
        self.component
    }

    async fn assess(&self, _submission: &Submission) -> Result<Verdict, AssessmentError> {
        tokio::time::sleep(self.delay).await;
        Ok(scored(100))
    }
}

/// Registry where every component returns the same fixed score.
pub(super) fn uniform_registry(score: u8) -> AssessorRegistry {
    Component::ordered()
        .into_iter()
        .fold(AssessorRegistry::rule_based(), |registry, component| {
            registry.with(FixedAssessor::arc(component, scored(score)))
        })
}

/// Planner that waits before delegating to the rule planner.
pub(super) struct DelayedPlanner {
    pub(super) delay: Duration,
}

#[async_trait]
impl Planner for DelayedPlanner {
    async fn plan(&self, submission: &Submission) -> Result<PlanDraft, PlanningError> {
        tokio::time::sleep(self.delay).await;
        RulePlanner.plan(submission).await
    }
}

/// Planner that always fails and counts how often it was consulted.
#[derive(Default)]
pub(super) struct FailingPlanner {
    pub(super) calls: AtomicUsize,
}

impl FailingPlanner {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for FailingPlanner {
    async fn plan(&self, _submission: &Submission) -> Result<PlanDraft, PlanningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PlanningError::Unreachable("connection refused".to_string()))
    }
}

/// Planner returning a fixed draft.
pub(super) struct ScriptedPlanner(pub(super) PlanDraft);

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _submission: &Submission) -> Result<PlanDraft, PlanningError> {
        Ok(self.0.clone())
    }
}

pub(super) fn draft_step(component: &str, priority: crate::verification::Priority) -> DraftStep {
    DraftStep {
        component: component.to_string(),
        priority,
        reason: String::new(),
    }
}

/// Progress store that refuses every write.
#[derive(Default)]
pub(super) struct UnavailableProgressStore;

#[async_trait]
impl ProgressStore for UnavailableProgressStore {
    async fn get(&self, _id: &VerificationId) -> Result<Option<Verification>, RepositoryError> {
        Err(RepositoryError::Unavailable("progress store offline".to_string()))
    }

    async fn save(&self, _verification: Verification) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("progress store offline".to_string()))
    }

    async fn save_unless_terminal(
        &self,
        _verification: Verification,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("progress store offline".to_string()))
    }
}

/// Submission store that yields to the scheduler before every call, like a remote store.
pub(super) struct YieldingSubmissionStore(pub(super) Arc<InMemorySubmissionStore>);

#[async_trait]
impl SubmissionStore for YieldingSubmissionStore {
    async fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        tokio::task::yield_now().await;
        self.0.insert(submission).await
    }

    async fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        tokio::task::yield_now().await;
        self.0.get(id).await
    }

    async fn begin_verification(&self, id: &SubmissionId) -> Result<Submission, RepositoryError> {
        tokio::task::yield_now().await;
        self.0.begin_verification(id).await
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        compliance_score: Option<u8>,
    ) -> Result<(), RepositoryError> {
        tokio::task::yield_now().await;
        self.0.update_status(id, status, compliance_score).await
    }
}

/// Submission store whose claim always fails; reads still work.
pub(super) struct UnclaimableSubmissionStore(pub(super) Arc<InMemorySubmissionStore>);

#[async_trait]
impl SubmissionStore for UnclaimableSubmissionStore {
    async fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        self.0.insert(submission).await
    }

    async fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        self.0.get(id).await
    }

    async fn begin_verification(&self, _id: &SubmissionId) -> Result<Submission, RepositoryError> {
        Err(RepositoryError::Unavailable("submission store offline".to_string()))
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        compliance_score: Option<u8>,
    ) -> Result<(), RepositoryError> {
        self.0.update_status(id, status, compliance_score).await
    }
}

/// Report store that refuses every write.
#[derive(Default)]
pub(super) struct UnavailableReportStore;

#[async_trait]
impl ReportStore for UnavailableReportStore {
    async fn save(&self, _report: ComplianceReport) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("report store offline".to_string()))
    }

    async fn get_by_submission(
        &self,
        _submission_id: &SubmissionId,
    ) -> Result<Option<ComplianceReport>, RepositoryError> {
        Ok(None)
    }
}

pub(super) struct Harness {
    pub(super) engine: Arc<MemoryEngine>,
    pub(super) progress: Arc<InMemoryProgressStore>,
    pub(super) submissions: Arc<InMemorySubmissionStore>,
    pub(super) reports: Arc<InMemoryReportStore>,
}

pub(super) async fn harness_with(
    planner: Arc<dyn Planner>,
    registry: AssessorRegistry,
    submission: Submission,
) -> Harness {
    let progress = Arc::new(InMemoryProgressStore::new());
    let submissions = Arc::new(InMemorySubmissionStore::new());
    let reports = Arc::new(InMemoryReportStore::new());
    submissions
        .insert(submission)
        .await
        .expect("submission inserted");

    let engine = Arc::new(WorkflowEngine::new(
        planner,
        registry,
        Arc::clone(&progress),
        Arc::clone(&submissions),
        Arc::clone(&reports),
        fast_settings(),
    ));

    Harness {
        engine,
        progress,
        submissions,
        reports,
    }
}

pub(super) async fn harness(submission: Submission) -> Harness {
    harness_with(
        Arc::new(RulePlanner),
        AssessorRegistry::rule_based(),
        submission,
    )
    .await
}

/// Poll until the verification is terminal, failing the test after two seconds.
pub(super) async fn wait_for_terminal(engine: &MemoryEngine, id: &VerificationId) -> Verification {
    for _ in 0..200 {
        let verification = engine.status(id).await.expect("status readable");
        if verification.status.is_terminal() {
            return verification;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("verification {id} did not finish");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json")
}
