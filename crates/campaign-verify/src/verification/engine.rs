use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::accumulator::WorkflowState;
use super::assessors::{validate_verdict, AssessmentError, AssessorRegistry};
use super::domain::{
    error_codes, Component, ErrorDetail, Submission, SubmissionId, SubmissionStatus,
    Verification, VerificationId, VerificationStatus, Verdict, PLANNING_STEP, REPORTING_STEP,
};
use super::planner::{Plan, Planner, PlanningError, RulePlanner};
use super::report::{ComplianceReport, ReportSynthesizer};
use super::repository::{ProgressStore, ReportStore, RepositoryError, SubmissionStore};
use crate::config::VerificationConfig;

/// Progress reported once the run is live, before planning completes.
pub const STARTED_PROGRESS: u8 = 5;
const ASSESSMENT_SPAN: u32 = 90;

/// Timing knobs for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub assessor_timeout: Duration,
    pub planner_timeout: Duration,
    pub estimated_duration: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            assessor_timeout: Duration::from_secs(30),
            planner_timeout: Duration::from_secs(15),
            estimated_duration: Duration::from_secs(120),
        }
    }
}

impl From<&VerificationConfig> for EngineSettings {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            assessor_timeout: Duration::from_secs(config.assessor_timeout_secs),
            planner_timeout: Duration::from_secs(config.planner_timeout_secs),
            estimated_duration: Duration::from_secs(config.estimated_completion_secs),
        }
    }
}

/// Error raised by the verification engine.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] RepositoryError),
}

enum RunOutcome {
    Completed(ComplianceReport),
    /// Another writer moved the record to a terminal state first.
    Superseded,
}

/// Progress after `completed` of `total` steps: `floor(5 + 90 * completed / total)`.
pub fn step_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return STARTED_PROGRESS + ASSESSMENT_SPAN as u8;
    }
    let completed = completed.min(total) as u32;
    (u32::from(STARTED_PROGRESS) + ASSESSMENT_SPAN * completed / total as u32) as u8
}

/// Orchestrates verification runs: plans, drives assessors in a background task,
/// records progress, and synthesizes the final report.
pub struct WorkflowEngine<P, S, R> {
    planner: Arc<dyn Planner>,
    fallback_planner: Arc<dyn Planner>,
    assessors: AssessorRegistry,
    progress: Arc<P>,
    submissions: Arc<S>,
    reports: Arc<R>,
    synthesizer: ReportSynthesizer,
    settings: EngineSettings,
    active_runs: Mutex<HashMap<VerificationId, watch::Sender<bool>>>,
}

impl<P, S, R> WorkflowEngine<P, S, R>
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    pub fn new(
        planner: Arc<dyn Planner>,
        assessors: AssessorRegistry,
        progress: Arc<P>,
        submissions: Arc<S>,
        reports: Arc<R>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            planner,
            fallback_planner: Arc::new(RulePlanner),
            assessors,
            progress,
            submissions,
            reports,
            synthesizer: ReportSynthesizer::default(),
            settings,
            active_runs: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the planner consulted when the primary planner fails.
    pub fn with_fallback_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.fallback_planner = planner;
        self
    }

    /// Create a PENDING verification and schedule its run. Returns without waiting
    /// for any assessment.
    pub async fn start(
        self: &Arc<Self>,
        submission_id: &SubmissionId,
    ) -> Result<Verification, VerificationError> {
        let submission = match self.submissions.begin_verification(submission_id).await {
            Ok(submission) => submission,
            Err(RepositoryError::NotFound) => {
                return Err(VerificationError::NotFound(format!(
                    "submission {submission_id}"
                )))
            }
            Err(RepositoryError::Conflict) => {
                return Err(VerificationError::InvalidState(format!(
                    "submission {submission_id} is already being verified"
                )))
            }
            Err(store_error) => return Err(store_error.into()),
        };

        let started_at = Utc::now();
        let estimate = chrono::Duration::from_std(self.settings.estimated_duration)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let verification = Verification::pending(&submission, started_at, started_at + estimate);

        if let Err(store_error) = self.progress.save(verification.clone()).await {
            self.revert_submission(&verification).await;
            return Err(store_error.into());
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(verification.id.clone(), cancel_tx);

        info!(
            verification_id = %verification.id,
            submission_id = %submission_id,
            "verification scheduled"
        );

        let engine = Arc::clone(self);
        let run = verification.clone();
        tokio::spawn(async move {
            engine.execute(run, submission, cancel_rx).await;
        });

        Ok(verification)
    }

    pub async fn status(&self, id: &VerificationId) -> Result<Verification, VerificationError> {
        self.progress
            .get(id)
            .await?
            .ok_or_else(|| VerificationError::NotFound(format!("verification {id}")))
    }

    /// Fail a non-terminal verification with `cancelled_by_user` and stop its run.
    pub async fn cancel(&self, id: &VerificationId) -> Result<Verification, VerificationError> {
        let mut verification = self.status(id).await?;
        if verification.status.is_terminal() {
            return Err(VerificationError::InvalidState(format!(
                "verification {id} is already {}",
                verification.status.label()
            )));
        }

        verification.fail(
            error_codes::CANCELLED_BY_USER,
            "Verification was cancelled by the user",
            Vec::new(),
            Utc::now(),
        );

        if !self
            .progress
            .save_unless_terminal(verification.clone())
            .await?
        {
            return Err(VerificationError::InvalidState(format!(
                "verification {id} finished before it could be cancelled"
            )));
        }

        self.signal_cancel(id);
        self.revert_submission(&verification).await;
        info!(verification_id = %id, "verification cancelled");

        Ok(verification)
    }

    /// Latest report for a submission whose verification completed.
    pub async fn report(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<ComplianceReport, VerificationError> {
        if self.submissions.get(submission_id).await?.is_none() {
            return Err(VerificationError::NotFound(format!(
                "submission {submission_id}"
            )));
        }

        let report = self
            .reports
            .get_by_submission(submission_id)
            .await?
            .ok_or_else(|| {
                VerificationError::InvalidState(format!(
                    "submission {submission_id} has no completed verification"
                ))
            })?;

        let completed = self
            .progress
            .get(&report.verification_id)
            .await?
            .map(|verification| verification.status == VerificationStatus::Completed)
            .unwrap_or(false);
        if !completed {
            return Err(VerificationError::InvalidState(format!(
                "latest verification of submission {submission_id} did not complete"
            )));
        }

        Ok(report)
    }

    /// Whether a background run is still registered for the verification.
    pub fn is_running(&self, id: &VerificationId) -> bool {
        self.active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    async fn execute(
        self: Arc<Self>,
        mut verification: Verification,
        submission: Submission,
        mut cancel: watch::Receiver<bool>,
    ) {
        let id = verification.id.clone();

        match self.run(&mut verification, &submission, &mut cancel).await {
            Ok(RunOutcome::Completed(report)) => info!(
                verification_id = %id,
                overall_score = report.overall_score,
                likelihood = report.approval_likelihood.label(),
                "verification completed"
            ),
            Ok(RunOutcome::Superseded) => info!(
                verification_id = %id,
                "verification run stopped; record already terminal"
            ),
            Err(run_error) => {
                error!(verification_id = %id, error = %run_error, "verification failed");
                self.fail_run(verification, &run_error).await;
            }
        }

        self.active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    async fn run(
        &self,
        verification: &mut Verification,
        submission: &Submission,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunOutcome, VerificationError> {
        verification.status = VerificationStatus::Running;
        verification.advance(STARTED_PROGRESS, PLANNING_STEP);
        if !self.persist(verification).await? {
            return Ok(RunOutcome::Superseded);
        }

        let plan = match until_cancelled(cancel, self.resolve_plan(submission)).await {
            Some(plan) => plan?,
            None => return Ok(RunOutcome::Superseded),
        };
        info!(
            verification_id = %verification.id,
            steps = ?plan.components(),
            analysis = %plan.analysis,
            "verification plan ready"
        );

        let total = plan.len();
        let mut state = WorkflowState::new();

        for (index, step) in plan.steps.iter().enumerate() {
            let component = step.component;
            verification.advance(step_progress(index, total), component.label());
            if !self.persist(verification).await? {
                return Ok(RunOutcome::Superseded);
            }

            let outcome = match until_cancelled(cancel, self.assess(component, submission)).await
            {
                Some(outcome) => outcome,
                None => return Ok(RunOutcome::Superseded),
            };

            match outcome {
                Ok(verdict) => {
                    debug!(
                        verification_id = %verification.id,
                        component = component.label(),
                        score = ?verdict.score,
                        "assessment merged"
                    );
                    state.merge(component, &verdict);
                }
                Err(assessment_error) => {
                    warn!(
                        verification_id = %verification.id,
                        component = component.label(),
                        error = %assessment_error,
                        "assessment failed; recording zero score"
                    );
                    state.record_failure(component, &assessment_error);
                }
            }

            verification.advance(step_progress(index + 1, total), component.label());
            verification.mark_step_completed(component);
            if !self.persist(verification).await? {
                return Ok(RunOutcome::Superseded);
            }
        }

        verification.advance(verification.progress, REPORTING_STEP);
        let report =
            self.synthesizer
                .synthesize(&state, &verification.id, &submission.id, Utc::now());

        let already_terminal = self
            .progress
            .get(&verification.id)
            .await?
            .map(|stored| stored.status.is_terminal())
            .unwrap_or(false);
        if already_terminal || *cancel.borrow() {
            return Ok(RunOutcome::Superseded);
        }

        self.reports.save(report.clone()).await?;

        verification.complete(Utc::now());
        if !self.persist(verification).await? {
            warn!(
                verification_id = %verification.id,
                "report generated but verification was cancelled before completion"
            );
            return Ok(RunOutcome::Superseded);
        }

        if let Err(store_error) = self
            .submissions
            .update_status(
                &submission.id,
                SubmissionStatus::Verified,
                Some(report.rounded_score()),
            )
            .await
        {
            error!(
                submission_id = %submission.id,
                error = %store_error,
                "failed to record compliance score on submission"
            );
        }

        Ok(RunOutcome::Completed(report))
    }

    /// Primary plan, else the fallback plan; fatal only when both fail.
    async fn resolve_plan(&self, submission: &Submission) -> Result<Plan, VerificationError> {
        match self.plan_with(self.planner.as_ref(), submission).await {
            Ok(plan) => return Ok(plan),
            Err(planning_error) => warn!(
                submission_id = %submission.id,
                error = %planning_error,
                "planner failed; using fallback plan"
            ),
        }

        self.plan_with(self.fallback_planner.as_ref(), submission)
            .await
            .map_err(VerificationError::from)
    }

    async fn plan_with(
        &self,
        planner: &dyn Planner,
        submission: &Submission,
    ) -> Result<Plan, PlanningError> {
        let limit = self.settings.planner_timeout;
        let draft = timeout(limit, planner.plan(submission))
            .await
            .map_err(|_| PlanningError::Timeout(limit.as_secs()))??;
        Plan::from_draft(draft)
    }

    async fn assess(
        &self,
        component: Component,
        submission: &Submission,
    ) -> Result<Verdict, AssessmentError> {
        let assessor = self.assessors.for_component(component);
        let limit = self.settings.assessor_timeout;
        let verdict = timeout(limit, assessor.assess(submission))
            .await
            .map_err(|_| AssessmentError::Timeout(limit.as_secs()))??;
        validate_verdict(&verdict)?;
        Ok(verdict)
    }

    async fn persist(&self, verification: &Verification) -> Result<bool, VerificationError> {
        Ok(self
            .progress
            .save_unless_terminal(verification.clone())
            .await?)
    }

    async fn fail_run(&self, mut verification: Verification, run_error: &VerificationError) {
        let (code, details) = match run_error {
            VerificationError::Planning(_) => (
                error_codes::PLANNING_FAILED,
                vec![ErrorDetail {
                    issue: "The assessments for this submission could not be planned".to_string(),
                    suggestion: "Retry the verification; if it keeps failing, review the submission's use case and messages".to_string(),
                }],
            ),
            _ => (
                error_codes::PERSISTENCE_FAILED,
                vec![ErrorDetail {
                    issue: "Verification progress could not be saved".to_string(),
                    suggestion: "Retry the verification once storage is available".to_string(),
                }],
            ),
        };

        verification.fail(code, run_error.to_string(), details, Utc::now());

        match self.progress.save_unless_terminal(verification.clone()).await {
            Ok(true) => self.revert_submission(&verification).await,
            Ok(false) => debug!(
                verification_id = %verification.id,
                "failure not recorded; verification already terminal"
            ),
            Err(store_error) => {
                error!(
                    verification_id = %verification.id,
                    error = %store_error,
                    "failed to record verification failure"
                );
                self.revert_submission(&verification).await;
            }
        }
    }

    async fn revert_submission(&self, verification: &Verification) {
        if let Err(store_error) = self
            .submissions
            .update_status(
                &verification.submission_id,
                verification.prior_submission_status,
                None,
            )
            .await
        {
            error!(
                submission_id = %verification.submission_id,
                error = %store_error,
                "failed to revert submission status"
            );
        }
    }

    fn signal_cancel(&self, id: &VerificationId) {
        let runs = self
            .active_runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = runs.get(id) {
            let _ = sender.send(true);
        }
    }
}

/// Drive `work` unless cancellation is signalled first, in which case `None`.
async fn until_cancelled<F>(cancel: &mut watch::Receiver<bool>, work: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancellation(cancel) => None,
        output = work => Some(output),
    }
}

async fn cancellation(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
