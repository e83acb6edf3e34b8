//! In-memory stores for development, the demo command and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::domain::{Submission, SubmissionId, SubmissionStatus, Verification, VerificationId};
use super::report::ComplianceReport;
use super::repository::{ProgressStore, ReportStore, RepositoryError, SubmissionStore};

#[derive(Debug, Default, Clone)]
pub struct InMemoryProgressStore {
    records: Arc<RwLock<HashMap<VerificationId, Verification>>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get(&self, id: &VerificationId) -> Result<Option<Verification>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn save(&self, verification: Verification) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(verification.id.clone(), verification);
        Ok(())
    }

    async fn save_unless_terminal(
        &self,
        verification: Verification,
    ) -> Result<bool, RepositoryError> {
        let mut records = self.records.write().await;
        if records
            .get(&verification.id)
            .map(|stored| stored.status.is_terminal())
            .unwrap_or(false)
        {
            return Ok(false);
        }
        records.insert(verification.id.clone(), verification);
        Ok(true)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySubmissionStore {
    submissions: Arc<RwLock<HashMap<SubmissionId, Submission>>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        if submissions.contains_key(&submission.id) {
            return Err(RepositoryError::Conflict);
        }
        submissions.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        let submissions = self.submissions.read().await;
        Ok(submissions.get(id).cloned())
    }

    async fn begin_verification(&self, id: &SubmissionId) -> Result<Submission, RepositoryError> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if submission.status == SubmissionStatus::Verifying {
            return Err(RepositoryError::Conflict);
        }
        let prior = submission.clone();
        submission.status = SubmissionStatus::Verifying;
        Ok(prior)
    }

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        compliance_score: Option<u8>,
    ) -> Result<(), RepositoryError> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions.get_mut(id).ok_or(RepositoryError::NotFound)?;
        submission.status = status;
        if compliance_score.is_some() {
            submission.compliance_score = compliance_score;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<SubmissionId, Vec<ComplianceReport>>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history(&self, submission_id: &SubmissionId) -> Vec<ComplianceReport> {
        let reports = self.reports.read().await;
        reports.get(submission_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save(&self, report: ComplianceReport) -> Result<(), RepositoryError> {
        let mut reports = self.reports.write().await;
        reports
            .entry(report.submission_id.clone())
            .or_default()
            .push(report);
        Ok(())
    }

    async fn get_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<ComplianceReport>, RepositoryError> {
        let reports = self.reports.read().await;
        Ok(reports
            .get(submission_id)
            .and_then(|history| history.last())
            .cloned())
    }
}
