use async_trait::async_trait;

use super::domain::{Submission, SubmissionId, SubmissionStatus, Verification, VerificationId};
use super::report::ComplianceReport;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for verification records. Every method is atomic per record.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get(&self, id: &VerificationId) -> Result<Option<Verification>, RepositoryError>;

    async fn save(&self, verification: Verification) -> Result<(), RepositoryError>;

    /// Write the record unless the stored copy is already terminal. Returns whether
    /// the write applied; a missing record is treated as writable.
    async fn save_unless_terminal(
        &self,
        verification: Verification,
    ) -> Result<bool, RepositoryError>;
}

/// Read access to campaign submissions plus the status write-back used by the engine.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: Submission) -> Result<Submission, RepositoryError>;

    async fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;

    /// Atomically move the submission to `verifying`. Returns the submission as it
    /// stood before the claim, `Conflict` when it is already being verified, or
    /// `NotFound`.
    async fn begin_verification(&self, id: &SubmissionId) -> Result<Submission, RepositoryError>;

    async fn update_status(
        &self,
        id: &SubmissionId,
        status: SubmissionStatus,
        compliance_score: Option<u8>,
    ) -> Result<(), RepositoryError>;
}

/// Persistence for generated compliance reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: ComplianceReport) -> Result<(), RepositoryError>;

    /// Most recently saved report for the submission.
    async fn get_by_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<ComplianceReport>, RepositoryError>;
}
