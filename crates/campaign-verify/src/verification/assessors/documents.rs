use async_trait::async_trait;

use super::{verdict_from_findings, AssessmentError, Assessor};
use crate::verification::domain::{
    Component, DocumentCategory, Issue, Severity, Submission, Verdict,
};

/// Checks supporting documents against the declared business identity.
#[derive(Debug, Clone, Default)]
pub struct DocumentsAssessor;

#[async_trait]
impl Assessor for DocumentsAssessor {
    fn component(&self) -> Component {
        Component::Documents
    }

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError> {
        if !submission.has_documents() {
            return Ok(Verdict::absent());
        }

        let mut issues = Vec::new();

        for document in &submission.documents {
            let unreadable = document
                .extracted_text
                .as_deref()
                .map(|text| text.trim().is_empty())
                .unwrap_or(true);
            if unreadable {
                issues.push(Issue::new(
                    Severity::Minor,
                    format!("document '{}' could not be read", document.name),
                    "Upload a text-searchable PDF or a higher resolution scan",
                ));
            }
        }

        let registrations: Vec<_> = submission
            .documents
            .iter()
            .filter(|document| {
                matches!(
                    document.category,
                    DocumentCategory::BusinessRegistration | DocumentCategory::TaxRegistration
                )
            })
            .collect();

        if registrations.is_empty() {
            issues.push(Issue::new(
                Severity::Major,
                "no business registration document was provided",
                "Upload articles of incorporation or a tax registration letter",
            ));
        } else {
            let legal_name = submission.business.legal_name.trim().to_ascii_lowercase();
            let name_matches = !legal_name.is_empty()
                && registrations
                    .iter()
                    .filter_map(|document| document.extracted_text.as_deref())
                    .any(|text| text.to_ascii_lowercase().contains(&legal_name));
            if !name_matches {
                issues.push(Issue::new(
                    Severity::Major,
                    "registration documents do not match the legal business name",
                    format!(
                        "Ensure the registered legal name \"{}\" appears on the uploaded registration",
                        submission.business.legal_name.trim()
                    ),
                ));
            }
        }

        Ok(verdict_from_findings(issues, Vec::new()))
    }
}
