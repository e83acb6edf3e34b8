use async_trait::async_trait;

use super::{contains_any, verdict_from_findings, AssessmentError, Assessor, CONSENT_TERMS, OPT_OUT_TERMS};
use crate::verification::domain::{Component, Issue, Severity, Submission, Verdict};

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// Checks opt-in screenshots for visible consent and opt-out disclosures.
#[derive(Debug, Clone, Default)]
pub struct ImagesAssessor;

#[async_trait]
impl Assessor for ImagesAssessor {
    fn component(&self) -> Component {
        Component::Images
    }

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError> {
        if !submission.has_images() {
            return Ok(Verdict::absent());
        }

        let mut issues = Vec::new();
        let mut readable = Vec::new();

        for image in &submission.opt_in_images {
            let extension = image
                .name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .unwrap_or_default();
            if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
                issues.push(Issue::new(
                    Severity::Minor,
                    format!("image '{}' is not a supported image format", image.name),
                    "Upload opt-in screenshots as PNG, JPEG, WEBP or GIF",
                ));
            }

            match image.extracted_text.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => readable.push(text),
                _ => issues.push(Issue::new(
                    Severity::Minor,
                    format!("no readable text found in image '{}'", image.name),
                    "Upload a clearer screenshot where the opt-in wording is legible",
                )),
            }
        }

        if !readable.iter().any(|text| contains_any(text, CONSENT_TERMS)) {
            issues.push(Issue::new(
                Severity::Major,
                "opt-in images do not show consent language",
                "Show the consent checkbox or keyword opt-in wording in the screenshot",
            ));
        }

        if !readable.iter().any(|text| contains_any(text, OPT_OUT_TERMS)) {
            issues.push(Issue::new(
                Severity::Major,
                "opt-in images do not disclose how to opt out",
                "Include \"Reply STOP to opt out\" next to the opt-in control",
            ));
        }

        Ok(verdict_from_findings(issues, Vec::new()))
    }
}
