use async_trait::async_trait;

use super::{
    contains_any, first_match, verdict_from_findings, AssessmentError, Assessor, CONSENT_TERMS,
    PROHIBITED_TERMS,
};
use crate::verification::domain::{Component, Issue, Severity, Submission, Verdict};

const DEFAULT_MIN_DESCRIPTION_CHARS: usize = 40;

/// Checks the declared campaign purpose and the opt-in flow description.
#[derive(Debug, Clone)]
pub struct UseCaseAssessor {
    min_description_chars: usize,
}

impl UseCaseAssessor {
    pub fn new(min_description_chars: usize) -> Self {
        Self {
            min_description_chars,
        }
    }
}

impl Default for UseCaseAssessor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DESCRIPTION_CHARS)
    }
}

#[async_trait]
impl Assessor for UseCaseAssessor {
    fn component(&self) -> Component {
        Component::UseCase
    }

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError> {
        let use_case = &submission.use_case;
        let mut issues = Vec::new();

        let description = use_case.description.trim();
        if description.is_empty() {
            issues.push(Issue::new(
                Severity::Critical,
                "campaign description is missing",
                "Describe who receives messages and what the messages contain",
            ));
        } else if description.chars().count() < self.min_description_chars {
            issues.push(Issue::new(
                Severity::Major,
                format!(
                    "campaign description is too brief ({} characters)",
                    description.chars().count()
                ),
                format!(
                    "Expand the description to at least {} characters covering audience, content and frequency",
                    self.min_description_chars
                ),
            ));
        }

        let flow = use_case.message_flow.trim();
        if flow.is_empty() {
            issues.push(Issue::new(
                Severity::Critical,
                "opt-in message flow is missing",
                "Explain step by step how subscribers opt in to receive messages",
            ));
        } else if !contains_any(flow, CONSENT_TERMS) {
            issues.push(Issue::new(
                Severity::Major,
                "opt-in message flow does not show explicit consent",
                "State how subscribers actively agree, e.g. an unchecked consent checkbox or keyword opt-in",
            ));
        }

        let declared = format!("{} {} {}", use_case.category, description, flow);
        if let Some(term) = first_match(&declared, PROHIBITED_TERMS) {
            issues.push(Issue::new(
                Severity::Critical,
                format!("use case references restricted content ({term})"),
                "Remove restricted content or register under an approved special use case",
            ));
        }

        if use_case
            .help_message
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            issues.push(Issue::new(
                Severity::Minor,
                "HELP response is not provided",
                "Add a HELP reply containing the brand name and a support contact",
            ));
        }

        if use_case
            .opt_out_message
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            issues.push(Issue::new(
                Severity::Minor,
                "opt-out confirmation is not provided",
                "Add a STOP confirmation reply stating no further messages will be sent",
            ));
        }

        Ok(verdict_from_findings(issues, Vec::new()))
    }
}
