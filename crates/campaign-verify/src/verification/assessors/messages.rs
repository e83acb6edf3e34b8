use async_trait::async_trait;

use super::{
    contains_any, first_match, verdict_from_findings, AssessmentError, Assessor, OPT_OUT_TERMS,
    PROHIBITED_TERMS,
};
use crate::verification::domain::{
    Component, Issue, Priority, Recommendation, Severity, Submission, Verdict,
};

const URL_SHORTENERS: &[&str] = &["bit.ly", "tinyurl.com", "goo.gl", "t.co/", "ow.ly", "is.gd"];
const MAX_SEGMENT_CHARS: usize = 320;

/// Checks sample messages for brand identification, opt-out language and content rules.
#[derive(Debug, Clone, Default)]
pub struct MessagesAssessor;

#[async_trait]
impl Assessor for MessagesAssessor {
    fn component(&self) -> Component {
        Component::Messages
    }

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError> {
        let samples: Vec<&str> = submission
            .sample_messages
            .iter()
            .map(|message| message.trim())
            .filter(|message| !message.is_empty())
            .collect();

        if samples.is_empty() {
            return Ok(verdict_from_findings(
                vec![Issue::new(
                    Severity::Critical,
                    "no sample messages were provided",
                    "Provide at least two representative sample messages",
                )],
                Vec::new(),
            ));
        }

        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if samples.len() < 2 {
            issues.push(Issue::new(
                Severity::Minor,
                "only one sample message was provided",
                "Provide at least two sample messages covering the campaign's content",
            ));
        }

        let brand = submission.business.brand_name.trim().to_ascii_lowercase();
        if !brand.is_empty()
            && !samples
                .iter()
                .any(|sample| sample.to_ascii_lowercase().contains(&brand))
        {
            issues.push(Issue::new(
                Severity::Major,
                "sample messages do not identify the brand",
                format!("Start messages with the brand name, e.g. \"{}: ...\"", submission.business.brand_name.trim()),
            ));
        }

        if !samples.iter().any(|sample| contains_any(sample, OPT_OUT_TERMS)) {
            issues.push(Issue::new(
                Severity::Major,
                "no sample message discloses opt-out instructions",
                "Append \"Reply STOP to opt out\" to at least the first message",
            ));
        }

        for (index, sample) in samples.iter().enumerate() {
            let position = index + 1;

            if let Some(shortener) = first_match(sample, URL_SHORTENERS) {
                issues.push(Issue::new(
                    Severity::Major,
                    format!("sample message {position} uses a public URL shortener ({shortener})"),
                    "Use a branded domain or a dedicated short link instead of public shorteners",
                ));
            }

            if let Some(term) = first_match(sample, PROHIBITED_TERMS) {
                issues.push(Issue::new(
                    Severity::Critical,
                    format!("sample message {position} references restricted content ({term})"),
                    "Remove restricted content from the campaign messages",
                ));
            }

            if sample.chars().count() > MAX_SEGMENT_CHARS {
                issues.push(Issue::new(
                    Severity::Minor,
                    format!("sample message {position} exceeds {MAX_SEGMENT_CHARS} characters"),
                    "Shorten the message to avoid multi-part delivery",
                ));
            }
        }

        if !samples
            .iter()
            .any(|sample| sample.to_ascii_lowercase().contains("help"))
        {
            recommendations.push(Recommendation {
                priority: Priority::Low,
                description: "sample messages do not mention HELP".to_string(),
                action: "Mention \"Reply HELP for help\" in the opt-in confirmation".to_string(),
            });
        }

        Ok(verdict_from_findings(issues, recommendations))
    }
}
