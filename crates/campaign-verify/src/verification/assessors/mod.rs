//! Assessor capability and the rule-based shims shipped with the service.
//!
//! Every assessor scores exactly one [`Component`]. The shims here apply deterministic
//! keyword and structure checks; model-backed assessors plug in through the same
//! [`Assessor`] trait and are registered on an [`AssessorRegistry`].

mod documents;
mod images;
mod messages;
mod use_case;
mod website;

pub use documents::DocumentsAssessor;
pub use images::ImagesAssessor;
pub use messages::MessagesAssessor;
pub use use_case::UseCaseAssessor;
pub use website::{PageFetcher, WebsiteAssessor};

use std::sync::Arc;

use async_trait::async_trait;

use super::domain::{Component, Issue, Recommendation, Severity, Submission, Verdict};

/// Step-level failure raised while assessing one component. Recovered by the engine,
/// never surfaced as a run failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    #[error("assessment timed out after {0}s")]
    Timeout(u64),
    #[error("upstream assessment service failed: {0}")]
    Upstream(String),
    #[error("assessment returned a malformed verdict: {0}")]
    Malformed(String),
}

/// Capability scoring one compliance component of a submission.
///
/// Implementations must return [`Verdict::absent`] when the submission carries no
/// material for their component rather than erroring.
#[async_trait]
pub trait Assessor: Send + Sync {
    fn component(&self) -> Component;

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError>;
}

/// One assessor per component. Dispatch is a total match over [`Component`].
#[derive(Clone)]
pub struct AssessorRegistry {
    use_case: Arc<dyn Assessor>,
    messages: Arc<dyn Assessor>,
    images: Arc<dyn Assessor>,
    website: Arc<dyn Assessor>,
    documents: Arc<dyn Assessor>,
}

impl AssessorRegistry {
    /// Registry wired with the five rule-based shims.
    pub fn rule_based() -> Self {
        Self {
            use_case: Arc::new(UseCaseAssessor::default()),
            messages: Arc::new(MessagesAssessor),
            images: Arc::new(ImagesAssessor),
            website: Arc::new(WebsiteAssessor::default()),
            documents: Arc::new(DocumentsAssessor),
        }
    }

    /// Replace the assessor for whichever component `assessor` declares.
    pub fn with(mut self, assessor: Arc<dyn Assessor>) -> Self {
        let component = assessor.component();
        *self.slot_mut(component) = assessor;
        self
    }

    pub fn for_component(&self, component: Component) -> &Arc<dyn Assessor> {
        match component {
            Component::UseCase => &self.use_case,
            Component::Messages => &self.messages,
            Component::Images => &self.images,
            Component::Website => &self.website,
            Component::Documents => &self.documents,
        }
    }

    fn slot_mut(&mut self, component: Component) -> &mut Arc<dyn Assessor> {
        match component {
            Component::UseCase => &mut self.use_case,
            Component::Messages => &mut self.messages,
            Component::Images => &mut self.images,
            Component::Website => &mut self.website,
            Component::Documents => &mut self.documents,
        }
    }
}

impl Default for AssessorRegistry {
    fn default() -> Self {
        Self::rule_based()
    }
}

/// Reject verdicts an assessor should never have produced.
pub fn validate_verdict(verdict: &Verdict) -> Result<(), AssessmentError> {
    match verdict.score {
        Some(score) if score > 100 => Err(AssessmentError::Malformed(format!(
            "score {score} outside 0..=100"
        ))),
        None if !verdict.issues.is_empty() => Err(AssessmentError::Malformed(
            "absent verdict carried issues".to_string(),
        )),
        _ => Ok(()),
    }
}

const CRITICAL_PENALTY: u32 = 40;
const MAJOR_PENALTY: u32 = 15;
const MINOR_PENALTY: u32 = 5;

/// Build a verdict from rule findings: start at 100 and deduct per severity.
pub(crate) fn verdict_from_findings(
    issues: Vec<Issue>,
    recommendations: Vec<Recommendation>,
) -> Verdict {
    let penalty: u32 = issues
        .iter()
        .map(|issue| match issue.severity {
            Severity::Critical => CRITICAL_PENALTY,
            Severity::Major => MAJOR_PENALTY,
            Severity::Minor => MINOR_PENALTY,
        })
        .sum();
    let compliant = !issues
        .iter()
        .any(|issue| issue.severity == Severity::Critical);

    Verdict {
        score: Some(100u32.saturating_sub(penalty) as u8),
        compliant,
        issues,
        recommendations,
    }
}

/// Content categories carriers refuse outright.
pub(crate) const PROHIBITED_TERMS: &[&str] = &[
    "cannabis",
    "marijuana",
    "cbd",
    "firearm",
    "vape",
    "payday loan",
    "debt relief",
    "get rich",
];

/// Phrases showing a subscriber actively agreed to receive messages.
pub(crate) const CONSENT_TERMS: &[&str] = &[
    "opt in",
    "opt-in",
    "consent",
    "agree",
    "subscribe",
    "sign up",
    "signup",
    "check the box",
    "checkbox",
    "text join",
];

/// Phrases disclosing how to stop receiving messages.
pub(crate) const OPT_OUT_TERMS: &[&str] = &["stop", "unsubscribe", "opt out", "opt-out", "cancel"];

/// Suffixes accepted after a term so "agreed" or "subscribes" still match.
const INFLECTIONS: &[&str] = &["s", "es", "d", "ed", "ing"];

pub(crate) fn contains_any(text: &str, terms: &[&str]) -> bool {
    first_match(text, terms).is_some()
}

/// First term found in `text` as a whole word, ignoring ASCII case.
pub(crate) fn first_match<'a>(text: &str, terms: &[&'a str]) -> Option<&'a str> {
    let lowered = text.to_ascii_lowercase();
    terms
        .iter()
        .copied()
        .find(|term| matches_word(&lowered, term))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

fn at_boundary(rest: &str) -> bool {
    !rest.chars().next().is_some_and(is_word_char)
}

/// Boundaries are only enforced on the sides of `term` that end in a word character,
/// so "t.co/" still matches inside a URL.
fn matches_word(text: &str, term: &str) -> bool {
    let open_left = !term.chars().next().is_some_and(is_word_char);
    let open_right = !term.chars().next_back().is_some_and(is_word_char);

    text.match_indices(term).any(|(start, _)| {
        let left = open_left || !text[..start].chars().next_back().is_some_and(is_word_char);
        let rest = &text[start + term.len()..];
        let right = open_right
            || at_boundary(rest)
            || INFLECTIONS
                .iter()
                .any(|suffix| rest.strip_prefix(*suffix).is_some_and(at_boundary));
        left && right
    })
}
