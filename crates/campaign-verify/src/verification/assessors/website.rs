use std::sync::Arc;

use async_trait::async_trait;

use super::{contains_any, verdict_from_findings, AssessmentError, Assessor};
use crate::verification::domain::{Component, Issue, Severity, Submission, Verdict};

const DATA_SHARING_TERMS: &[&str] = &[
    "share your phone number with third parties",
    "sell your information",
    "share mobile information with third parties",
    "shared with marketing partners",
];

/// Content-fetch capability used to pull the live homepage of a brand.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, AssessmentError>;
}

/// Checks the declared website and, when a fetcher is configured, its homepage copy.
#[derive(Clone, Default)]
pub struct WebsiteAssessor {
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl WebsiteAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetcher(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher: Some(fetcher),
        }
    }
}

#[async_trait]
impl Assessor for WebsiteAssessor {
    fn component(&self) -> Component {
        Component::Website
    }

    async fn assess(&self, submission: &Submission) -> Result<Verdict, AssessmentError> {
        let site = match submission.website.as_ref() {
            Some(site) if submission.has_website() => site,
            _ => return Ok(Verdict::absent()),
        };

        let mut issues = Vec::new();
        let url = site.url.trim();

        if !url.to_ascii_lowercase().starts_with("https://") {
            issues.push(Issue::new(
                Severity::Major,
                format!("website {url} is not served over https"),
                "Serve the website over HTTPS with a valid certificate",
            ));
        }

        let content = match &self.fetcher {
            Some(fetcher) => Some(fetcher.fetch(url).await?),
            None => None,
        };

        let declares_privacy = site
            .privacy_policy_url
            .as_deref()
            .map(|link| !link.trim().is_empty())
            .unwrap_or(false);
        let page_mentions_privacy = content
            .as_deref()
            .map(|page| contains_any(page, &["privacy policy"]))
            .unwrap_or(false);
        if !declares_privacy && !page_mentions_privacy {
            issues.push(Issue::new(
                Severity::Critical,
                "website has no privacy policy",
                "Publish a privacy policy stating mobile numbers are not shared for marketing",
            ));
        }

        let declares_terms = site
            .terms_url
            .as_deref()
            .map(|link| !link.trim().is_empty())
            .unwrap_or(false);
        let page_mentions_terms = content
            .as_deref()
            .map(|page| contains_any(page, &["terms of service", "terms and conditions", "terms & conditions"]))
            .unwrap_or(false);
        if !declares_terms && !page_mentions_terms {
            issues.push(Issue::new(
                Severity::Minor,
                "website has no messaging terms",
                "Publish terms covering message frequency, rates, HELP and STOP",
            ));
        }

        if let Some(page) = content.as_deref() {
            if contains_any(page, DATA_SHARING_TERMS) {
                issues.push(Issue::new(
                    Severity::Critical,
                    "website states mobile data is shared with third parties",
                    "Remove third-party sharing of mobile opt-in data from the privacy policy",
                ));
            }
        }

        Ok(verdict_from_findings(issues, Vec::new()))
    }
}
