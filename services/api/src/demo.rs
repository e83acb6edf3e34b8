use crate::infra::{build_stack, parse_poll_interval};
use campaign_verify::config::VerificationConfig;
use campaign_verify::error::AppError;
use campaign_verify::verification::{
    BusinessProfile, CampaignUseCase, ComplianceReport, DocumentCategory, OptInImage,
    Submission, SubmissionId, SubmissionStatus, SubmissionStore, SupportingDocument,
    Verification, WebsiteSnapshot,
};
use chrono::Utc;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// JSON file holding a submission to verify instead of the bundled sample.
    #[arg(long)]
    pub(crate) submission: Option<PathBuf>,
    /// Milliseconds between status polls.
    #[arg(long, default_value = "100", value_parser = parse_poll_interval)]
    pub(crate) poll_interval_ms: u64,
    /// Print the final report as JSON instead of a summary.
    #[arg(long)]
    pub(crate) json: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            submission: None,
            poll_interval_ms: 100,
            json: false,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        submission,
        poll_interval_ms,
        json,
    } = args;

    let submission = match submission {
        Some(path) => load_submission(&path)?,
        None => sample_submission(),
    };

    let stack = build_stack(&VerificationConfig::default());
    let submission = stack.submissions.insert(submission).await?;

    println!("Campaign verification demo");
    println!(
        "Submission {} ({}, {})",
        submission.id, submission.business.brand_name, submission.use_case.category
    );

    let started = stack.engine.start(&submission.id).await?;
    let mut last_seen = (started.progress, started.current_step.clone());
    render_progress(&started);

    let finished = loop {
        tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
        let current = stack.engine.status(&started.id).await?;
        if (current.progress, current.current_step.clone()) != last_seen {
            render_progress(&current);
            last_seen = (current.progress, current.current_step.clone());
        }
        if current.status.is_terminal() {
            break current;
        }
    };

    if let Some(code) = finished.error_code.as_deref() {
        println!(
            "\nVerification failed ({code}): {}",
            finished.error_message.as_deref().unwrap_or("no details")
        );
        for detail in &finished.error_details {
            println!("  - {} -> {}", detail.issue, detail.suggestion);
        }
        return Ok(());
    }

    let report = stack.engine.report(&submission.id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_report(&report);
    }

    let elapsed = Utc::now() - finished.started_at;
    println!(
        "\nCompleted in {}ms; {} report(s) on file for this submission",
        elapsed.num_milliseconds(),
        stack.reports.history(&submission.id).await.len()
    );

    Ok(())
}

fn load_submission(path: &Path) -> Result<Submission, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn render_progress(verification: &Verification) {
    println!(
        "  [{:>3}%] {:<10} {}",
        verification.progress,
        verification.status.label(),
        verification.current_step
    );
}

fn render_report(report: &ComplianceReport) {
    println!(
        "\nOverall score: {:.1} (approval likelihood {})",
        report.overall_score,
        report.approval_likelihood.label()
    );

    println!("\nComponent scores");
    for (component, score) in &report.component_scores {
        match score {
            Some(score) => println!("  {:<10} {score}", component.label()),
            None => println!("  {:<10} n/a", component.label()),
        }
    }

    if report.critical_issues.is_empty() {
        println!("\nCritical issues: none");
    } else {
        println!("\nCritical issues");
        for issue in &report.critical_issues {
            let scope = issue
                .component
                .map(|component| component.label())
                .unwrap_or("submission");
            println!("  - [{scope}] {} -> {}", issue.description, issue.recommendation);
        }
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations");
        for entry in &report.recommendations {
            println!(
                "  - ({:?}) [{}] {}",
                entry.priority,
                entry.component.label(),
                entry.action
            );
        }
    }
}

pub(crate) fn sample_submission() -> Submission {
    Submission {
        id: SubmissionId("sub-demo-001".to_string()),
        status: SubmissionStatus::Submitted,
        business: BusinessProfile {
            legal_name: "Bluebird Coffee Roasters LLC".to_string(),
            brand_name: "Bluebird Coffee".to_string(),
            vertical: "retail".to_string(),
            contact_email: Some("ops@bluebird.example".to_string()),
        },
        use_case: CampaignUseCase {
            category: "marketing".to_string(),
            description: "Weekly promotions and new roast announcements for loyalty members who opted in at checkout".to_string(),
            message_flow: "Customers check the box on the loyalty signup form to agree to marketing texts".to_string(),
            help_message: Some("Bluebird Coffee: visit bluebird.example/help. Reply STOP to opt out.".to_string()),
            opt_out_message: None,
        },
        sample_messages: vec![
            "Bluebird Coffee: our Ethiopia roast is back! Reply STOP to opt out.".to_string(),
            "Double stamps this weekend. Details at bit.ly/bb-stamps".to_string(),
        ],
        opt_in_images: vec![OptInImage {
            name: "signup-form.png".to_string(),
            storage_key: "demo/signup-form.png".to_string(),
            extracted_text: Some("[ ] I agree to receive marketing texts from Bluebird Coffee".to_string()),
        }],
        documents: vec![SupportingDocument {
            name: "ein-letter.pdf".to_string(),
            category: DocumentCategory::TaxRegistration,
            storage_key: "demo/ein-letter.pdf".to_string(),
            extracted_text: Some("IRS assigned EIN to Bluebird Coffee Roasters LLC".to_string()),
        }],
        website: Some(WebsiteSnapshot {
            url: "https://bluebird.example".to_string(),
            privacy_policy_url: Some("https://bluebird.example/privacy".to_string()),
            terms_url: None,
        }),
        compliance_score: None,
    }
}
