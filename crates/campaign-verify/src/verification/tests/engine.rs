use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::verification::assessors::AssessorRegistry;
use crate::verification::domain::{
    error_codes, ApprovalLikelihood, Component, SubmissionId, SubmissionStatus, Verdict,
    VerificationId, VerificationStatus,
};
use crate::verification::engine::{step_progress, VerificationError, WorkflowEngine};
use crate::verification::memory::{
    InMemoryProgressStore, InMemoryReportStore, InMemorySubmissionStore,
};
use crate::verification::planner::RulePlanner;
use crate::verification::report::NO_ASSESSABLE_CONTENT;
use crate::verification::repository::{RepositoryError, SubmissionStore};

async fn wait_for_submission_status(
    submissions: &InMemorySubmissionStore,
    id: &SubmissionId,
    expected: SubmissionStatus,
) {
    for _ in 0..200 {
        let submission = submissions
            .get(id)
            .await
            .expect("store readable")
            .expect("submission exists");
        if submission.status == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("submission {id} never reached {}", expected.label());
}

#[test]
fn step_progress_spans_five_to_ninety_five() {
    assert_eq!(step_progress(0, 5), 5);
    assert_eq!(step_progress(1, 5), 23);
    assert_eq!(step_progress(5, 5), 95);
    assert_eq!(step_progress(1, 3), 35);
    assert_eq!(step_progress(2, 3), 65);
    assert_eq!(step_progress(7, 3), 95);
}

#[tokio::test]
async fn start_returns_pending_without_waiting_for_assessments() {
    let h = harness_with(
        Arc::new(DelayedPlanner {
            delay: Duration::from_millis(300),
        }),
        AssessorRegistry::rule_based(),
        minimal_submission(),
    )
    .await;

    let verification = h
        .engine
        .start(&minimal_submission().id)
        .await
        .expect("verification starts");

    assert_eq!(verification.status, VerificationStatus::Pending);
    assert_eq!(verification.progress, 0);
    assert!(verification.completed_steps.is_empty());
    assert_eq!(verification.prior_submission_status, SubmissionStatus::Submitted);
    assert!(verification.estimated_completion_time > verification.started_at);

    let current = h
        .engine
        .status(&verification.id)
        .await
        .expect("status readable");
    assert!(!current.status.is_terminal());
    assert!(h.engine.is_running(&verification.id));
}

#[tokio::test]
async fn full_run_completes_with_report_and_score() {
    let submission = full_submission();
    let h = harness(submission.clone()).await;

    let started = h
        .engine
        .start(&submission.id)
        .await
        .expect("verification starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;

    assert_eq!(finished.status, VerificationStatus::Completed);
    assert_eq!(finished.progress, 100);
    assert!(finished.completed_at.is_some());
    assert_eq!(finished.error_code, None);
    assert_eq!(
        finished.completed_steps,
        vec![
            Component::UseCase,
            Component::Messages,
            Component::Website,
            Component::Images,
            Component::Documents,
        ]
    );

    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.verification_id, started.id);
    assert!((report.overall_score - 100.0).abs() < 1e-9);
    assert_eq!(report.approval_likelihood, ApprovalLikelihood::High);
    assert!(report.critical_issues.is_empty());

    wait_for_submission_status(&h.submissions, &submission.id, SubmissionStatus::Verified).await;
    let stored = h
        .submissions
        .get(&submission.id)
        .await
        .expect("store readable")
        .expect("submission exists");
    assert_eq!(stored.compliance_score, Some(100));
}

#[tokio::test]
async fn start_rejects_unknown_submission() {
    let h = harness(minimal_submission()).await;

    let outcome = h
        .engine
        .start(&SubmissionId("sub-missing".to_string()))
        .await;

    assert!(matches!(outcome, Err(VerificationError::NotFound(_))));
    assert_eq!(h.progress.count().await, 0);
}

#[tokio::test]
async fn start_rejects_submission_already_verifying() {
    let h = harness_with(
        Arc::new(DelayedPlanner {
            delay: Duration::from_millis(300),
        }),
        AssessorRegistry::rule_based(),
        minimal_submission(),
    )
    .await;
    let id = minimal_submission().id;

    h.engine.start(&id).await.expect("first start succeeds");
    let second = h.engine.start(&id).await;

    assert!(matches!(second, Err(VerificationError::InvalidState(_))));
    assert_eq!(h.progress.count().await, 1);
}

#[tokio::test]
async fn cancel_during_planning_wins_over_background_completion() {
    let h = harness_with(
        Arc::new(DelayedPlanner {
            delay: Duration::from_millis(150),
        }),
        AssessorRegistry::rule_based(),
        minimal_submission(),
    )
    .await;
    let submission_id = minimal_submission().id;

    let started = h.engine.start(&submission_id).await.expect("starts");
    let cancelled = h.engine.cancel(&started.id).await.expect("cancel succeeds");

    assert_eq!(cancelled.status, VerificationStatus::Failed);
    assert_eq!(
        cancelled.error_code.as_deref(),
        Some(error_codes::CANCELLED_BY_USER)
    );

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after = h.engine.status(&started.id).await.expect("status readable");
    assert_eq!(after.status, VerificationStatus::Failed);
    assert_eq!(after.error_code.as_deref(), Some(error_codes::CANCELLED_BY_USER));
    assert!(!h.engine.is_running(&started.id));

    assert!(h.reports.history(&submission_id).await.is_empty());
    assert!(matches!(
        h.engine.report(&submission_id).await,
        Err(VerificationError::InvalidState(_))
    ));

    let submission = h
        .submissions
        .get(&submission_id)
        .await
        .expect("store readable")
        .expect("submission exists");
    assert_eq!(submission.status, SubmissionStatus::Submitted);
}

#[tokio::test]
async fn cancel_during_assessment_stops_the_run() {
    let registry = AssessorRegistry::rule_based().with(Arc::new(SlowAssessor {
        component: Component::Messages,
        delay: Duration::from_millis(300),
    }));
    let h = harness_with(Arc::new(RulePlanner), registry, minimal_submission()).await;
    let submission_id = minimal_submission().id;

    let started = h.engine.start(&submission_id).await.expect("starts");
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.engine.cancel(&started.id).await.expect("cancel succeeds");

    tokio::time::sleep(Duration::from_millis(400)).await;

    let after = h.engine.status(&started.id).await.expect("status readable");
    assert_eq!(after.status, VerificationStatus::Failed);
    assert!(!after.completed_steps.contains(&Component::Messages));
    assert!(h.reports.history(&submission_id).await.is_empty());
}

#[tokio::test]
async fn cancel_rejects_terminal_and_unknown_verifications() {
    let h = harness(minimal_submission()).await;

    let started = h
        .engine
        .start(&minimal_submission().id)
        .await
        .expect("starts");
    wait_for_terminal(&h.engine, &started.id).await;

    assert!(matches!(
        h.engine.cancel(&started.id).await,
        Err(VerificationError::InvalidState(_))
    ));
    assert!(matches!(
        h.engine
            .cancel(&VerificationId("ver-missing".to_string()))
            .await,
        Err(VerificationError::NotFound(_))
    ));

    let after = h.engine.status(&started.id).await.expect("status readable");
    assert_eq!(after.status, VerificationStatus::Completed);
}

#[tokio::test]
async fn failing_image_assessor_does_not_fail_the_run() {
    let registry = uniform_registry(90).with(Arc::new(FailingAssessor(Component::Images)));
    let submission = full_submission();
    let h = harness_with(Arc::new(RulePlanner), registry, submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;

    assert_eq!(finished.status, VerificationStatus::Completed);
    assert!(finished.completed_steps.contains(&Component::Images));

    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.component_scores[&Component::Images], Some(0));
    assert_eq!(report.component_scores[&Component::UseCase], Some(90));
    // 0.8 * 90 + 0.2 * 0
    assert!((report.overall_score - 72.0).abs() < 1e-9);
    assert_eq!(report.critical_issues.len(), 1);
    let issue = &report.critical_issues[0];
    assert_eq!(issue.component, Some(Component::Images));
    assert!(issue.description.contains("images analysis unavailable"));
}

#[tokio::test]
async fn assessor_timeout_is_recorded_as_zero() {
    let registry = uniform_registry(100).with(Arc::new(SlowAssessor {
        component: Component::Messages,
        delay: Duration::from_secs(5),
    }));
    let submission = minimal_submission();
    let h = harness_with(Arc::new(RulePlanner), registry, submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;

    assert_eq!(finished.status, VerificationStatus::Completed);
    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.component_scores[&Component::Messages], Some(0));
    assert!(report.critical_issues[0].description.contains("timed out"));
}

#[tokio::test]
async fn malformed_verdict_is_treated_as_failure() {
    let registry = uniform_registry(80).with(FixedAssessor::arc(Component::UseCase, scored(140)));
    let submission = minimal_submission();
    let h = harness_with(Arc::new(RulePlanner), registry, submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    wait_for_terminal(&h.engine, &started.id).await;

    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.component_scores[&Component::UseCase], Some(0));
    assert!(report.critical_issues[0].description.contains("malformed"));
}

#[tokio::test]
async fn failing_planner_falls_back_to_rule_plan() {
    let planner = Arc::new(FailingPlanner::default());
    let submission = full_submission();
    let h = harness_with(
        planner.clone(),
        AssessorRegistry::rule_based(),
        submission.clone(),
    )
    .await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;

    assert_eq!(finished.status, VerificationStatus::Completed);
    assert_eq!(finished.completed_steps.len(), 5);
    assert_eq!(planner.calls(), 1);
}

#[tokio::test]
async fn planning_failure_without_fallback_fails_the_run() {
    let submission = minimal_submission();
    let progress = Arc::new(crate::verification::InMemoryProgressStore::new());
    let submissions = Arc::new(InMemorySubmissionStore::new());
    let reports = Arc::new(InMemoryReportStore::new());
    submissions.insert(submission.clone()).await.expect("inserted");

    let engine = Arc::new(
        WorkflowEngine::new(
            Arc::new(FailingPlanner::default()),
            AssessorRegistry::rule_based(),
            progress,
            Arc::clone(&submissions),
            reports,
            fast_settings(),
        )
        .with_fallback_planner(Arc::new(FailingPlanner::default())),
    );

    let started = engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&engine, &started.id).await;

    assert_eq!(finished.status, VerificationStatus::Failed);
    assert_eq!(
        finished.error_code.as_deref(),
        Some(error_codes::PLANNING_FAILED)
    );
    assert!(!finished.error_details.is_empty());
    assert!(finished.completed_at.is_some());

    wait_for_submission_status(&submissions, &submission.id, SubmissionStatus::Submitted).await;
    assert!(matches!(
        engine.report(&submission.id).await,
        Err(VerificationError::InvalidState(_))
    ));
}

#[tokio::test]
async fn scripted_plan_drops_unknown_components() {
    let planner = Arc::new(ScriptedPlanner(crate::verification::PlanDraft {
        analysis: "focus on consent".to_string(),
        steps: vec![
            draft_step("messages", crate::verification::Priority::High),
            draft_step("carrier_vetting", crate::verification::Priority::High),
        ],
    }));
    let submission = full_submission();
    let h = harness_with(planner, AssessorRegistry::rule_based(), submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;

    assert_eq!(finished.completed_steps, vec![Component::Messages]);
    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.component_scores.len(), 1);
}

#[tokio::test]
async fn progress_never_decreases_while_polling() {
    let registry = Component::ordered()
        .into_iter()
        .fold(AssessorRegistry::rule_based(), |registry, component| {
            registry.with(Arc::new(SlowAssessor {
                component,
                delay: Duration::from_millis(30),
            }))
        });
    let submission = full_submission();
    let h = harness_with(Arc::new(RulePlanner), registry, submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let mut observed = vec![started.progress];
    loop {
        let current = h.engine.status(&started.id).await.expect("status readable");
        observed.push(current.progress);
        if current.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(observed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(observed.last().copied(), Some(100));
    assert!(observed.iter().any(|progress| *progress > 5 && *progress < 100));
}

#[tokio::test]
async fn all_absent_verdicts_produce_low_report() {
    let registry = Component::ordered()
        .into_iter()
        .fold(AssessorRegistry::rule_based(), |registry, component| {
            registry.with(FixedAssessor::arc(component, Verdict::absent()))
        });
    let submission = minimal_submission();
    let h = harness_with(Arc::new(RulePlanner), registry, submission.clone()).await;

    let started = h.engine.start(&submission.id).await.expect("starts");
    let finished = wait_for_terminal(&h.engine, &started.id).await;
    assert_eq!(finished.status, VerificationStatus::Completed);

    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.overall_score, 0.0);
    assert_eq!(report.approval_likelihood, ApprovalLikelihood::Low);
    assert_eq!(report.critical_issues.len(), 1);
    assert_eq!(report.critical_issues[0].description, NO_ASSESSABLE_CONTENT);
}

#[tokio::test]
async fn reverification_keeps_latest_report() {
    let submission = minimal_submission();
    let h = harness(submission.clone()).await;

    let first = h.engine.start(&submission.id).await.expect("starts");
    wait_for_terminal(&h.engine, &first.id).await;
    wait_for_submission_status(&h.submissions, &submission.id, SubmissionStatus::Verified).await;

    let second = h.engine.start(&submission.id).await.expect("restarts");
    assert_eq!(second.prior_submission_status, SubmissionStatus::Verified);
    wait_for_terminal(&h.engine, &second.id).await;

    let report = h.engine.report(&submission.id).await.expect("report available");
    assert_eq!(report.verification_id, second.id);
    assert_eq!(h.reports.history(&submission.id).await.len(), 2);
}

#[tokio::test]
async fn report_requires_known_submission_with_completed_run() {
    let h = harness(minimal_submission()).await;

    assert!(matches!(
        h.engine.report(&SubmissionId("sub-missing".to_string())).await,
        Err(VerificationError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.report(&minimal_submission().id).await,
        Err(VerificationError::InvalidState(_))
    ));
}

#[tokio::test]
async fn start_surfaces_progress_store_outage() {
    let submission = minimal_submission();
    let submissions = Arc::new(InMemorySubmissionStore::new());
    submissions.insert(submission.clone()).await.expect("inserted");
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(RulePlanner),
        AssessorRegistry::rule_based(),
        Arc::new(UnavailableProgressStore),
        Arc::clone(&submissions),
        Arc::new(InMemoryReportStore::new()),
        fast_settings(),
    ));

    let outcome = engine.start(&submission.id).await;

    assert!(matches!(
        outcome,
        Err(VerificationError::Persistence(RepositoryError::Unavailable(_)))
    ));
    let stored = submissions
        .get(&submission.id)
        .await
        .expect("store readable")
        .expect("submission exists");
    assert_eq!(stored.status, SubmissionStatus::Submitted);
}

#[test]
fn verification_record_ignores_regressions_and_repeats() {
    let submission = minimal_submission();
    let now = chrono::Utc::now();
    let mut verification = crate::verification::Verification::pending(&submission, now, now);

    verification.advance(41, "messages");
    verification.advance(23, "use_case");
    verification.mark_step_completed(Component::Messages);
    verification.mark_step_completed(Component::Messages);

    assert_eq!(verification.progress, 41);
    assert_eq!(verification.current_step, "use_case");
    assert_eq!(verification.completed_steps, vec![Component::Messages]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_starts_claim_the_submission_once() {
    let submission = minimal_submission();
    let inner = Arc::new(InMemorySubmissionStore::new());
    inner.insert(submission.clone()).await.expect("inserted");
    let progress = Arc::new(InMemoryProgressStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(DelayedPlanner {
            delay: Duration::from_millis(200),
        }),
        AssessorRegistry::rule_based(),
        Arc::clone(&progress),
        Arc::new(YieldingSubmissionStore(Arc::clone(&inner))),
        Arc::new(InMemoryReportStore::new()),
        fast_settings(),
    ));

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        let id = submission.id.clone();
        async move { engine.start(&id).await }
    });
    let second = tokio::spawn({
        let engine = Arc::clone(&engine);
        let id = submission.id.clone();
        async move { engine.start(&id).await }
    });
    let outcomes = [
        first.await.expect("first start joined"),
        second.await.expect("second start joined"),
    ];

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Err(VerificationError::InvalidState(_)))));
    assert_eq!(progress.count().await, 1);
}

#[tokio::test]
async fn failed_claim_leaves_no_pending_record() {
    let submission = minimal_submission();
    let inner = Arc::new(InMemorySubmissionStore::new());
    inner.insert(submission.clone()).await.expect("inserted");
    let progress = Arc::new(InMemoryProgressStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(RulePlanner),
        AssessorRegistry::rule_based(),
        Arc::clone(&progress),
        Arc::new(UnclaimableSubmissionStore(Arc::clone(&inner))),
        Arc::new(InMemoryReportStore::new()),
        fast_settings(),
    ));

    let outcome = engine.start(&submission.id).await;

    assert!(matches!(
        outcome,
        Err(VerificationError::Persistence(RepositoryError::Unavailable(_)))
    ));
    assert_eq!(progress.count().await, 0);
    let stored = inner
        .get(&submission.id)
        .await
        .expect("store readable")
        .expect("submission exists");
    assert_eq!(stored.status, SubmissionStatus::Submitted);
}

#[tokio::test]
async fn report_store_outage_fails_the_run_and_reverts_submission() {
    let submission = minimal_submission();
    let submissions = Arc::new(InMemorySubmissionStore::new());
    submissions.insert(submission.clone()).await.expect("inserted");
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(RulePlanner),
        AssessorRegistry::rule_based(),
        Arc::new(InMemoryProgressStore::new()),
        Arc::clone(&submissions),
        Arc::new(UnavailableReportStore),
        fast_settings(),
    ));

    let started = engine.start(&submission.id).await.expect("start accepted");

    let mut finished = None;
    for _ in 0..200 {
        let verification = engine.status(&started.id).await.expect("status readable");
        if verification.status.is_terminal() {
            finished = Some(verification);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let finished = finished.expect("run reached a terminal state");

    assert_eq!(finished.status, VerificationStatus::Failed);
    assert_eq!(
        finished.error_code.as_deref(),
        Some(error_codes::PERSISTENCE_FAILED)
    );
    assert!(finished
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("report store offline")));
    assert!(!finished.error_details.is_empty());
    wait_for_submission_status(&submissions, &submission.id, SubmissionStatus::Submitted).await;
}
