use campaign_verify::config::VerificationConfig;
use campaign_verify::verification::{
    AssessorRegistry, EngineSettings, InMemoryProgressStore, InMemoryReportStore,
    InMemorySubmissionStore, RulePlanner, WorkflowEngine,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ServiceEngine =
    WorkflowEngine<InMemoryProgressStore, InMemorySubmissionStore, InMemoryReportStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Engine plus the submission store the intake route writes to.
#[derive(Clone)]
pub(crate) struct VerificationStack {
    pub(crate) engine: Arc<ServiceEngine>,
    pub(crate) submissions: Arc<InMemorySubmissionStore>,
    pub(crate) reports: Arc<InMemoryReportStore>,
}

pub(crate) fn build_stack(config: &VerificationConfig) -> VerificationStack {
    let submissions = Arc::new(InMemorySubmissionStore::new());
    let reports = Arc::new(InMemoryReportStore::new());
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(RulePlanner),
        AssessorRegistry::rule_based(),
        Arc::new(InMemoryProgressStore::new()),
        Arc::clone(&submissions),
        Arc::clone(&reports),
        EngineSettings::from(config),
    ));

    VerificationStack {
        engine,
        submissions,
        reports,
    }
}

pub(crate) fn parse_poll_interval(raw: &str) -> Result<u64, String> {
    let millis = raw
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("failed to parse '{raw}' as milliseconds ({err})"))?;
    if millis == 0 {
        return Err("poll interval must be at least 1ms".to_string());
    }
    Ok(millis)
}
