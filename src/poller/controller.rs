//! Async driver for the polling state machine.

use std::time::Duration;

use log::debug;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::state::{PollDecision, PollInput, PollMachine, PollSettings, PollState};
use crate::error::StatusError;
use crate::status::{JobPhase, StatusReport, TopicResult, parse_results};

/// Where the driver fetches status reports from.
///
/// Production talks to a running proxy over HTTP; tests substitute
/// scripted sources.
pub trait StatusSource {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusReport, StatusError>;
}

/// Fetches status reports from a proxy instance.
pub struct HttpStatusSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl StatusSource for HttpStatusSource {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusReport, StatusError> {
        let url = format!("{}/task-status", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("jobId", job_id)])
            .send()
            .await
            .map_err(|e| StatusError::Query(format!("status request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(StatusError::Query(detail));
        }

        response
            .json::<StatusReport>()
            .await
            .map_err(|e| StatusError::Query(format!("status response unreadable: {e}")))
    }
}

/// Receives snapshots of the polling lifecycle, in transition order.
pub trait PollObserver: Send + Sync {
    fn on_update(&self, snapshot: &PollSnapshot);
}

/// A point-in-time view of a polling run.
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub state: PollState,
    pub attempts: u32,
    pub errors: u32,
    pub message: Option<String>,
}

/// How a polling run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Job completed; results are in store order.
    Finished(Vec<TopicResult>),
    /// Retry budget exhausted, or the job itself failed.
    Failed(String),
    /// The consumer cancelled the run before a terminal state.
    Cancelled,
}

/// Poll `job_id` through `source` until it resolves, the retry budget is
/// exhausted, or `cancel` fires.
///
/// At most one status request is in flight at a time. Both suspension
/// points — the request and the wait between attempts — abort promptly on
/// cancellation, and no observer update is delivered afterwards.
pub async fn poll_job<S: StatusSource>(
    source: &S,
    job_id: &str,
    settings: PollSettings,
    observer: &dyn PollObserver,
    cancel: CancellationToken,
) -> PollOutcome {
    let mut machine = PollMachine::new(settings);
    machine.begin();
    notify(observer, &machine, &cancel);

    loop {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        machine.note_attempt();
        let report = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            report = source.fetch_status(job_id) => report,
        };

        let decision = machine.next(classify(report));
        notify(observer, &machine, &cancel);

        match decision {
            PollDecision::Done => return PollOutcome::Finished(machine.results().to_vec()),
            PollDecision::Abort(message) => return PollOutcome::Failed(message),
            PollDecision::Continue => {
                let wait = if machine.consecutive_errors() > 0 {
                    machine
                        .settings()
                        .delay_after_errors(machine.consecutive_errors())
                } else {
                    machine.settings().interval_ms
                };
                debug!(
                    "attempt {} not terminal; next poll in {wait}ms",
                    machine.attempts()
                );
                tokio::select! {
                    _ = cancel.cancelled() => return PollOutcome::Cancelled,
                    _ = sleep(Duration::from_millis(wait)) => {}
                }
            }
        }
    }
}

fn notify(observer: &dyn PollObserver, machine: &PollMachine, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        return;
    }
    observer.on_update(&PollSnapshot {
        state: machine.state(),
        attempts: machine.attempts(),
        errors: machine.consecutive_errors(),
        message: machine.last_error().map(str::to_string),
    });
}

/// Normalize a proxy answer (or failure) for the machine.
fn classify(report: Result<StatusReport, StatusError>) -> PollInput {
    match report {
        Ok(report) if !report.found => PollInput::NotYet,
        Ok(report) => match report.status {
            JobPhase::Completed => {
                let results = parse_results(report.result.as_ref());
                if results.is_empty() {
                    // The status column flipped before the result payload
                    // landed; keep waiting for it.
                    PollInput::NotYet
                } else {
                    PollInput::Complete(results)
                }
            }
            JobPhase::Failed => {
                PollInput::JobFailed("the analysis job reported a failure".to_string())
            }
            JobPhase::Pending | JobPhase::NotFound => PollInput::NotYet,
        },
        Err(err) => PollInput::RequestFailed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replays a fixed script of proxy answers and counts the calls.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<StatusReport, StatusError>>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<StatusReport, StatusError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _job_id: &str) -> Result<StatusReport, StatusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusReport::not_found()))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        snapshots: Mutex<Vec<PollSnapshot>>,
    }

    impl RecordingObserver {
        fn states(&self) -> Vec<PollState> {
            self.snapshots
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.state)
                .collect()
        }

        fn last(&self) -> Option<PollSnapshot> {
            self.snapshots.lock().unwrap().last().cloned()
        }
    }

    impl PollObserver for RecordingObserver {
        fn on_update(&self, snapshot: &PollSnapshot) {
            self.snapshots.lock().unwrap().push(snapshot.clone());
        }
    }

    fn completed_report() -> StatusReport {
        StatusReport {
            found: true,
            status: JobPhase::Completed,
            record_id: Some("rec1".into()),
            job_id: Some("job-1".into()),
            result: Some(json!([
                {"title": "A", "match_score": "9/10"},
                {"title": "B", "match_score": "6/10"}
            ])),
            created_time: Some(1),
            last_modified_time: Some(2),
            message: None,
        }
    }

    fn fast_settings(max_errors: u32) -> PollSettings {
        PollSettings {
            interval_ms: 1,
            max_errors,
        }
    }

    #[tokio::test]
    async fn two_not_found_then_complete() {
        let source = ScriptedSource::new(vec![
            Ok(StatusReport::not_found()),
            Ok(StatusReport::not_found()),
            Ok(completed_report()),
        ]);
        let observer = RecordingObserver::default();

        let outcome = poll_job(
            &source,
            "job-1",
            fast_settings(3),
            &observer,
            CancellationToken::new(),
        )
        .await;

        match outcome {
            PollOutcome::Finished(results) => assert_eq!(results.len(), 2),
            other => panic!("expected Finished, got {other:?}"),
        }
        assert_eq!(
            observer.states(),
            vec![
                PollState::CheckingStatus,
                PollState::PollingResults,
                PollState::PollingResults,
                PollState::Finished,
            ]
        );
        assert_eq!(observer.last().unwrap().attempts, 3);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_requests_and_updates() {
        let source = std::sync::Arc::new(ScriptedSource::new(vec![
            Ok(StatusReport::not_found()),
            Ok(StatusReport::not_found()),
            Ok(completed_report()),
        ]));
        let observer = std::sync::Arc::new(RecordingObserver::default());
        let cancel = CancellationToken::new();

        // A long interval parks the driver in the wait after attempt 2.
        let settings = PollSettings {
            interval_ms: 60_000,
            max_errors: 3,
        };
        let handle = {
            let source = std::sync::Arc::clone(&source);
            let observer = std::sync::Arc::clone(&observer);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                poll_job(&*source, "job-1", settings, &*observer, cancel).await
            })
        };

        while source.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), PollOutcome::Cancelled);
        assert_eq!(source.calls(), 2);
        let states = observer.states();
        assert!(!states.contains(&PollState::Finished));
        assert_eq!(states.last(), Some(&PollState::PollingResults));
    }

    #[tokio::test]
    async fn error_budget_exhaustion_fails_the_run() {
        let source = ScriptedSource::new(vec![
            Err(StatusError::Query("boom 1".into())),
            Err(StatusError::Query("boom 2".into())),
            Err(StatusError::Query("boom 3".into())),
        ]);
        let observer = RecordingObserver::default();

        let outcome = poll_job(
            &source,
            "job-1",
            fast_settings(3),
            &observer,
            CancellationToken::new(),
        )
        .await;

        match outcome {
            PollOutcome::Failed(message) => assert!(!message.is_empty()),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(source.calls(), 3);
        let last = observer.last().unwrap();
        assert_eq!(last.state, PollState::Error);
        assert!(last.message.is_some());
    }

    #[tokio::test]
    async fn transient_errors_are_swallowed_before_success() {
        let source = ScriptedSource::new(vec![
            Err(StatusError::Query("blip".into())),
            Err(StatusError::Query("blip".into())),
            Ok(completed_report()),
        ]);
        let observer = RecordingObserver::default();

        let outcome = poll_job(
            &source,
            "job-1",
            fast_settings(3),
            &observer,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, PollOutcome::Finished(_)));
        assert_eq!(observer.last().unwrap().state, PollState::Finished);
    }

    #[tokio::test]
    async fn job_level_failure_aborts_without_retries() {
        let source = ScriptedSource::new(vec![Ok(StatusReport {
            status: JobPhase::Failed,
            ..completed_report()
        })]);
        let observer = RecordingObserver::default();

        let outcome = poll_job(
            &source,
            "job-1",
            fast_settings(3),
            &observer,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, PollOutcome::Failed(_)));
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn classify_completed_without_results_keeps_waiting() {
        let report = StatusReport {
            result: None,
            ..completed_report()
        };
        assert_eq!(classify(Ok(report)), PollInput::NotYet);
    }

    #[test]
    fn classify_pending_and_not_found_keep_waiting() {
        assert_eq!(classify(Ok(StatusReport::not_found())), PollInput::NotYet);
        let pending = StatusReport {
            status: JobPhase::Pending,
            result: None,
            ..completed_report()
        };
        assert_eq!(classify(Ok(pending)), PollInput::NotYet);
    }

    #[test]
    fn classify_errors_become_request_failures() {
        let input = classify(Err(StatusError::Query("down".into())));
        assert!(matches!(input, PollInput::RequestFailed(_)));
    }

    #[tokio::test]
    async fn http_source_parses_reports_and_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/task-status"))
            .and(query_param("jobId", "job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": true,
                "status": "pending",
                "recordId": "rec1",
                "jobId": "job-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/task-status"))
            .and(query_param("jobId", "job-broken"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"error": "store query failed"})),
            )
            .mount(&server)
            .await;

        let source = HttpStatusSource::new(server.uri());
        let report = source.fetch_status("job-1").await.unwrap();
        assert!(report.found);
        assert_eq!(report.status, JobPhase::Pending);

        let err = source.fetch_status("job-broken").await.unwrap_err();
        match err {
            StatusError::Query(detail) => assert!(detail.contains("store query failed")),
            other => panic!("expected Query, got {other:?}"),
        }
    }
}
