//! End-to-end scenarios driving the orchestrator, worker pool and
//! finalizer together against a scripted `MockTransport`, with no network
//! access and no real queue.

use std::sync::Arc;
use std::time::Duration;

use collector::counters::InMemoryCounterService;
use collector::keys::ApiKey;
use collector::keys::KeyRotator;
use collector::limiter::RateLimiter;
use collector::model::JobStatus;
use collector::model::RunStatus;
use collector::queue::InProcessQueue;
use collector::queue::WorkItem;
use collector::retry::Pipeline;
use collector::youtube::mock::MockTransport;
use collector::youtube::TransportResponse;
use collector::youtube::YouTubeClient;
use collector::Finalizer;
use collector::InMemoryState;
use collector::JobWorker;
use collector::Orchestrator;
use collector::SystemClock;
use collector::StateStore;

struct Harness {
    state: Arc<InMemoryState>,
    orchestrator: Arc<Orchestrator>,
    worker: Arc<JobWorker<MockTransport>>,
    receiver: tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<WorkItem>>,
}

impl Harness {
    fn new(keys: Vec<&str>, mock: Arc<MockTransport>) -> Self {
        let clock = Arc::new(SystemClock);
        let state = Arc::new(InMemoryState::new());
        let counters = Arc::new(InMemoryCounterService::new());
        let rotator = Arc::new(KeyRotator::new(
            keys.into_iter().map(ApiKey::from_raw).collect(),
            clock.clone(),
        ));
        let limiter = Arc::new(RateLimiter::new(counters.clone(), clock.clone()));
        let pipeline = Arc::new(Pipeline::new(rotator, limiter));
        let client = Arc::new(YouTubeClient::new(pipeline, mock));

        let (queue, receiver) = InProcessQueue::new();
        let queue: Arc<dyn collector::WorkQueue> = Arc::new(queue);

        let finalizer = Arc::new(Finalizer::new(state.clone(), counters, clock.clone()));
        let orchestrator = Arc::new(Orchestrator::new(state.clone(), queue.clone(), clock.clone(), finalizer));
        let worker = Arc::new(JobWorker::new(state.clone(), client, queue, clock));

        Self {
            state,
            orchestrator,
            worker,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// Drains the queue until it's empty, driving jobs through the worker
    /// and finalize attempts through the orchestrator -- a synchronous
    /// stand-in for the worker pool's background task loop.
    async fn drain(&self) {
        loop {
            let item = {
                let mut rx = self.receiver.lock().await;
                match tokio::time::timeout(Duration::from_millis(500), rx.recv()).await {
                    Ok(Some(item)) => item,
                    _ => break,
                }
            };
            match item {
                WorkItem::ProcessJob { job_id, run_id } => self.worker.process(job_id, run_id).await,
                WorkItem::FinalizeRun { run_id } => {
                    let _ = self.orchestrator.try_finalize(run_id).await;
                }
            }
        }
    }
}

#[tokio::test]
async fn direct_channel_id_resolves_without_any_api_call() {
    let mock = Arc::new(MockTransport::new());
    let harness = Harness::new(vec!["k1"], mock.clone());

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["UC-lHJZR3Gqxm24_Vd_AJ5Yw".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let run = harness.state.get_run(result.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.summary.unwrap().done, 1);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn valid_handle_url_resolves_via_single_api_call() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(TransportResponse::Ok(serde_json::json!({
        "items": [{ "id": "UCX6OQ3DkcsbYNE6H8uQQuVA" }]
    })));
    let harness = Harness::new(vec!["k1"], mock.clone());

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["https://www.youtube.com/@MrBeast".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let jobs = harness.state.jobs_for_run(result.run_id);
    assert_eq!(jobs[0].status, JobStatus::Done);
    assert_eq!(jobs[0].youtube_channel_id.as_deref(), Some("UCX6OQ3DkcsbYNE6H8uQQuVA"));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn unknown_handle_fails_the_job_and_still_finalizes() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(TransportResponse::Ok(serde_json::json!({ "items": [] })));
    let harness = Harness::new(vec!["k1"], mock);

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["@totally-unknown-handle".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let run = harness.state.get_run(result.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    let summary = run.summary.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.done, 0);
}

#[tokio::test]
async fn custom_url_needs_search_fallback_and_still_finalizes() {
    let mock = Arc::new(MockTransport::new());
    let harness = Harness::new(vec!["k1"], mock.clone());

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["https://www.youtube.com/c/PewDiePie".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let run = harness.state.get_run(result.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.summary.unwrap().needs_search, 1);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn quota_error_rotates_across_two_keys_within_one_job() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(TransportResponse::Http {
        status: 403,
        body: serde_json::json!({ "error": { "errors": [{ "reason": "quotaExceeded" }] } }),
    });
    mock.push_response(TransportResponse::Ok(serde_json::json!({
        "items": [{ "id": "UCX6OQ3DkcsbYNE6H8uQQuVA" }]
    })));
    let harness = Harness::new(vec!["k1", "k2"], mock.clone());

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["@SomeHandle".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let jobs = harness.state.jobs_for_run(result.run_id);
    assert_eq!(jobs[0].status, JobStatus::Done);
    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].key, calls[1].key);
}

#[tokio::test]
async fn finalizer_computes_nonnegative_duration_seconds() {
    let mock = Arc::new(MockTransport::new());
    let harness = Harness::new(vec!["k1"], mock);

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["UC-lHJZR3Gqxm24_Vd_AJ5Yw".to_string()])
        .await
        .unwrap();
    harness.drain().await;

    let run = harness.state.get_run(result.run_id).unwrap();
    let summary = run.summary.unwrap();
    assert!(summary.duration_seconds >= 0.0);
}

#[tokio::test]
async fn zero_surviving_inputs_finalizes_synchronously_with_empty_summary() {
    let mock = Arc::new(MockTransport::new());
    let harness = Harness::new(vec!["k1"], mock.clone());

    let result = harness
        .orchestrator
        .start_run(1, "tenant-a", &["   ".to_string(), "".to_string()])
        .await
        .unwrap();

    let run = harness.state.get_run(result.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    let summary = run.summary.unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.duration_seconds, 0.0);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn duplicate_inputs_after_trimming_collapse_to_one_job() {
    let mock = Arc::new(MockTransport::new());
    let harness = Harness::new(vec!["k1"], mock);

    let result = harness
        .orchestrator
        .start_run(
            1,
            "tenant-a",
            &[
                "UC-lHJZR3Gqxm24_Vd_AJ5Yw".to_string(),
                " UC-lHJZR3Gqxm24_Vd_AJ5Yw ".to_string(),
            ],
        )
        .await
        .unwrap();

    assert_eq!(result.total_jobs, 1);
    harness.drain().await;
    let run = harness.state.get_run(result.run_id).unwrap();
    assert_eq!(run.summary.unwrap().total, 1);
}
