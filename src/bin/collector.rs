//! Demo/integration binary: wires the in-memory/in-process reference
//! implementations together, starts a small worker pool, submits one Run
//! from `--input` flags (or stdin, one input per line) and prints the
//! final run status as JSON once it converges.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use collector::config::Config;
use collector::counters::CounterService;
use collector::counters::InMemoryCounterService;
use collector::queue::InProcessQueue;
use collector::queue::WorkItem;
use collector::queue::WorkQueue;
use collector::state::InMemoryState;
use collector::state::StateStore;
use collector::youtube::HttpTransport;
use collector::Finalizer;
use collector::JobWorker;
use collector::Orchestrator;
use collector::Pipeline;
use collector::RateLimiter;
use collector::SystemClock;
use collector::YouTubeClient;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collector", about = "Submit a batch of channel inputs for resolution")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// A channel input to resolve. Repeat for multiple; reads stdin (one
    /// per line) if omitted entirely.
    #[arg(long)]
    input: Vec<String>,

    #[arg(long, default_value = "cli-user")]
    owner_id: String,

    #[arg(long, default_value_t = 1)]
    analysis_id: u64,

    /// Number of concurrent worker tasks draining the queue.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let clock = Arc::new(SystemClock);
    let soft_ttl = cli.config.soft_ttl();

    let rotator = match cli.config.key_rotator(clock.clone()) {
        Ok(rotator) => Arc::new(rotator),
        Err(err) => {
            tracing::error!(%err, "invalid configuration, refusing to start");
            std::process::exit(1);
        }
    };

    let state: Arc<dyn StateStore> = Arc::new(InMemoryState::new());
    let counters: Arc<dyn CounterService> = Arc::new(InMemoryCounterService::new());
    let limiter = Arc::new(RateLimiter::new(counters.clone(), clock.clone()));
    let pipeline = Arc::new(Pipeline::new(rotator, limiter));
    let transport = Arc::new(HttpTransport::new(reqwest::Client::new()));
    let youtube_client = Arc::new(YouTubeClient::new(pipeline, transport));

    let (queue, receiver) = InProcessQueue::new();
    let queue: Arc<dyn WorkQueue> = Arc::new(queue);
    let receiver = Arc::new(Mutex::new(receiver));

    let finalizer = Arc::new(Finalizer::new(state.clone(), counters, clock.clone()));
    let orchestrator = Arc::new(Orchestrator::new(state.clone(), queue.clone(), clock.clone(), finalizer));
    let worker = Arc::new(JobWorker::new(state.clone(), youtube_client, queue, clock).with_soft_ttl(soft_ttl));

    for worker_id in 0..cli.workers.max(1) {
        let worker = worker.clone();
        let orchestrator = orchestrator.clone();
        let receiver = receiver.clone();
        tokio::spawn(async move {
            loop {
                let item = { receiver.lock().await.recv().await };
                let Some(item) = item else {
                    tracing::debug!(worker_id, "queue closed, worker exiting");
                    break;
                };
                match item {
                    WorkItem::ProcessJob { job_id, run_id } => worker.process(job_id, run_id).await,
                    WorkItem::FinalizeRun { run_id } => {
                        if let Err(err) = orchestrator.try_finalize(run_id).await {
                            tracing::warn!(run_id, %err, "finalize attempt failed");
                        }
                    }
                }
            }
        });
    }

    let inputs = if cli.input.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .collect()
    } else {
        cli.input
    };

    let start = match orchestrator.start_run(cli.analysis_id, &cli.owner_id, &inputs).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(%err, "failed to start run");
            std::process::exit(1);
        }
    };

    loop {
        let Some(view) = orchestrator.get_run_status(start.run_id) else {
            break;
        };
        if view.run_status == collector::RunStatus::Finished {
            println!("{}", serde_json::to_string_pretty(&view).expect("status view always serializes"));
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
