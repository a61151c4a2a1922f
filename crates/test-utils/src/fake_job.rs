use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use msrunner::errors::{OrchestratorError, Result};
use msrunner::job::{BoxFuture, CompletionFuture, Job, JobSpec};

/// Shared record of what fake jobs did, in order.
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    running: Vec<String>,
    weight: f64,
    peak_weight: f64,
    peak_jobs: usize,
    events: Vec<String>,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self, name: &str, weight: f64) {
        let mut s = self.state.lock().unwrap();
        s.running.push(name.to_string());
        s.weight += weight;
        s.peak_weight = s.peak_weight.max(s.weight);
        s.peak_jobs = s.peak_jobs.max(s.running.len());
        s.events.push(format!("start {name}"));
    }

    fn exit(&self, name: &str, weight: f64) {
        let mut s = self.state.lock().unwrap();
        s.running.retain(|n| n != name);
        s.weight -= weight;
        s.events.push(format!("end {name}"));
    }

    /// Highest total weight of fake jobs running at once.
    pub fn peak_weight(&self) -> f64 {
        self.state.lock().unwrap().peak_weight
    }

    /// Highest number of fake jobs running at once.
    pub fn peak_jobs(&self) -> usize {
        self.state.lock().unwrap().peak_jobs
    }

    /// `start X` / `end X` entries in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }
}

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    Fail(String),
    FinishIncomplete,
}

/// A job that sleeps instead of launching anything and records what it saw.
#[derive(Debug)]
pub struct FakeJob {
    spec: JobSpec,
    completion: CompletionFuture,
    behaviour: Behaviour,
    duration: Duration,
    result: String,
    started_elsewhere: AtomicBool,
    outputs_ready: AtomicBool,
    runs: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    tracker: Arc<ConcurrencyTracker>,
}

impl FakeJob {
    pub fn builder(summary: &str, weight: f64) -> FakeJobBuilder {
        FakeJobBuilder {
            spec: JobSpec::new(summary, weight).with_program("fake"),
            behaviour: Behaviour::Succeed,
            duration: Duration::from_millis(20),
            result: format!("/out/{summary}"),
            started_elsewhere: false,
            outputs_ready: false,
            tracker: ConcurrencyTracker::new(),
        }
    }

    /// How many times the scheduler called `run`.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Command lines this job built while running.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Make the outputs appear, as if another machine finished the job.
    pub fn finish_elsewhere(&self) {
        self.outputs_ready.store(true, Ordering::SeqCst);
    }
}

impl Job for FakeJob {
    fn spec(&self) -> &JobSpec {
        &self.spec
    }

    fn completion(&self) -> &CompletionFuture {
        &self.completion
    }

    fn has_started_externally(&self) -> bool {
        self.started_elsewhere.load(Ordering::SeqCst) || self.outputs_ready.load(Ordering::SeqCst)
    }

    fn is_completed(&self) -> bool {
        if self.outputs_ready.load(Ordering::SeqCst) {
            self.completion.resolve(self.result.as_str());
            true
        } else {
            false
        }
    }

    fn prompt(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match &self.spec.dependency {
                Some(dep) => format!("fake {} --input {}", self.spec.summary, dep.wait().await),
                None => format!("fake {}", self.spec.summary),
            }
        })
    }

    fn run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let prompt = self.prompt().await;
            self.prompts.lock().unwrap().push(prompt);

            self.tracker.enter(&self.spec.summary, self.spec.weight);
            tokio::time::sleep(self.duration).await;
            self.tracker.exit(&self.spec.summary, self.spec.weight);

            match &self.behaviour {
                Behaviour::Succeed => {
                    self.outputs_ready.store(true, Ordering::SeqCst);
                    Ok(())
                }
                Behaviour::Fail(msg) => Err(OrchestratorError::Other(anyhow::anyhow!(msg.clone()))),
                Behaviour::FinishIncomplete => Ok(()),
            }
        })
    }
}

pub struct FakeJobBuilder {
    spec: JobSpec,
    behaviour: Behaviour,
    duration: Duration,
    result: String,
    started_elsewhere: bool,
    outputs_ready: bool,
    tracker: Arc<ConcurrencyTracker>,
}

impl FakeJobBuilder {
    pub fn depends_on(mut self, other: &FakeJob) -> Self {
        self.spec = self.spec.depends_on(other.completion().clone());
        self
    }

    pub fn tracked_by(mut self, tracker: &Arc<ConcurrencyTracker>) -> Self {
        self.tracker = Arc::clone(tracker);
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration = Duration::from_millis(ms);
        self
    }

    pub fn result(mut self, value: &str) -> Self {
        self.result = value.to_string();
        self
    }

    pub fn failing(mut self, msg: &str) -> Self {
        self.behaviour = Behaviour::Fail(msg.to_string());
        self
    }

    pub fn finishing_without_outputs(mut self) -> Self {
        self.behaviour = Behaviour::FinishIncomplete;
        self
    }

    /// Outputs already complete before the run starts.
    pub fn already_complete(mut self) -> Self {
        self.outputs_ready = true;
        self
    }

    /// Output directory exists but the outputs are not complete yet.
    pub fn running_elsewhere(mut self) -> Self {
        self.started_elsewhere = true;
        self
    }

    pub fn build(self) -> Arc<FakeJob> {
        Arc::new(FakeJob {
            spec: self.spec,
            completion: CompletionFuture::new(),
            behaviour: self.behaviour,
            duration: self.duration,
            result: self.result,
            started_elsewhere: AtomicBool::new(self.started_elsewhere),
            outputs_ready: AtomicBool::new(self.outputs_ready),
            runs: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            tracker: self.tracker,
        })
    }
}
