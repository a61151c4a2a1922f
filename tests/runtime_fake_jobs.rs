// tests/runtime_fake_jobs.rs

mod common;
use crate::common::builders::fast_options;
use crate::common::{ConcurrencyTracker, FakeJob, init_tracing, jobs, position, with_timeout};

use std::error::Error;
use std::time::Duration;

use msrunner::errors::OrchestratorError;
use msrunner::job::Job;
use msrunner::scheduler::TaskManager;
use msrunner::types::JobState;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn full_weight_jobs_run_one_after_another() -> TestResult {
    init_tracing();
    let tracker = ConcurrencyTracker::new();
    let a = FakeJob::builder("A", 1.0).tracked_by(&tracker).duration_ms(40).build();
    let b = FakeJob::builder("B", 1.0).tracked_by(&tracker).duration_ms(40).build();

    let manager = TaskManager::new(1.5, fast_options());
    let report = with_timeout(manager.run(jobs(&[&a, &b]))).await?;

    assert!(report.all_completed());
    assert_eq!(tracker.peak_jobs(), 1);
    assert_eq!(tracker.events(), vec!["start A", "end A", "start B", "end B"]);
    assert!(report.peak_weight <= 1.5);
    Ok(())
}

#[tokio::test]
async fn light_jobs_share_the_budget() -> TestResult {
    init_tracing();
    let tracker = ConcurrencyTracker::new();
    let list: Vec<_> = (0..4)
        .map(|i| {
            FakeJob::builder(&format!("light{i}"), 0.25)
                .tracked_by(&tracker)
                .duration_ms(80)
                .build()
        })
        .collect();
    let refs: Vec<_> = list.iter().collect();

    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&refs))).await?;

    assert!(report.all_completed());
    assert_eq!(tracker.peak_jobs(), 4);
    assert!((report.peak_weight - 1.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn independent_jobs_are_admitted_in_submission_order() -> TestResult {
    init_tracing();
    let tracker = ConcurrencyTracker::new();
    let names = ["first", "second", "third"];
    let list: Vec<_> = names
        .iter()
        .map(|n| FakeJob::builder(n, 1.0).tracked_by(&tracker).duration_ms(10).build())
        .collect();
    let refs: Vec<_> = list.iter().collect();

    let manager = TaskManager::new(1.0, fast_options());
    with_timeout(manager.run(jobs(&refs))).await?;

    let events = tracker.events();
    assert!(position(&events, "start first") < position(&events, "start second"));
    assert!(position(&events, "start second") < position(&events, "start third"));
    Ok(())
}

#[tokio::test]
async fn failed_job_releases_its_weight() -> TestResult {
    init_tracing();
    let tracker = ConcurrencyTracker::new();
    let a = FakeJob::builder("A", 1.0).tracked_by(&tracker).failing("boom").build();
    let b = FakeJob::builder("B", 1.0).tracked_by(&tracker).build();

    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&[&a, &b]))).await?;

    let a_out = report.outcome("A").ok_or("missing A")?;
    assert_eq!(a_out.state, JobState::Failed);
    assert!(a_out.error.as_deref().unwrap_or("").contains("boom"));
    assert!(!a.completion().is_resolved());

    assert_eq!(report.outcome("B").ok_or("missing B")?.state, JobState::Completed);
    assert_eq!(manager.budget().current_weight(), 0.0);
    Ok(())
}

#[tokio::test]
async fn finishing_without_outputs_is_a_failure() -> TestResult {
    init_tracing();
    let a = FakeJob::builder("A", 0.5).finishing_without_outputs().build();

    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&[&a]))).await?;

    assert!(!report.all_completed());
    assert_eq!(report.failed().count(), 1);
    assert_eq!(a.runs(), 1);
    Ok(())
}

#[tokio::test]
async fn dependent_runs_after_its_predecessor_with_its_value() -> TestResult {
    init_tracing();
    let tracker = ConcurrencyTracker::new();
    let lib = FakeJob::builder("library", 0.5)
        .tracked_by(&tracker)
        .result("/out/lib/SpectralLibrary.msp")
        .duration_ms(50)
        .build();
    let search = FakeJob::builder("search", 0.5)
        .tracked_by(&tracker)
        .depends_on(&lib)
        .build();

    // Submitted dependent-first: the dependency still gates the start.
    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&[&search, &lib]))).await?;

    assert!(report.all_completed());
    let events = tracker.events();
    assert!(position(&events, "end library") < position(&events, "start search"));
    assert_eq!(
        search.prompts(),
        vec!["fake search --input /out/lib/SpectralLibrary.msp"]
    );
    Ok(())
}

#[tokio::test]
async fn already_complete_job_is_not_run_again() -> TestResult {
    init_tracing();
    let a = FakeJob::builder("A", 1.0)
        .already_complete()
        .result("/data/A")
        .build();
    let c = FakeJob::builder("C", 1.0).depends_on(&a).build();

    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&[&a, &c]))).await?;

    assert_eq!(a.runs(), 0);
    assert_eq!(c.runs(), 1);
    let a_out = report.outcome("A").ok_or("missing A")?;
    assert!(!a_out.ran_here);
    assert_eq!(a_out.result.as_deref(), Some("/data/A"));
    assert_eq!(c.prompts(), vec!["fake C --input /data/A"]);
    Ok(())
}

#[tokio::test]
async fn job_running_elsewhere_is_polled_without_charging_weight() -> TestResult {
    init_tracing();
    let a = FakeJob::builder("A", 1.0).running_elsewhere().build();
    let b = FakeJob::builder("B", 1.0).duration_ms(10).build();
    let c = FakeJob::builder("C", 0.5).depends_on(&a).build();

    let (remote, observed) = (a.clone(), b.clone());
    let finisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let b_done_first = observed.completion().is_resolved();
        remote.finish_elsewhere();
        b_done_first
    });

    let manager = TaskManager::new(1.0, fast_options());
    let report = with_timeout(manager.run(jobs(&[&a, &b, &c]))).await?;

    assert!(report.all_completed());
    assert!(finisher.await?, "B should not wait for A's weight");
    assert_eq!(a.runs(), 0);
    assert_eq!(b.runs(), 1);
    assert_eq!(c.runs(), 1);
    assert!(!report.outcome("A").ok_or("missing A")?.ran_here);
    Ok(())
}

#[tokio::test]
async fn dependents_of_a_failed_job_never_start() {
    init_tracing();
    let a = FakeJob::builder("A", 1.0).failing("crashed").build();
    let b = FakeJob::builder("B", 1.0).depends_on(&a).build();

    let manager = TaskManager::new(1.0, fast_options());
    let run = manager.run(jobs(&[&a, &b]));
    let waited = tokio::time::timeout(Duration::from_millis(400), run).await;

    assert!(waited.is_err(), "run should still be waiting on B");
    assert_eq!(a.runs(), 1);
    assert_eq!(b.runs(), 0);
    assert_eq!(manager.budget().current_weight(), 0.0);
}

#[tokio::test]
async fn empty_job_list_is_rejected() {
    let manager = TaskManager::new(1.0, fast_options());
    let err = manager.run(Vec::new()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::EmptyJobList));
}

#[tokio::test]
async fn job_heavier_than_the_budget_is_rejected_before_anything_runs() {
    let a = FakeJob::builder("A", 0.5).build();
    let b = FakeJob::builder("B", 2.0).build();

    let manager = TaskManager::new(1.0, fast_options());
    let err = manager.run(jobs(&[&a, &b])).await.unwrap_err();

    match err {
        OrchestratorError::InvalidWeight { job, weight, .. } => {
            assert_eq!(job, "B");
            assert_eq!(weight, 2.0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(a.runs(), 0);
}
