//! Submit-then-poll protocol tests, on the paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::domain::{ImageRef, JobStatus, RenderRequest, RoundError};
use atelier_core::fakes::{RenderScript, ScriptedRenderService};
use atelier_core::poller::{JobOutcome, JobPoller, PollPolicy};
use atelier_core::tools::ToolBox;
use atelier_core::RoundConfig;
use tokio::time::Instant;

fn request() -> RenderRequest {
    RenderRequest::new(
        ImageRef::from("/static/model.png"),
        vec![ImageRef::from("/tops/tee.png"), ImageRef::from("/bottoms/chinos.png")],
        11,
    )
    .unwrap()
}

fn toolbox(render: &Arc<ScriptedRenderService>) -> ToolBox {
    ToolBox::new().with_render_service(render.clone())
}

#[tokio::test(start_paused = true)]
async fn completes_when_outputs_arrive() {
    let render = Arc::new(ScriptedRenderService::completing_after(4));
    let started = Instant::now();

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    let job = match outcome {
        JobOutcome::Completed(job) => job,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.polls(), 4);
    assert_eq!(job.output_images().len(), 1);
    // Three sleeps of 3 s between four polls.
    assert_eq!(started.elapsed(), Duration::from_secs(9));
    assert_eq!(job.latency_ms(), 9_000);
}

#[tokio::test(start_paused = true)]
async fn never_terminal_job_times_out_after_exactly_thirty_polls() {
    let render = Arc::new(ScriptedRenderService::never_finishing());
    let started = Instant::now();

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    assert!(matches!(outcome, JobOutcome::TimedOut(_)));
    assert_eq!(render.polls(), 30);
    assert_eq!(render.submits(), 1, "submission is never retried");
    // No sleep after the last attempt.
    assert_eq!(started.elapsed(), Duration::from_secs(87));

    match outcome.into_result() {
        Err(RoundError::JobTimeout { attempts, .. }) => assert_eq!(attempts, 30),
        other => panic!("expected JobTimeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn failed_job_carries_upstream_reason() {
    let render = Arc::new(ScriptedRenderService::failing("garment image unreadable"));

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    assert!(matches!(outcome, JobOutcome::Failed(_)));
    assert_eq!(render.polls(), 1);
    match outcome.into_result() {
        Err(RoundError::JobFailed { reason, .. }) => {
            assert_eq!(reason, "garment image unreadable")
        }
        other => panic!("expected JobFailed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn canceled_job_is_a_failure() {
    let render = Arc::new(ScriptedRenderService::new(RenderScript::Cancel));

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    let job = outcome.job().unwrap();
    assert_eq!(job.status(), JobStatus::Canceled);
    assert_eq!(job.error_reason(), Some("canceled upstream"));
    assert_eq!(outcome.into_result().unwrap_err().kind(), "job_failed");
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_is_never_polled() {
    let render = Arc::new(ScriptedRenderService::rejecting("quota exceeded"));

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    assert!(!outcome.was_submitted());
    assert_eq!(render.submits(), 1);
    assert_eq!(render.polls(), 0);
    match outcome.into_result() {
        Err(RoundError::ToolUnavailable(error)) => {
            assert_eq!(error.tool(), "submit_render_job");
            assert!(error.to_string().contains("quota exceeded"));
        }
        other => panic!("expected ToolUnavailable, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn poll_errors_consume_attempts_but_polling_continues() {
    let render = Arc::new(ScriptedRenderService::completing_after(3).with_poll_errors(2));

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    let job = outcome.job().unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn poll_errors_count_toward_the_attempt_budget() {
    let render = Arc::new(ScriptedRenderService::completing_after(5).with_poll_errors(5));
    let poller = JobPoller::new(PollPolicy {
        interval: Duration::from_secs(3),
        max_attempts: 5,
    });

    let outcome = poller.run(&toolbox(&render), request()).await;

    assert!(matches!(outcome, JobOutcome::TimedOut(_)));
    assert_eq!(outcome.job().unwrap().polls(), 5);
}

#[tokio::test(start_paused = true)]
async fn completed_without_outputs_keeps_polling() {
    let render = Arc::new(ScriptedRenderService::new(RenderScript::CompleteAfter {
        polls: 1,
        images: 0,
    }));

    let outcome = JobPoller::default().run(&toolbox(&render), request()).await;

    assert!(matches!(outcome, JobOutcome::TimedOut(_)));
    assert_eq!(render.polls(), 30);
    assert_eq!(outcome.job().unwrap().status(), JobStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn slow_polls_hit_the_per_call_timeout() {
    let render = Arc::new(
        ScriptedRenderService::completing_after(1).with_poll_latency(Duration::from_secs(10)),
    );
    let tools = toolbox(&render).with_call_timeout(Duration::from_secs(1));
    let poller = JobPoller::new(PollPolicy {
        interval: Duration::from_secs(3),
        max_attempts: 4,
    });
    let started = Instant::now();

    let outcome = poller.run(&tools, request()).await;

    assert!(matches!(outcome, JobOutcome::TimedOut(_)));
    // Three 1 s timeouts and three 3 s sleeps reach the 12 s ceiling
    // before a fourth attempt can start.
    assert_eq!(outcome.job().unwrap().polls(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn slow_status_endpoint_cannot_outlast_the_polling_ceiling() {
    let config = RoundConfig::default();
    let render = Arc::new(
        ScriptedRenderService::never_finishing().with_poll_latency(Duration::from_secs(29)),
    );
    let tools = toolbox(&render).with_call_timeout(config.tool_timeout());
    let poller = JobPoller::new(PollPolicy::from(&config));
    let started = Instant::now();

    let outcome = poller.run(&tools, request()).await;

    assert!(matches!(outcome, JobOutcome::TimedOut(_)));
    assert_eq!(started.elapsed(), Duration::from_secs(90));
    assert_eq!(outcome.job().unwrap().latency_ms(), 90_000);
    match outcome.into_result() {
        Err(RoundError::JobTimeout { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected JobTimeout, got {other:?}"),
    }
}
