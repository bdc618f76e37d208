//! Render job poller.
//!
//! Submits one render request and polls it until it reaches a terminal state
//! or the attempt budget runs out. Submission is never retried; a failed poll
//! call (transport error or per-call timeout) costs one attempt and polling
//! continues. Polling as a whole never outlasts `interval * max_attempts`,
//! however slowly the status endpoint answers.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RoundConfig;
use crate::domain::{JobStatus, RenderJob, RenderRequest, RoundError, ToolError};
use crate::obs;
use crate::tools::ToolBox;

/// Interval and attempt budget for status polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 30,
        }
    }
}

impl PollPolicy {
    /// Longest time a job may spend being polled.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl From<&RoundConfig> for PollPolicy {
    fn from(config: &RoundConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.poll_attempts,
        }
    }
}

/// Tagged result of driving one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Upstream completed the job with at least one output image.
    Completed(RenderJob),
    /// Upstream reported `failed` or `canceled`.
    Failed(RenderJob),
    /// No terminal status within the attempt budget.
    TimedOut(RenderJob),
    /// Submission itself failed; nothing was polled.
    Rejected(ToolError),
}

impl JobOutcome {
    /// The job record, if the render service accepted the submission.
    pub fn job(&self) -> Option<&RenderJob> {
        match self {
            JobOutcome::Completed(job) | JobOutcome::Failed(job) | JobOutcome::TimedOut(job) => {
                Some(job)
            }
            JobOutcome::Rejected(_) => None,
        }
    }

    pub fn was_submitted(&self) -> bool {
        self.job().is_some()
    }

    /// Map onto the round error taxonomy.
    pub fn into_result(self) -> Result<RenderJob, RoundError> {
        match self {
            JobOutcome::Completed(job) => Ok(job),
            JobOutcome::Failed(job) => Err(RoundError::JobFailed {
                reason: job
                    .error_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("job {}", job.status())),
                job_id: job.id,
            }),
            JobOutcome::TimedOut(job) => Err(RoundError::JobTimeout {
                attempts: job.polls(),
                job_id: job.id,
            }),
            JobOutcome::Rejected(error) => Err(RoundError::ToolUnavailable(error)),
        }
    }
}

/// Stateless driver for the submit-then-poll protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobPoller {
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submit `request` and poll it to a terminal state or timeout.
    pub async fn run(&self, tools: &ToolBox, request: RenderRequest) -> JobOutcome {
        let started = Instant::now();
        let job_id = match tools.submit_render_job(&request).await {
            Ok(id) => id,
            Err(error) => {
                warn!(variation = request.variation, error = %error, "render submission failed");
                return JobOutcome::Rejected(error);
            }
        };
        debug!(job_id = %job_id, variation = request.variation, "render job submitted");

        let mut job = RenderJob::submitted(job_id, request);
        let deadline = Instant::now() + self.policy.ceiling();
        for attempt in 1..=self.policy.max_attempts {
            if Instant::now() >= deadline {
                break;
            }
            match tokio::time::timeout_at(deadline, tools.poll_render_job(&job.id)).await {
                Ok(Ok(report)) => {
                    if job.observe(report) {
                        debug!(job_id = %job.id, attempt = attempt, status = %job.status(), "render job status changed");
                    }
                }
                Ok(Err(error)) => {
                    job.record_missed_poll();
                    warn!(job_id = %job.id, attempt = attempt, error = %error, "render poll failed");
                }
                Err(_) => {
                    job.record_missed_poll();
                    warn!(job_id = %job.id, attempt = attempt, "render job reached its polling ceiling");
                    break;
                }
            }

            match job.status() {
                JobStatus::Completed => return finish(job, started, JobOutcome::Completed),
                JobStatus::Failed | JobStatus::Canceled => {
                    return finish(job, started, JobOutcome::Failed)
                }
                JobStatus::Pending | JobStatus::Running => {}
            }

            if attempt < self.policy.max_attempts {
                let wake = (Instant::now() + self.policy.interval).min(deadline);
                tokio::time::sleep_until(wake).await;
            }
        }

        finish(job, started, JobOutcome::TimedOut)
    }
}

fn finish(
    mut job: RenderJob,
    started: Instant,
    tag: fn(RenderJob) -> JobOutcome,
) -> JobOutcome {
    job.set_latency_ms(started.elapsed().as_millis() as u64);
    let outcome = tag(job);
    if let Some(job) = outcome.job() {
        let status = if matches!(outcome, JobOutcome::TimedOut(_)) {
            "timed_out"
        } else {
            job.status().as_str()
        };
        obs::emit_job_finished(job.id.as_str(), status, job.polls(), job.latency_ms());
    }
    outcome
}
