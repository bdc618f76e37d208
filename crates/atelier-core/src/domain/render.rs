//! Render jobs: asynchronous try-on renders driven by the job poller.

use serde::{Deserialize, Serialize};

use super::item::ImageRef;

/// Identifier assigned by the render service on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a render job as reported by the render service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled
        )
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Canceled => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs for one render: a base image, one or two garment images and a
/// caller-chosen variation discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    pub base_image: ImageRef,
    pub items: Vec<ImageRef>,
    pub variation: u32,
}

impl RenderRequest {
    pub const MAX_ITEMS: usize = 2;

    /// Returns `None` unless there are between one and two item images.
    pub fn new(base_image: ImageRef, items: Vec<ImageRef>, variation: u32) -> Option<Self> {
        if items.is_empty() || items.len() > Self::MAX_ITEMS {
            return None;
        }
        Some(Self {
            base_image,
            items,
            variation,
        })
    }
}

/// One status poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    pub status: JobStatus,
    #[serde(default)]
    pub output_images: Vec<ImageRef>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

impl PollReport {
    pub fn pending() -> Self {
        Self::with_status(JobStatus::Pending)
    }

    pub fn running() -> Self {
        Self::with_status(JobStatus::Running)
    }

    pub fn completed(images: Vec<ImageRef>) -> Self {
        Self {
            status: JobStatus::Completed,
            output_images: images,
            error_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            output_images: Vec::new(),
            error_reason: Some(reason.into()),
        }
    }

    pub fn canceled(reason: Option<String>) -> Self {
        Self {
            status: JobStatus::Canceled,
            output_images: Vec::new(),
            error_reason: reason,
        }
    }

    fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            output_images: Vec::new(),
            error_reason: None,
        }
    }
}

/// Local record of a submitted render job.
///
/// Status only moves forward (`pending` → `running` → terminal) and a
/// terminal job ignores every later report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderJob {
    pub id: JobId,
    pub request: RenderRequest,
    status: JobStatus,
    output_images: Vec<ImageRef>,
    error_reason: Option<String>,
    polls: u32,
    latency_ms: u64,
}

impl RenderJob {
    pub fn submitted(id: JobId, request: RenderRequest) -> Self {
        Self {
            id,
            request,
            status: JobStatus::Pending,
            output_images: Vec::new(),
            error_reason: None,
            polls: 0,
            latency_ms: 0,
        }
    }

    /// Apply a poll report. Returns `true` when the report changed the status.
    ///
    /// A `completed` report without outputs is not a usable result and is
    /// recorded as `running`.
    pub fn observe(&mut self, report: PollReport) -> bool {
        self.polls += 1;
        if self.status.is_terminal() {
            return false;
        }

        let next = match report.status {
            JobStatus::Completed if report.output_images.is_empty() => JobStatus::Running,
            other => other,
        };
        if next.rank() < self.status.rank() || next == self.status {
            return false;
        }

        self.status = next;
        match next {
            JobStatus::Completed => self.output_images = report.output_images,
            JobStatus::Failed | JobStatus::Canceled => self.error_reason = report.error_reason,
            JobStatus::Pending | JobStatus::Running => {}
        }
        true
    }

    /// Count a poll attempt that produced no report (transport error or timeout).
    pub fn record_missed_poll(&mut self) {
        self.polls += 1;
    }

    pub fn set_latency_ms(&mut self, latency_ms: u64) {
        self.latency_ms = latency_ms;
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn output_images(&self) -> &[ImageRef] {
        &self.output_images
    }

    pub fn error_reason(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> RenderJob {
        let request = RenderRequest::new(
            ImageRef::from("/base.png"),
            vec![ImageRef::from("/top.png")],
            11,
        )
        .unwrap();
        RenderJob::submitted(JobId::new("job-1"), request)
    }

    #[test]
    fn request_requires_one_or_two_items() {
        let base = ImageRef::from("/base.png");
        assert!(RenderRequest::new(base.clone(), vec![], 1).is_none());
        assert!(RenderRequest::new(
            base.clone(),
            vec![ImageRef::from("a"), ImageRef::from("b"), ImageRef::from("c")],
            1
        )
        .is_none());
        assert!(RenderRequest::new(base, vec![ImageRef::from("a"), ImageRef::from("b")], 1).is_some());
    }

    #[test]
    fn status_never_moves_backwards() {
        let mut job = job();
        assert!(job.observe(PollReport::running()));
        assert!(!job.observe(PollReport::pending()));
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.polls(), 2);
    }

    #[test]
    fn terminal_job_is_never_resurrected() {
        let mut job = job();
        assert!(job.observe(PollReport::failed("garment not detected")));
        assert!(!job.observe(PollReport::completed(vec![ImageRef::from("/out.png")])));
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_reason(), Some("garment not detected"));
        assert!(job.output_images().is_empty());
    }

    #[test]
    fn completed_without_outputs_is_not_terminal() {
        let mut job = job();
        job.observe(PollReport::completed(vec![]));
        assert_eq!(job.status(), JobStatus::Running);

        job.observe(PollReport::completed(vec![ImageRef::from("/out.png")]));
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.output_images(), &[ImageRef::from("/out.png")]);
    }

    #[test]
    fn poll_report_deserializes_with_missing_fields() {
        let report: PollReport = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(report, PollReport::running());
    }
}
