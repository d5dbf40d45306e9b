use serde::{Deserialize, Serialize};

/// One addressee of a job, as supplied by the caller.
///
/// `identifier` is the raw string used for resolution (handle, numeric id,
/// supergroup id); `display_name` is what the caller sees in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub identifier: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// Lifecycle state of a job. `Sent` and `Failed` are terminal — a job
/// transitions out of `Pending` at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Sent,
    Failed,
}

impl JobStatus {
    /// `true` for `Sent` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Sent => "sent",
            JobStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A staged attachment reference persisted with a job.
///
/// `storage_path` points into the media staging area and is only valid while
/// the job is `pending`; reclaim happens at the terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub original_name: String,
    pub storage_path: String,
    pub size: u64,
    pub content_type: String,
}

/// A persisted outbound-message job, immediate or scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Store-assigned rowid — monotonic enough to order by creation.
    pub id: i64,
    /// Account the job belongs to; used for authorization and filtering.
    pub owner: String,
    /// Send order is insertion order.
    pub recipients: Vec<Recipient>,
    /// May be empty only when `media_refs` is non-empty.
    pub body: String,
    /// Tolerant timestamp string; normalized by the scheduler, never mutated
    /// after creation.
    pub scheduled_for: String,
    pub status: JobStatus,
    /// RFC3339; set by the store at insert.
    pub created_at: String,
    /// Set exactly once, at the first terminal transition.
    pub executed_at: Option<String>,
    /// Empty for text-only jobs.
    #[serde(default)]
    pub media_refs: Vec<MediaRef>,
}

impl ScheduledJob {
    pub fn has_media(&self) -> bool {
        !self.media_refs.is_empty()
    }
}

/// An in-memory attachment handle, produced by media staging and consumed by
/// the platform send call.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Outcome of one send attempt to one recipient. Not persisted individually;
/// aggregated into the job's terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    #[serde(rename = "recipient")]
    pub recipient_display_name: String,
    pub identifier: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn ok(recipient: &Recipient) -> Self {
        Self {
            recipient_display_name: recipient.display_name.clone(),
            identifier: recipient.identifier.clone(),
            success: true,
            error: None,
        }
    }

    pub fn failed(recipient: &Recipient, error: impl Into<String>) -> Self {
        Self {
            recipient_display_name: recipient.display_name.clone(),
            identifier: recipient.identifier.clone(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of one dispatch batch, returned to callers alongside the
/// per-recipient breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub sent_count: usize,
    pub failed_count: usize,
    pub results: Vec<DispatchResult>,
}

impl DispatchSummary {
    pub fn from_results(results: Vec<DispatchResult>) -> Self {
        let sent_count = results.iter().filter(|r| r.success).count();
        Self {
            sent_count,
            failed_count: results.len() - sent_count,
            results,
        }
    }

    /// Job-level terminal status: partial success still counts as `sent`.
    pub fn job_status(&self) -> JobStatus {
        if self.sent_count > 0 {
            JobStatus::Sent
        } else {
            JobStatus::Failed
        }
    }
}
