use serde::{Deserialize, Serialize};

/// Outcome of a single logged step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Started,
    Ok,
    Skipped,
    Warning,
    Failed,
}

/// A single entry in the run log (JSON lines format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub run_id: String,
    pub operation: String,
    pub app: Option<String>,
    pub step: String,
    pub status: StepStatus,
    pub detail: Option<String>,
}
