use std::fmt;

/// Which pipeline a run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Backup,
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// Result of one application's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AppOutcome {
    Success(String),
    Skipped(String),
    Failed(String),
}

impl AppOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Success(d) | Self::Skipped(d) | Self::Failed(d) => d,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Aggregated per-application outcomes of one run, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub operation: Operation,
    pub outcomes: Vec<(String, AppOutcome)>,
    /// Run-level notes such as a degraded pull or forced guard.
    pub notes: Vec<String>,
    /// Remote sync failure; makes the run unsuccessful even if every app succeeded.
    pub sync_error: Option<String>,
}

impl RunSummary {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            outcomes: Vec::new(),
            notes: Vec::new(),
            sync_error: None,
        }
    }

    pub fn record(&mut self, app: &str, outcome: AppOutcome) {
        self.outcomes.push((app.to_string(), outcome));
    }

    #[cfg(test)]
    pub fn outcome(&self, app: &str) -> Option<&AppOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == app)
            .map(|(_, outcome)| outcome)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.sync_error.is_none()
    }
}
