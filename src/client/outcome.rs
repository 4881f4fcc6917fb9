//! Result of the optional steps that run after data is retrieved

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessStep {
    AttachResponse,
    WriteFile,
}

impl std::fmt::Display for PostProcessStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttachResponse => write!(f, "attach_response"),
            Self::WriteFile => write!(f, "write_file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostProcessOutcome {
    pub step: PostProcessStep,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl PostProcessOutcome {
    pub fn ok(step: PostProcessStep) -> Self {
        Self {
            step,
            status: OutcomeStatus::Ok,
        }
    }

    pub fn failed(step: PostProcessStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: OutcomeStatus::Failed(message.into()),
        }
    }

    pub fn skipped(step: PostProcessStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: OutcomeStatus::Skipped(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }

    /// Log the outcome; anything but success is a warning
    pub fn log(self) -> Self {
        match &self.status {
            OutcomeStatus::Ok => tracing::debug!(step = %self.step, "Post-processing step done"),
            OutcomeStatus::Failed(msg) => {
                tracing::warn!(step = %self.step, "Post-processing step failed: {}", msg)
            }
            OutcomeStatus::Skipped(msg) => {
                tracing::warn!(step = %self.step, "Post-processing step skipped: {}", msg)
            }
        }
        self
    }
}

impl std::fmt::Display for PostProcessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            OutcomeStatus::Ok => write!(f, "{}: ok", self.step),
            OutcomeStatus::Failed(msg) => write!(f, "{}: failed ({})", self.step, msg),
            OutcomeStatus::Skipped(msg) => write!(f, "{}: skipped ({})", self.step, msg),
        }
    }
}
