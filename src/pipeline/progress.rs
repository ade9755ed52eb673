use serde::Serialize;
use std::fmt;

/// Stages a document moves through, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStage {
    Validating,
    Preprocessing,
    ExtractingLocal,
    ExtractingRemote,
    Parsing,
    Complete,
    Error,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Preprocessing => "preprocessing",
            Self::ExtractingLocal => "extracting-local",
            Self::ExtractingRemote => "extracting-remote",
            Self::Parsing => "parsing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient notification pushed to the caller's progress callback.
/// Never stored; the callback is the only notification mechanism.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub message: Option<String>,
    pub fraction_complete: Option<f32>,
    /// 1-based position within the current batch.
    pub file_index: Option<usize>,
    pub total_files: Option<usize>,
}

impl ProgressEvent {
    pub fn stage(stage: ProgressStage) -> Self {
        Self {
            stage,
            message: None,
            fraction_complete: None,
            file_index: None,
            total_files: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_fraction(mut self, fraction: f32) -> Self {
        self.fraction_complete = Some(fraction.clamp(0.0, 1.0));
        self
    }

    pub fn with_file(mut self, index: usize, total: usize) -> Self {
        self.file_index = Some(index);
        self.total_files = Some(total);
        self
    }
}

/// Callback signature shared by every long-running pipeline call.
pub type ProgressFn<'a> = &'a dyn Fn(ProgressEvent);

/// Forward an event to the callback when one is installed.
pub fn emit(progress: Option<ProgressFn<'_>>, event: ProgressEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}
