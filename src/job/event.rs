use std::path::PathBuf;

use serde::Serialize;

/// Lifecycle notifications of one job, in emission order. `Finished` is
/// always the last one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecompileEvent {
    Starting,
    Progress(Progress),
    Finished(Outcome),
}

impl DecompileEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, DecompileEvent::Finished(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub label: String,
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(label: impl Into<String>, completed: usize, total: usize) -> Self {
        Self {
            label: label.into(),
            completed,
            total,
        }
    }

    pub fn percentage(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.completed * 100 / self.total
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { output_dir: PathBuf, file_count: usize },
    Error { message: String },
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_empty_total() {
        assert_eq!(Progress::new("x", 0, 0).percentage(), 0);
        assert_eq!(Progress::new("x", 1, 3).percentage(), 33);
        assert_eq!(Progress::new("x", 3, 3).percentage(), 100);
    }

    #[test]
    fn events_serialize_with_tags() {
        let json = serde_json::to_string(&DecompileEvent::Progress(Progress::new("Found 3 classes", 0, 3)))
            .unwrap();
        assert_eq!(
            json,
            r#"{"event":"progress","label":"Found 3 classes","completed":0,"total":3}"#
        );
        let json = serde_json::to_string(&DecompileEvent::Finished(Outcome::Cancelled)).unwrap();
        assert_eq!(json, r#"{"event":"finished","status":"cancelled"}"#);
        assert_eq!(
            serde_json::to_string(&DecompileEvent::Starting).unwrap(),
            r#"{"event":"starting"}"#
        );
    }
}
