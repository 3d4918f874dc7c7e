//! Trigger-file task.

use crate::tasks::Pollable;
use sf_protocol::task_models::TaskResult;
use std::path::{Path, PathBuf};

/// Succeeds the first time its path is observed on disk.
///
/// The file may appear at any moment between two polls; the task never
/// reports success before it has actually seen the file.
#[derive(Debug, Clone)]
pub struct WaitForFileTask {
    path: PathBuf,
}

impl WaitForFileTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Pollable for WaitForFileTask {
    fn poll(&mut self) -> Option<TaskResult> {
        if self.path.exists() {
            Some(TaskResult::success(format!(
                "Found {}",
                self.path.display()
            )))
        } else {
            None
        }
    }
}
