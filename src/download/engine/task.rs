//! Tasks handed to the dispatcher and the records it hands back.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::download::filename::{disambiguate_stems, stem_and_extension_from_url};

/// One URL to fetch, with its place in the caller's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Position in the caller's list; records are sorted by it.
    pub index: usize,
    /// Source URL.
    pub url: String,
    /// File name without extension.
    pub target_stem: String,
    /// Extension including the leading dot.
    pub ext_hint: String,
}

impl DownloadTask {
    /// Creates a task with an explicit target name.
    pub fn new(
        index: usize,
        url: impl Into<String>,
        target_stem: impl Into<String>,
        ext_hint: impl Into<String>,
    ) -> Self {
        Self {
            index,
            url: url.into(),
            target_stem: target_stem.into(),
            ext_hint: ext_hint.into(),
        }
    }

    /// `<stem><ext>`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{}", self.target_stem, self.ext_hint)
    }

    /// Final path of this task inside `target_dir`.
    #[must_use]
    pub fn final_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(self.file_name())
    }
}

/// Builds tasks from `urls`, numbering them from 0 in order.
///
/// Names come from each URL's last path segment. Two URLs that would land
/// on the same file get `_2`, `_3`, ... suffixes in list order, so the same
/// list always maps to the same targets.
#[must_use]
pub fn build_tasks<S: AsRef<str>>(urls: &[S]) -> Vec<DownloadTask> {
    let mut names: Vec<(String, String)> = urls
        .iter()
        .map(|url| stem_and_extension_from_url(url.as_ref()))
        .collect();
    disambiguate_stems(&mut names);

    urls.iter()
        .zip(names)
        .enumerate()
        .map(|(index, (url, (stem, ext)))| {
            DownloadTask::new(index, url.as_ref().trim(), stem, ext)
        })
        .collect()
}

/// Outcome of one task. Exactly one per task, whatever happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    /// Task index.
    pub index: usize,
    /// Source URL.
    pub url: String,
    /// `<stem><ext>`.
    pub filename: String,
    /// Target directory.
    pub download_path: String,
    /// Final file path (the intended one when the task failed).
    pub saved_path: String,
    /// Extension including the leading dot.
    pub ext: String,
    /// Target already existed; nothing was fetched.
    pub skipped: bool,
    /// Terminal failure message, if any.
    pub error: Option<String>,
}

impl ResultRecord {
    fn base(task: &DownloadTask, target_dir: &Path) -> Self {
        Self {
            index: task.index,
            url: task.url.clone(),
            filename: task.file_name(),
            download_path: target_dir.display().to_string(),
            saved_path: task.final_path(target_dir).display().to_string(),
            ext: task.ext_hint.clone(),
            skipped: false,
            error: None,
        }
    }

    /// Record for a task whose target already existed.
    #[must_use]
    pub fn skipped(task: &DownloadTask, target_dir: &Path) -> Self {
        Self {
            skipped: true,
            ..Self::base(task, target_dir)
        }
    }

    /// Record for a task that finished successfully.
    #[must_use]
    pub fn completed(task: &DownloadTask, target_dir: &Path) -> Self {
        Self::base(task, target_dir)
    }

    /// Record for a task that failed for good.
    #[must_use]
    pub fn failed(task: &DownloadTask, target_dir: &Path, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(task, target_dir)
        }
    }

    /// No error recorded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Fetched during this run.
    pub completed: usize,
    /// Already present before the run.
    pub skipped: usize,
    /// Carrying an error.
    pub failed: usize,
}

impl BatchSummary {
    /// Tallies `records`.
    #[must_use]
    pub fn from_records(records: &[ResultRecord]) -> Self {
        records.iter().fold(Self::default(), |mut summary, record| {
            if record.error.is_some() {
                summary.failed += 1;
            } else if record.skipped {
                summary.skipped += 1;
            } else {
                summary.completed += 1;
            }
            summary
        })
    }

    /// Records in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    /// At least one record failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
