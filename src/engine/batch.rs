//! Per-item results of a batch run.

use std::path::{Path, PathBuf};

use super::tts::TTSError;

/// What happened to one input item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Audio written to this path.
    Written(PathBuf),
    /// Blank input, not attempted.
    Skipped,
    /// Generation or writing failed; the batch continued.
    Failed(TTSError),
}

/// One input item and its outcome.
#[derive(Debug)]
pub struct BatchItem {
    /// 1-based position in the input list.
    pub index: usize,
    pub text: String,
    pub outcome: ItemOutcome,
}

/// Ordered outcomes of a batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    /// Number of input items, blank ones included.
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Paths written, in input order.
    pub fn output_paths(&self) -> Vec<&Path> {
        self.items
            .iter()
            .filter_map(|item| match &item.outcome {
                ItemOutcome::Written(path) => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Written(_)))
    }

    pub fn failure_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Failed(_)))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Skipped))
    }

    /// Failed items with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&BatchItem, &TTSError)> {
        self.items.iter().filter_map(|item| match &item.outcome {
            ItemOutcome::Failed(err) => Some((item, err)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}
