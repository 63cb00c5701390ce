//! Append-only store of stage outputs.

use crate::core::{StageOutput, StageRecord};
use crate::errors::OutputConflictError;

/// Stage outputs in the order they were recorded.
///
/// Each stage may record exactly one output; a second write is an
/// `OutputConflictError`.
#[derive(Debug, Clone, Default)]
pub struct OutputBag {
    records: Vec<StageRecord>,
}

impl OutputBag {
    /// Creates a new empty output bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a stage's result.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the stage already has an output.
    pub fn insert(&mut self, record: StageRecord) -> Result<(), OutputConflictError> {
        if self.contains(&record.name) {
            return Err(OutputConflictError::new(&record.name));
        }
        self.records.push(record);
        Ok(())
    }

    /// Gets the output for a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&StageOutput> {
        self.record(stage).map(|r| &r.output)
    }

    /// Gets the full record for a stage.
    #[must_use]
    pub fn record(&self, stage: &str) -> Option<&StageRecord> {
        self.records.iter().find(|r| r.name == stage)
    }

    /// Checks if output exists for a stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.records.iter().any(|r| r.name == stage)
    }

    /// Returns the most recently recorded output.
    #[must_use]
    pub fn last(&self) -> Option<&StageRecord> {
        self.records.last()
    }

    /// Iterates records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StageRecord> {
        self.records.iter()
    }

    /// Returns the number of recorded stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consumes the bag, returning records in insertion order.
    #[must_use]
    pub fn into_records(self) -> Vec<StageRecord> {
        self.records
    }
}
