//! Batch processing report.

use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// Outcome of a processing batch.
///
/// Counters only reflect operations that actually changed something.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    /// Total regex/literal matches replaced across all parts.
    pub replaced: usize,

    /// Parts created or overwritten.
    pub upserted: usize,

    /// Parts deleted.
    pub removed: usize,

    /// Parts moved.
    pub renamed: usize,

    /// Operations that failed, in batch order.
    pub errors: Vec<OperationError>,

    /// Time spent applying the batch.
    #[serde(rename = "durationMs", with = "duration_ms")]
    pub duration: Duration,
}

/// A failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    /// Operation type, e.g. `upsertPart`.
    pub op: String,
    /// Position of the operation in the batch.
    pub index: usize,
    /// Error description.
    pub message: String,
}

impl ProcessReport {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed operation.
    pub fn add_error(&mut self, op: &str, index: usize, message: String) {
        self.errors.push(OperationError {
            op: op.to_string(),
            index,
            message,
        });
    }

    /// Returns whether any operation failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of mutating operations that took effect,
    /// counting each replaced match.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.replaced + self.upserted + self.removed + self.renamed
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub(crate) mod duration_ms {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
