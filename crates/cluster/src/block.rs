//! In-memory data blocks and the loader seam that produces them.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use ember_common::Result;

/// Per-column value summary carried by a block, merged across blocks for
/// table-level histograms.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Values observed.
    pub count: u64,
    /// Nulls observed.
    pub nulls: u64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Sum of values.
    pub sum: f64,
}

impl ColumnSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &ColumnSummary) {
        if other.count == 0 && other.nulls == 0 {
            return;
        }
        if self.count == 0 {
            self.min = other.min;
            self.max = other.max;
        } else {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.count += other.count;
        self.nulls += other.nulls;
        self.sum += other.sum;
    }
}

/// One in-memory block plus its placement metadata.
///
/// Identity is structural over `(table, spec, sequence, time range, rows,
/// raw bytes)`; the payload and summaries ride along but do not
/// participate in equality, so a re-loaded block with identical shape
/// deduplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchBlock {
    /// Owning table.
    pub table: String,
    /// Spec id this block materializes.
    pub spec: String,
    /// Sequence number within the spec.
    pub sequence: u64,
    /// Inclusive start of the covered time range, unix seconds.
    pub start: i64,
    /// Inclusive end of the covered time range, unix seconds.
    pub end: i64,
    /// Row count.
    pub rows: u64,
    /// Raw data size in bytes.
    pub raw_bytes: u64,
    /// Opaque columnar payload. Empty in remote summaries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
    /// Per-column summaries, indexed by column position.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<ColumnSummary>,
}

impl PartialEq for BatchBlock {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
            && self.spec == other.spec
            && self.sequence == other.sequence
            && self.start == other.start
            && self.end == other.end
            && self.rows == other.rows
            && self.raw_bytes == other.raw_bytes
    }
}

impl Eq for BatchBlock {}

impl Hash for BatchBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.table.hash(state);
        self.spec.hash(state);
        self.sequence.hash(state);
        self.start.hash(state);
        self.end.hash(state);
        self.rows.hash(state);
        self.raw_bytes.hash(state);
    }
}

/// What a node needs to materialize the blocks of one spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    /// Owning table.
    pub table: String,
    /// Spec id.
    pub spec: String,
    /// Concrete source path to load.
    pub path: String,
    /// Spec version at send time.
    pub version: String,
}

/// Node-side seam turning a signature into loaded blocks.
///
/// The concrete loader (decoding source data into the columnar format) is
/// external; zero returned blocks is a valid outcome and marks the spec
/// empty for the current cycle.
pub trait BlockLoader: Send + Sync {
    /// Load all blocks for one signature.
    fn load(&self, sign: &BlockSignature) -> Result<Vec<BatchBlock>>;
}
