use super::Record;

/// Point-in-time copy of one stream's buffered history.
#[derive(Debug, Clone)]
pub struct StreamSlice {
    pub stream_id: u32,
    /// Absolute index of `records[0]` within the stream's full history
    /// (total records ever appended minus the window length). Lets the
    /// persistence writer keep an eviction-proof flush cursor.
    pub base: u64,
    pub records: Vec<Record>,
}

/// Immutable snapshot handed across the thread boundary: one slice per
/// known stream id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub streams: Vec<StreamSlice>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.streams.iter().map(|s| s.records.len()).sum()
    }
}
