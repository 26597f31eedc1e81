use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::info;

use crate::stream::ring::StreamBuffer;
use crate::types::{Sample, Snapshot, StreamSlice};

/// Maps stream ids to their buffers. Buffers are created lazily on first
/// sight of an id and live for the rest of the process; the first-seen
/// order is what consumers use to assign display slots, so it never
/// changes once established.
pub struct StreamRegistry {
    window: usize,
    buffers: HashMap<u32, StreamBuffer>,
    order: Vec<u32>,
    /// Units seen per id since the last rate log.
    packets: HashMap<u32, u64>,
}

impl StreamRegistry {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buffers: HashMap::new(),
            order: Vec::new(),
            packets: HashMap::new(),
        }
    }

    pub fn get_or_create(&mut self, stream_id: u32) -> &mut StreamBuffer {
        match self.buffers.entry(stream_id) {
            Entry::Vacant(slot) => {
                info!("Creating new stream buffer: id={stream_id}");
                self.order.push(stream_id);
                slot.insert(StreamBuffer::new(self.window))
            }
            Entry::Occupied(slot) => slot.into_mut(),
        }
    }

    /// Routes one decoded sample into its stream's buffer.
    pub fn append(&mut self, sample: &Sample) {
        self.get_or_create(sample.stream_id).append(sample);
        *self.packets.entry(sample.stream_id).or_insert(0) += 1;
    }

    /// Ids in first-seen order.
    pub fn ids(&self) -> &[u32] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Materializes every buffer into an immutable snapshot, one slice per
    /// registered id, in first-seen order.
    pub fn snapshot_all(&self) -> Snapshot {
        Snapshot {
            streams: self
                .order
                .iter()
                .filter_map(|&id| {
                    self.buffers.get(&id).map(|buffer| StreamSlice {
                        stream_id: id,
                        base: buffer.base(),
                        records: buffer.materialize(),
                    })
                })
                .collect(),
        }
    }

    /// Per-id unit counts since the previous call, in first-seen order.
    /// Resets the counters.
    pub fn take_packet_counts(&mut self) -> Vec<(u32, u64)> {
        let counts = self
            .order
            .iter()
            .map(|&id| (id, self.packets.get(&id).copied().unwrap_or(0)))
            .collect();
        self.packets.clear();
        counts
    }
}
