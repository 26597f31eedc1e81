use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::debug;

use crate::types::Snapshot;

/// Fans ingest snapshots out to independently paced consumers. Every
/// consumer gets its own bounded queue, so a slow render loop cannot
/// starve the recorder or vice versa; a full queue drops that consumer's
/// copy instead of delaying ingestion.
pub struct SnapshotHub {
    outputs: Vec<Sender<Snapshot>>,
    dropped: u64,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            dropped: 0,
        }
    }

    /// Registers a consumer with its own bounded queue.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<Snapshot> {
        let (tx, rx) = bounded(capacity.max(1));
        self.outputs.push(tx);
        rx
    }

    /// Non-blocking publish to every consumer. Never waits: a full queue
    /// loses this snapshot, a fresher one follows shortly.
    pub fn publish(&mut self, snapshot: Snapshot) {
        for output in &self.outputs {
            match output.try_send(snapshot.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped += 1;
                    debug!("Snapshot queue full, dropping publish");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    /// Publishes dropped because a consumer queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest-wins drain for frame-paced consumers: empties the queue and
/// keeps only the newest snapshot. Also reports whether the producer side
/// has gone away (end of stream).
pub fn drain_latest(rx: &Receiver<Snapshot>) -> (Option<Snapshot>, bool) {
    let mut latest = None;
    let mut closed = false;
    loop {
        match rx.try_recv() {
            Ok(snapshot) => latest = Some(snapshot),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                closed = true;
                break;
            }
        }
    }
    (latest, closed)
}
