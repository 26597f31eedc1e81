use std::path::PathBuf;

use crossbeam_channel::Receiver;

use crate::hub;
use crate::recorder::{RecorderHandle, RecorderStatus};
use crate::types::Snapshot;

/// Recording toggle state as seen by the GUI. Flips on confirmation from
/// the writer thread, not on the button press.
#[derive(Debug, Default)]
pub struct RecordingState {
    pub is_recording: bool,
    pub current_file: Option<PathBuf>,
    pub status_line: String,
}

/// Everything the viewer window needs between frames.
pub struct AppState {
    snapshot_rx: Receiver<Snapshot>,
    recorder_status_rx: Receiver<RecorderStatus>,
    pub recorder: RecorderHandle,
    pub latest: Option<Snapshot>,
    /// Set once the ingest loop has gone away; terminal for the session.
    pub stream_ended: bool,
    pub recording: RecordingState,
}

impl AppState {
    pub fn new(
        snapshot_rx: Receiver<Snapshot>,
        recorder: RecorderHandle,
        recorder_status_rx: Receiver<RecorderStatus>,
    ) -> Self {
        Self {
            snapshot_rx,
            recorder_status_rx,
            recorder,
            latest: None,
            stream_ended: false,
            recording: RecordingState::default(),
        }
    }

    /// Latest-wins drain of the render queue: anything older than the
    /// newest queued snapshot is obsolete for display.
    pub fn poll_snapshots(&mut self) {
        let (latest, closed) = hub::drain_latest(&self.snapshot_rx);
        if let Some(snapshot) = latest {
            self.latest = Some(snapshot);
        }
        if closed {
            self.stream_ended = true;
        }
    }

    pub fn poll_recorder_status(&mut self) {
        while let Ok(status) = self.recorder_status_rx.try_recv() {
            match status {
                RecorderStatus::Started { path } => {
                    self.recording.is_recording = true;
                    self.recording.status_line = format!("Recording to {}", path.display());
                    self.recording.current_file = Some(path);
                }
                RecorderStatus::Stopped { path, records } => {
                    self.recording.is_recording = false;
                    self.recording.current_file = None;
                    self.recording.status_line =
                        format!("Saved {records} records to {}", path.display());
                }
                RecorderStatus::Failed { message } => {
                    self.recording.is_recording = false;
                    self.recording.current_file = None;
                    self.recording.status_line = format!("Recording failed: {message}");
                }
            }
        }
    }

    pub fn toggle_recording(&self) {
        if self.recording.is_recording {
            self.recorder.stop();
        } else {
            self.recorder.start();
        }
    }

    pub fn stream_count(&self) -> usize {
        self.latest.as_ref().map_or(0, |s| s.streams.len())
    }

    pub fn buffered_records(&self) -> usize {
        self.latest.as_ref().map_or(0, |s| s.total_records())
    }
}
