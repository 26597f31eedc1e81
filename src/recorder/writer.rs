use std::path::{Path, PathBuf};

use crossbeam_channel::{select, Receiver, Sender};
use log::{error, info, warn};

use super::store::{SessionStore, StoreError};
use crate::types::Snapshot;

/// Control messages for the persistence writer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderControl {
    Start,
    Stop,
    Shutdown,
}

/// Status events reported back to the GUI.
#[derive(Debug, Clone)]
pub enum RecorderStatus {
    Started { path: PathBuf },
    Stopped { path: PathBuf, records: u64 },
    Failed { message: String },
}

/// GUI-side handle for toggling the writer.
#[derive(Clone)]
pub struct RecorderHandle {
    control: Sender<RecorderControl>,
}

impl RecorderHandle {
    pub fn new(control: Sender<RecorderControl>) -> Self {
        Self { control }
    }

    pub fn start(&self) {
        self.send(RecorderControl::Start);
    }

    pub fn stop(&self) {
        self.send(RecorderControl::Stop);
    }

    pub fn shutdown(&self) {
        self.send(RecorderControl::Shutdown);
    }

    fn send(&self, message: RecorderControl) {
        if self.control.try_send(message).is_err() {
            warn!("Recorder control channel unavailable, {message:?} dropped");
        }
    }
}

/// Persistence writer thread: Idle until a Start arrives, then appends
/// every incoming snapshot's new tail to the session file until Stop.
///
/// Snapshots received while Idle are discarded so a session only contains
/// data published after its Start. A store error ends the Recording state
/// (never the ingest or render side); Stop drains whatever was queued
/// before closing the file. Shutdown, or the snapshot channel
/// disconnecting (end of stream), flushes any open session and exits.
pub fn run_recorder(
    control: Receiver<RecorderControl>,
    snapshots: Receiver<Snapshot>,
    output_dir: PathBuf,
    status: Sender<RecorderStatus>,
) {
    let mut session: Option<Recording> = None;
    info!("Recorder thread started");

    loop {
        select! {
            recv(control) -> message => match message {
                Ok(RecorderControl::Start) => {
                    if session.is_none() {
                        session = Recording::begin(&output_dir, &status);
                    }
                }
                Ok(RecorderControl::Stop) => {
                    if let Some(recording) = session.take() {
                        recording.finish(&snapshots, &status);
                    }
                }
                Ok(RecorderControl::Shutdown) | Err(_) => break,
            },
            recv(snapshots) -> message => match message {
                Ok(snapshot) => {
                    if let Some(recording) = session.as_mut() {
                        if let Err(e) = recording.consume(&snapshot) {
                            error!("Recording failed, closing file: {e}");
                            let _ = status.try_send(RecorderStatus::Failed {
                                message: e.to_string(),
                            });
                            session = None;
                        }
                    }
                }
                Err(_) => {
                    info!("Snapshot channel disconnected, stream ended");
                    break;
                }
            },
        }
    }

    if let Some(recording) = session.take() {
        recording.finish(&snapshots, &status);
    }
    info!("Recorder thread exiting gracefully");
}

struct Recording {
    store: SessionStore,
    written: u64,
}

impl Recording {
    fn begin(dir: &Path, status: &Sender<RecorderStatus>) -> Option<Self> {
        match SessionStore::create(dir) {
            Ok(store) => {
                let _ = status.try_send(RecorderStatus::Started {
                    path: store.path().to_path_buf(),
                });
                Some(Self { store, written: 0 })
            }
            Err(e) => {
                error!("Could not open recording file: {e}");
                let _ = status.try_send(RecorderStatus::Failed {
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn consume(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        for slice in &snapshot.streams {
            self.written += self.store.append_slice(slice)? as u64;
        }
        Ok(())
    }

    /// Drains snapshots queued before the stop arrived, then flushes and
    /// closes the file.
    fn finish(mut self, pending: &Receiver<Snapshot>, status: &Sender<RecorderStatus>) {
        while let Ok(snapshot) = pending.try_recv() {
            if let Err(e) = self.consume(&snapshot) {
                error!("Recording failed while draining: {e}");
                let _ = status.try_send(RecorderStatus::Failed {
                    message: e.to_string(),
                });
                return;
            }
        }
        let Recording { store, written } = self;
        match store.finish() {
            Ok(path) => {
                info!("Recording closed: {} ({written} records)", path.display());
                let _ = status.try_send(RecorderStatus::Stopped {
                    path,
                    records: written,
                });
            }
            Err(e) => {
                error!("Could not close recording file: {e}");
                let _ = status.try_send(RecorderStatus::Failed {
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Record, StreamSlice};
    use crossbeam_channel::bounded;
    use hdf5::File;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn snapshot(stream_id: u32, base: u64, range: std::ops::Range<u32>) -> Snapshot {
        Snapshot {
            streams: vec![StreamSlice {
                stream_id,
                base,
                records: range
                    .map(|i| Record {
                        tstamp: i as f64,
                        x: i as f32,
                        y: 0.0,
                        z: 0.0,
                        dx: 0.0,
                        dy: 0.0,
                        dz: 0.0,
                    })
                    .collect(),
            }],
        }
    }

    struct Harness {
        control: Sender<RecorderControl>,
        snapshots: Sender<Snapshot>,
        status: Receiver<RecorderStatus>,
        thread: thread::JoinHandle<()>,
    }

    fn spawn_recorder(dir: &Path) -> Harness {
        let (control_tx, control_rx) = bounded(8);
        let (snapshot_tx, snapshot_rx) = bounded(32);
        let (status_tx, status_rx) = bounded(32);
        let output_dir = dir.to_path_buf();
        let thread =
            thread::spawn(move || run_recorder(control_rx, snapshot_rx, output_dir, status_tx));
        Harness {
            control: control_tx,
            snapshots: snapshot_tx,
            status: status_rx,
            thread,
        }
    }

    fn read_x(path: &Path, stream_id: u32) -> Vec<f32> {
        let file = File::open(path).unwrap();
        file.group(&stream_id.to_string())
            .unwrap()
            .dataset("x")
            .unwrap()
            .read_raw::<f32>()
            .unwrap()
    }

    #[test]
    fn records_only_between_start_and_stop() {
        let dir = tempdir().unwrap();
        let harness = spawn_recorder(dir.path());

        // Published while Idle: must not end up in any session.
        harness.snapshots.send(snapshot(7, 0, 0..3)).unwrap();
        thread::sleep(Duration::from_millis(50));

        harness.control.send(RecorderControl::Start).unwrap();
        let started = wait_started(&harness.status);
        harness.snapshots.send(snapshot(7, 0, 0..4)).unwrap();
        harness.snapshots.send(snapshot(7, 0, 0..6)).unwrap();
        thread::sleep(Duration::from_millis(100));
        harness.control.send(RecorderControl::Stop).unwrap();
        let (stopped, records) = wait_stopped(&harness.status);
        assert_eq!(started, stopped);
        assert_eq!(records, 6);

        harness.control.send(RecorderControl::Shutdown).unwrap();
        harness.thread.join().unwrap();

        assert_eq!(
            read_x(&stopped, 7),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn stop_drains_queued_snapshots_before_closing() {
        let dir = tempdir().unwrap();
        let harness = spawn_recorder(dir.path());

        harness.control.send(RecorderControl::Start).unwrap();
        wait_started(&harness.status);
        // Queue data and the stop back to back: the queued tail must still
        // be flushed.
        harness.snapshots.send(snapshot(3, 0, 0..5)).unwrap();
        harness.control.send(RecorderControl::Stop).unwrap();
        let (path, records) = wait_stopped(&harness.status);
        assert_eq!(records, 5);

        harness.control.send(RecorderControl::Shutdown).unwrap();
        harness.thread.join().unwrap();
        assert_eq!(read_x(&path, 3).len(), 5);
    }

    #[test]
    fn restarting_creates_a_second_session_file() {
        let dir = tempdir().unwrap();
        let harness = spawn_recorder(dir.path());

        harness.control.send(RecorderControl::Start).unwrap();
        wait_started(&harness.status);
        harness.snapshots.send(snapshot(1, 0, 0..2)).unwrap();
        thread::sleep(Duration::from_millis(50));
        harness.control.send(RecorderControl::Stop).unwrap();
        let (first, _) = wait_stopped(&harness.status);

        harness.control.send(RecorderControl::Start).unwrap();
        wait_started(&harness.status);
        // The new session starts from its own cursor: the full window is
        // unflushed data for this file.
        harness.snapshots.send(snapshot(1, 0, 0..4)).unwrap();
        thread::sleep(Duration::from_millis(50));
        harness.control.send(RecorderControl::Stop).unwrap();
        let (second, _) = wait_stopped(&harness.status);

        harness.control.send(RecorderControl::Shutdown).unwrap();
        harness.thread.join().unwrap();

        assert_ne!(first, second);
        assert_eq!(read_x(&first, 1).len(), 2);
        assert_eq!(read_x(&second, 1).len(), 4);
    }

    #[test]
    fn stream_end_flushes_open_session() {
        let dir = tempdir().unwrap();
        let harness = spawn_recorder(dir.path());

        harness.control.send(RecorderControl::Start).unwrap();
        let path = wait_started(&harness.status);
        harness.snapshots.send(snapshot(9, 0, 0..3)).unwrap();
        thread::sleep(Duration::from_millis(50));

        // Ingest loop ending drops the producer side.
        drop(harness.snapshots);
        harness.thread.join().unwrap();

        let (stopped, records) = wait_stopped(&harness.status);
        assert_eq!(stopped, path);
        assert_eq!(records, 3);
        assert_eq!(read_x(&path, 9).len(), 3);
    }

    fn wait_started(status: &Receiver<RecorderStatus>) -> PathBuf {
        let event = status
            .recv_timeout(Duration::from_secs(5))
            .expect("status event");
        match event {
            RecorderStatus::Started { path } => path,
            other => panic!("expected Started, got {other:?}"),
        }
    }

    fn wait_stopped(status: &Receiver<RecorderStatus>) -> (PathBuf, u64) {
        loop {
            let event = status
                .recv_timeout(Duration::from_secs(5))
                .expect("status event");
            match event {
                RecorderStatus::Stopped { path, records } => return (path, records),
                RecorderStatus::Started { .. } => continue,
                other => panic!("expected Stopped, got {other:?}"),
            }
        }
    }
}
