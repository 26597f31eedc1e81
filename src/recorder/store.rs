use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use hdf5::{Extent, File, Group};
use log::{debug, info, warn};

use crate::types::StreamSlice;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("recording I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// One recording session: a timestamped HDF5 file holding one group per
/// stream id (decimal name), each with append-only `tstamp`/`x`/`y`/`z`
/// datasets.
///
/// The per-id cursor counts records already flushed as an absolute index
/// into the stream's full history, so overlapping snapshot windows are
/// appended exactly once regardless of how the ring buffer evicts.
pub struct SessionStore {
    file: File,
    path: PathBuf,
    flushed: HashMap<u32, u64>,
}

impl SessionStore {
    /// Creates the output directory if needed and opens a fresh session
    /// file named after the start time.
    pub fn create(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = dir.join(format!("data_{stamp}.h5"));
        let mut serial = 1;
        while path.exists() {
            path = dir.join(format!("data_{stamp}_{serial}.h5"));
            serial += 1;
        }
        let file = File::create(&path)?;
        info!("Recording to {}", path.display());
        Ok(Self {
            file,
            path,
            flushed: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the unflushed tail of one stream's snapshot slice and
    /// advances the cursor. Returns how many records were written.
    pub fn append_slice(&mut self, slice: &StreamSlice) -> Result<usize, StoreError> {
        let flushed = self.flushed.get(&slice.stream_id).copied().unwrap_or(0);
        let skip = if flushed < slice.base {
            // Records between the cursor and the window start were evicted
            // before any snapshot carrying them arrived; they are gone.
            warn!(
                "Stream {}: {} records evicted before they could be flushed",
                slice.stream_id,
                slice.base - flushed
            );
            0
        } else {
            (flushed - slice.base) as usize
        };
        if skip >= slice.records.len() {
            return Ok(0);
        }
        let tail = &slice.records[skip..];

        let group = self.group(slice.stream_id)?;
        let tstamp: Vec<f64> = tail.iter().map(|r| r.tstamp).collect();
        let x: Vec<f32> = tail.iter().map(|r| r.x).collect();
        let y: Vec<f32> = tail.iter().map(|r| r.y).collect();
        let z: Vec<f32> = tail.iter().map(|r| r.z).collect();
        append_column(&group, "tstamp", &tstamp)?;
        append_column(&group, "x", &x)?;
        append_column(&group, "y", &y)?;
        append_column(&group, "z", &z)?;

        self.flushed
            .insert(slice.stream_id, slice.base + slice.records.len() as u64);
        Ok(tail.len())
    }

    /// Records flushed so far for a stream (absolute count).
    pub fn flushed_count(&self, stream_id: u32) -> u64 {
        self.flushed.get(&stream_id).copied().unwrap_or(0)
    }

    /// Flushes and closes the file, returning its path.
    pub fn finish(self) -> Result<PathBuf, StoreError> {
        self.file.flush()?;
        Ok(self.path)
    }

    fn group(&self, stream_id: u32) -> Result<Group, StoreError> {
        let name = stream_id.to_string();
        if let Ok(group) = self.file.group(&name) {
            return Ok(group);
        }
        debug!("Creating group {name}");
        Ok(self.file.create_group(&name)?)
    }
}

/// Appends `values` to a 1-D resizable dataset, creating it (chunked and
/// deflate-compressed) on first use.
fn append_column<T: hdf5::H5Type>(
    group: &Group,
    name: &str,
    values: &[T],
) -> Result<(), StoreError> {
    if values.is_empty() {
        return Ok(());
    }
    if let Ok(dataset) = group.dataset(name) {
        let old = dataset.size();
        let new = old + values.len();
        dataset.resize(new)?;
        dataset.write_slice(values, old..new)?;
    } else {
        let chunk = values.len().clamp(1, 1024);
        let dataset = group
            .new_dataset::<T>()
            .shape(Extent::resizable(values.len()))
            .chunk((chunk,))
            .deflate(6)
            .create(name)?;
        dataset.write(values)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use tempfile::tempdir;

    fn records(range: std::ops::Range<u32>) -> Vec<Record> {
        range
            .map(|i| Record {
                tstamp: i as f64 * 0.1,
                x: i as f32,
                y: -(i as f32),
                z: 0.5,
                dx: 1.0,
                dy: -1.0,
                dz: 0.0,
            })
            .collect()
    }

    fn slice(stream_id: u32, base: u64, range: std::ops::Range<u32>) -> StreamSlice {
        StreamSlice {
            stream_id,
            base,
            records: records(range),
        }
    }

    fn read_column<T: hdf5::H5Type>(path: &Path, stream_id: u32, name: &str) -> Vec<T> {
        let file = File::open(path).unwrap();
        file.group(&stream_id.to_string())
            .unwrap()
            .dataset(name)
            .unwrap()
            .read_raw::<T>()
            .unwrap()
    }

    #[test]
    fn creates_one_group_per_stream_with_all_columns() {
        let dir = tempdir().unwrap();
        let mut store = SessionStore::create(dir.path()).unwrap();
        store.append_slice(&slice(7, 0, 0..3)).unwrap();
        store.append_slice(&slice(12, 0, 0..2)).unwrap();
        let path = store.finish().unwrap();

        let x: Vec<f32> = read_column(&path, 7, "x");
        assert_eq!(x, vec![0.0, 1.0, 2.0]);
        let tstamp: Vec<f64> = read_column(&path, 7, "tstamp");
        assert_eq!(tstamp.len(), 3);
        let y: Vec<f32> = read_column(&path, 12, "y");
        assert_eq!(y, vec![0.0, -1.0]);
        let z: Vec<f32> = read_column(&path, 12, "z");
        assert_eq!(z, vec![0.5, 0.5]);
    }

    #[test]
    fn overlapping_windows_are_flushed_exactly_once() {
        let dir = tempdir().unwrap();
        let mut store = SessionStore::create(dir.path()).unwrap();

        // Consecutive snapshots of a growing window share a prefix; only
        // the new tail may hit the file.
        assert_eq!(store.append_slice(&slice(7, 0, 0..3)).unwrap(), 3);
        assert_eq!(store.append_slice(&slice(7, 0, 0..5)).unwrap(), 2);
        assert_eq!(store.append_slice(&slice(7, 0, 0..5)).unwrap(), 0);
        assert_eq!(store.flushed_count(7), 5);

        let path = store.finish().unwrap();
        let x: Vec<f32> = read_column(&path, 7, "x");
        assert_eq!(x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn eviction_during_recording_advances_without_duplicating() {
        let dir = tempdir().unwrap();
        let mut store = SessionStore::create(dir.path()).unwrap();

        // Window [0, 4) flushed, then the ring evicted two records: the
        // next window starts at base 2 and only 6..8 is new.
        assert_eq!(store.append_slice(&slice(7, 0, 0..4)).unwrap(), 4);
        assert_eq!(store.append_slice(&slice(7, 2, 2..8)).unwrap(), 4);

        let path = store.finish().unwrap();
        let x: Vec<f32> = read_column(&path, 7, "x");
        assert_eq!(x, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn unseen_evicted_records_are_logged_and_skipped() {
        let dir = tempdir().unwrap();
        let mut store = SessionStore::create(dir.path()).unwrap();

        // Delivery fell behind eviction: records 0..10 never reached the
        // writer. The window is flushed whole and the cursor resyncs.
        assert_eq!(store.append_slice(&slice(7, 10, 10..14)).unwrap(), 4);
        assert_eq!(store.flushed_count(7), 14);
    }

    #[test]
    fn sessions_get_distinct_files() {
        let dir = tempdir().unwrap();
        let first = SessionStore::create(dir.path()).unwrap();
        let second = SessionStore::create(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());
    }
}
