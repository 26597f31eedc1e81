pub mod sample;
pub mod snapshot;

pub use sample::{Record, Sample};
pub use snapshot::{Snapshot, StreamSlice};
