pub mod store;
pub mod writer;

pub use writer::{run_recorder, RecorderHandle, RecorderStatus};
