pub mod client;
pub mod frame;

pub use client::run_ingest;
