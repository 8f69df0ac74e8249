//! Ingestion pipeline: the asynchronous download queue that pulls packs
//! from the remote API into the library.

pub mod queue;

pub use queue::{DownloadQueue, Enqueued, QueueError, QueueNotice};
